use std::path::Path;

use anyhow::{bail, Result};
use devauth_config::{collect_referenced_vars, load_raw, prepare, ValidationReport};

use crate::config::Settings;
use crate::output::{note, Note};

/// Describe a validation report as notes, errors first.
pub fn report_lines(report: &ValidationReport) -> Vec<(Note, String)> {
    let errors = report.errors.iter().map(|e| (Note::Error, e.to_string()));
    let warnings = report.warnings.iter().map(|w| (Note::Warn, w.to_string()));
    errors.chain(warnings).collect()
}

pub async fn run(path: &Path) -> Result<()> {
    note(Note::Info, &format!("Checking {}", path.display()));
    let raw = load_raw(path).await?;
    let referenced = collect_referenced_vars(&raw);
    if !referenced.is_empty() {
        note(Note::Info, &format!("Environment variables referenced: {}", referenced.join(", ")));
    }
    let (config, report) = prepare(&raw)?;

    for (kind, line) in report_lines(&report) {
        note(kind, &line);
    }
    if !report.is_valid() {
        bail!("{} config error(s) in {}", report.errors.len(), path.display());
    }

    let settings = Settings::from_config(&config)?;
    let addr = settings.socket_addr()?;
    note(
        Note::Success,
        &format!(
            "Config valid: listening on {addr}, {:?} storage, {:?} tenancy",
            settings.storage_backend, settings.tenancy_mode
        ),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use devauth_config::ConfigValidationError;

    #[test]
    fn errors_are_listed_before_warnings() {
        let report = ValidationReport {
            errors: vec![ConfigValidationError {
                path: "jwt.privateKeyPath".into(),
                message: "required".into(),
            }],
            warnings: vec![ConfigValidationError {
                path: "server.port".into(),
                message: "privileged".into(),
            }],
        };
        let lines = report_lines(&report);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, Note::Error);
        assert!(lines[0].1.contains("jwt.privateKeyPath"));
        assert_eq!(lines[1].0, Note::Warn);
    }

    #[tokio::test]
    async fn rejects_config_without_keys() {
        let path = std::env::temp_dir()
            .join(format!("devauth-check-{}.yaml", std::process::id()));
        std::fs::write(&path, "server:\n  port: 9090\n").unwrap();
        let err = run(&path).await.unwrap_err();
        assert!(err.to_string().contains("config error"));
    }
}
