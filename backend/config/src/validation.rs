//! Config validation with path-qualified messages.
//!
//! Runs on a config that has already been through [`crate::apply_all_defaults`].

use crate::schema::{DevAuthConfig, StorageBackend, TenancyMode};
use thiserror::Error;

/// One finding, located by its camelCase config path.
#[derive(Debug, Error)]
#[error("{path}: {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// Errors block startup; warnings are only logged.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &DevAuthConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_storage(config, &mut report);
    validate_jwt(config, &mut report);
    validate_tenancy(config, &mut report);
    validate_pagination(config, &mut report);
    report
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(str::trim).map(str::is_empty).unwrap_or(true)
}

fn validate_server(config: &DevAuthConfig, report: &mut ValidationReport) {
    let Some(server) = &config.server else { return };
    match server.port {
        Some(0) => report.error("server.port", "port must be > 0"),
        Some(port) if port < 1024 => report.warn(
            "server.port",
            format!("Port {port} requires elevated privileges; consider using a port >= 1024"),
        ),
        _ => {}
    }
}

fn validate_storage(config: &DevAuthConfig, report: &mut ValidationReport) {
    let Some(storage) = &config.storage else { return };
    match storage.backend.unwrap_or_default() {
        StorageBackend::Sqlite if is_blank(storage.path.as_deref()) => {
            report.error("storage.path", "SQLite backend requires a database path")
        }
        StorageBackend::Memory => report.warn(
            "storage.backend",
            "Memory backend keeps devices and tokens only until restart",
        ),
        _ => {}
    }
    if storage.timeout_ms == Some(0) {
        report.error("storage.timeoutMs", "timeoutMs must be >= 1");
    }
}

fn validate_jwt(config: &DevAuthConfig, report: &mut ValidationReport) {
    let jwt = config.jwt.clone().unwrap_or_default();
    if is_blank(jwt.private_key_path.as_deref()) {
        report.error("jwt.privateKeyPath", "Token signing key path is required");
    }
    if is_blank(jwt.public_key_path.as_deref()) {
        report.error("jwt.publicKeyPath", "Token verification key path is required");
    }
    if is_blank(jwt.issuer.as_deref()) {
        report.error("jwt.issuer", "issuer cannot be empty");
    }
    if let Some(exp) = jwt.expiration_secs {
        if exp <= 0 {
            report.error("jwt.expirationSecs", "expirationSecs must be > 0");
        }
    }
    if let Some(leeway) = jwt.leeway_secs {
        if leeway < 0 {
            report.error("jwt.leewaySecs", "leewaySecs cannot be negative");
        } else if leeway >= jwt.expiration_secs.unwrap_or(i64::MAX) {
            report.warn("jwt.leewaySecs", "leewaySecs is not shorter than the token lifetime");
        }
    }
}

fn validate_tenancy(config: &DevAuthConfig, report: &mut ValidationReport) {
    let Some(tenancy) = &config.tenancy else { return };
    let mode = tenancy.mode.unwrap_or_default();
    let has_key = !is_blank(tenancy.verify_key_path.as_deref());
    if mode == TenancyMode::Signed && !has_key {
        report.error("tenancy.verifyKeyPath", "Signed tenancy requires a verification key path");
    }
    if mode != TenancyMode::Signed && has_key {
        report.warn("tenancy.verifyKeyPath", "verifyKeyPath is only used in signed mode");
    }
    if let Some(header) = &tenancy.management_header {
        let valid = !header.is_empty()
            && header
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            report.error(
                "tenancy.managementHeader",
                format!("'{header}' is not a valid header name"),
            );
        }
    }
}

fn validate_pagination(config: &DevAuthConfig, report: &mut ValidationReport) {
    let Some(pagination) = &config.pagination else { return };
    if pagination.default_per_page == Some(0) {
        report.error("pagination.defaultPerPage", "defaultPerPage must be >= 1");
    }
    if let (Some(default), Some(max)) = (pagination.default_per_page, pagination.max_per_page) {
        if max < default {
            report.error("pagination.maxPerPage", "maxPerPage must be >= defaultPerPage");
        }
    }
}
