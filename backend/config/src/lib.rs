//! `devauth-config`: runtime configuration for the devauth service.
//!
//! Provides:
//! - Typed config schema
//! - YAML loading
//! - `${ENV_VAR}` substitution
//! - Default value application
//! - Validation with errors and warnings

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{apply_env_overrides, collect_referenced_vars, substitute_env, UnsetVarError};
pub use io::{config_dir, config_file_path, load_raw};
pub use schema::{
    DevAuthConfig, DevicesConfig, JwtConfig, LoggingConfig, PaginationConfig, ServerConfig,
    StorageBackend, StorageConfig, TenancyConfig, TenancyMode,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Turn a raw value tree into a defaulted config plus its validation report,
/// reading substitutions and overrides from the process environment.
pub fn prepare(raw: &Value) -> Result<(DevAuthConfig, ValidationReport)> {
    prepare_with(raw, &std::env::vars().collect())
}

/// [`prepare`] against an explicit environment.
pub fn prepare_with(
    raw: &Value,
    env: &HashMap<String, String>,
) -> Result<(DevAuthConfig, ValidationReport)> {
    let value = substitute_env(raw, env).context("Failed to resolve env vars in config")?;
    let config: DevAuthConfig =
        serde_json::from_value(value).context("Failed to deserialize config")?;
    let mut config = apply_all_defaults(config);
    apply_env_overrides(&mut config, env);
    let report = validate(&config);
    Ok((config, report))
}

/// Load, substitute env vars, apply defaults and validate a config file.
///
/// Any validation error fails the load; warnings are handed back so they can
/// be logged once logging is configured from the result.
pub async fn load_and_prepare(
    path: &Path,
) -> Result<(DevAuthConfig, Vec<ConfigValidationError>)> {
    let raw = load_raw(path).await?;
    let (config, report) = prepare(&raw)?;
    if let Some(first) = report.errors.first() {
        bail!("{} config error(s) in {}; first: {first}", report.errors.len(), path.display());
    }
    Ok((config, report.warnings))
}
