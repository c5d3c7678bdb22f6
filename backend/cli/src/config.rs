use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use devauth_config::defaults::{
    DEFAULT_BIND, DEFAULT_DB_PATH, DEFAULT_EXPIRATION_SECS, DEFAULT_ISSUER, DEFAULT_LEEWAY_SECS,
    DEFAULT_LOG_LEVEL, DEFAULT_MANAGEMENT_HEADER, DEFAULT_MAX_PER_PAGE, DEFAULT_PER_PAGE,
    DEFAULT_PORT, DEFAULT_STORAGE_TIMEOUT_MS,
};
use devauth_config::{config_dir, config_file_path, DevAuthConfig, StorageBackend, TenancyMode};
use devauth_logging::LoggingOptions;

/// devauth runtime settings, resolved from a validated config.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_address: String,
    pub port: u16,
    pub storage_backend: StorageBackend,
    /// SQLite database path
    pub db_path: String,
    pub storage_timeout: Duration,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub issuer: String,
    pub expiration_secs: i64,
    pub leeway_secs: i64,
    pub tenancy_mode: TenancyMode,
    pub tenant_verify_key_path: Option<PathBuf>,
    pub management_header: String,
    pub default_per_page: usize,
    pub max_per_page: usize,
    pub allow_accepted_key_rotation: bool,
    pub logging: LoggingOptions,
}

impl Settings {
    /// Flatten a defaulted config. Key paths have no default and must be present.
    pub fn from_config(config: &DevAuthConfig) -> Result<Self> {
        let server = config.server.clone().unwrap_or_default();
        let storage = config.storage.clone().unwrap_or_default();
        let jwt = config.jwt.clone().unwrap_or_default();
        let tenancy = config.tenancy.clone().unwrap_or_default();
        let pagination = config.pagination.clone().unwrap_or_default();
        let devices = config.devices.clone().unwrap_or_default();
        let logging = config.logging.clone().unwrap_or_default();

        let tenancy_mode = tenancy.mode.unwrap_or_default();
        let tenant_verify_key_path = match tenancy_mode {
            TenancyMode::Signed => Some(PathBuf::from(
                tenancy
                    .verify_key_path
                    .context("tenancy.verifyKeyPath is required in signed mode")?,
            )),
            _ => None,
        };

        Ok(Self {
            bind_address: server.bind.unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: server.port.unwrap_or(DEFAULT_PORT),
            storage_backend: storage.backend.unwrap_or_default(),
            db_path: storage.path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            storage_timeout: Duration::from_millis(
                storage.timeout_ms.unwrap_or(DEFAULT_STORAGE_TIMEOUT_MS),
            ),
            private_key_path: jwt
                .private_key_path
                .map(PathBuf::from)
                .context("jwt.privateKeyPath is required")?,
            public_key_path: jwt
                .public_key_path
                .map(PathBuf::from)
                .context("jwt.publicKeyPath is required")?,
            issuer: jwt.issuer.unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            expiration_secs: jwt.expiration_secs.unwrap_or(DEFAULT_EXPIRATION_SECS),
            leeway_secs: jwt.leeway_secs.unwrap_or(DEFAULT_LEEWAY_SECS),
            tenancy_mode,
            tenant_verify_key_path,
            management_header: tenancy
                .management_header
                .unwrap_or_else(|| DEFAULT_MANAGEMENT_HEADER.to_string()),
            default_per_page: pagination.default_per_page.unwrap_or(DEFAULT_PER_PAGE),
            max_per_page: pagination.max_per_page.unwrap_or(DEFAULT_MAX_PER_PAGE),
            allow_accepted_key_rotation: devices.allow_accepted_key_rotation.unwrap_or(true),
            logging: LoggingOptions {
                level: logging.level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
                dir: logging.dir.map(PathBuf::from),
                json: logging.json.unwrap_or(false),
            },
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.bind_address, self.port))
    }
}

/// `--config` when given, else `$DEVAUTH_CONFIG`, else the per-user config file.
pub fn resolve_config_path(arg: Option<PathBuf>) -> PathBuf {
    arg.or_else(|| {
        std::env::var("DEVAUTH_CONFIG")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    })
    .unwrap_or_else(|| config_file_path(&config_dir()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use devauth_config::{apply_all_defaults, JwtConfig, ServerConfig, TenancyConfig};

    fn with_keys() -> DevAuthConfig {
        DevAuthConfig {
            jwt: Some(JwtConfig {
                private_key_path: Some("/etc/devauth/server.pem".into()),
                public_key_path: Some("/etc/devauth/server.pub".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn resolves_defaults() {
        let settings = Settings::from_config(&apply_all_defaults(with_keys())).unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.storage_backend, StorageBackend::Sqlite);
        assert_eq!(settings.storage_timeout, Duration::from_secs(5));
        assert_eq!(settings.expiration_secs, 604_800);
        assert_eq!(settings.tenancy_mode, TenancyMode::Single);
        assert!(settings.tenant_verify_key_path.is_none());
        assert_eq!(settings.management_header, "x-devauth-tenant");
        assert!(settings.allow_accepted_key_rotation);
        assert_eq!(settings.socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn missing_key_paths_fail() {
        let err = Settings::from_config(&apply_all_defaults(DevAuthConfig::default())).unwrap_err();
        assert!(err.to_string().contains("privateKeyPath"));
    }

    #[test]
    fn signed_mode_needs_verify_key() {
        let mut config = with_keys();
        config.tenancy = Some(TenancyConfig {
            mode: Some(TenancyMode::Signed),
            ..Default::default()
        });
        assert!(Settings::from_config(&config).is_err());

        config.tenancy = Some(TenancyConfig {
            mode: Some(TenancyMode::Signed),
            verify_key_path: Some("/etc/devauth/tenantadm.pub".into()),
            ..Default::default()
        });
        let settings = Settings::from_config(&config).unwrap();
        assert_eq!(
            settings.tenant_verify_key_path,
            Some(PathBuf::from("/etc/devauth/tenantadm.pub"))
        );
    }

    #[test]
    fn bad_bind_address_is_reported() {
        let mut config = with_keys();
        config.server = Some(ServerConfig { bind: Some("not an ip".into()), port: Some(80) });
        let settings = Settings::from_config(&config).unwrap();
        assert!(settings.socket_addr().is_err());
    }

    #[test]
    fn explicit_config_path_wins() {
        let path = resolve_config_path(Some(PathBuf::from("/tmp/devauth.yaml")));
        assert_eq!(path, PathBuf::from("/tmp/devauth.yaml"));
    }
}
