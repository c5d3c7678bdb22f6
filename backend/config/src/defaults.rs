//! Config defaults: fills every unset field after loading.

use crate::schema::{
    DevAuthConfig, DevicesConfig, JwtConfig, LoggingConfig, PaginationConfig, ServerConfig,
    StorageBackend, StorageConfig, TenancyConfig, TenancyMode,
};

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DB_PATH: &str = "devauth.db";
pub const DEFAULT_STORAGE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_ISSUER: &str = "devauth";
/// One week.
pub const DEFAULT_EXPIRATION_SECS: i64 = 604_800;
pub const DEFAULT_LEEWAY_SECS: i64 = 0;
pub const DEFAULT_MANAGEMENT_HEADER: &str = "x-devauth-tenant";
pub const DEFAULT_PER_PAGE: usize = 20;
pub const DEFAULT_MAX_PER_PAGE: usize = 500;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: DevAuthConfig) -> DevAuthConfig {
    let config = apply_server_defaults(config);
    let config = apply_storage_defaults(config);
    let config = apply_jwt_defaults(config);
    let config = apply_tenancy_defaults(config);
    let config = apply_pagination_defaults(config);
    let config = apply_device_defaults(config);
    apply_logging_defaults(config)
}

fn apply_server_defaults(mut config: DevAuthConfig) -> DevAuthConfig {
    let server = config.server.get_or_insert_with(ServerConfig::default);
    server.bind.get_or_insert_with(|| DEFAULT_BIND.to_string());
    server.port.get_or_insert(DEFAULT_PORT);
    config
}

fn apply_storage_defaults(mut config: DevAuthConfig) -> DevAuthConfig {
    let storage = config.storage.get_or_insert_with(StorageConfig::default);
    storage.backend.get_or_insert(StorageBackend::Sqlite);
    storage.path.get_or_insert_with(|| DEFAULT_DB_PATH.to_string());
    storage.timeout_ms.get_or_insert(DEFAULT_STORAGE_TIMEOUT_MS);
    config
}

/// Key paths have no default; validation reports them.
fn apply_jwt_defaults(mut config: DevAuthConfig) -> DevAuthConfig {
    let jwt = config.jwt.get_or_insert_with(JwtConfig::default);
    jwt.issuer.get_or_insert_with(|| DEFAULT_ISSUER.to_string());
    jwt.expiration_secs.get_or_insert(DEFAULT_EXPIRATION_SECS);
    jwt.leeway_secs.get_or_insert(DEFAULT_LEEWAY_SECS);
    config
}

fn apply_tenancy_defaults(mut config: DevAuthConfig) -> DevAuthConfig {
    let tenancy = config.tenancy.get_or_insert_with(TenancyConfig::default);
    tenancy.mode.get_or_insert(TenancyMode::Single);
    tenancy
        .management_header
        .get_or_insert_with(|| DEFAULT_MANAGEMENT_HEADER.to_string());
    config
}

fn apply_pagination_defaults(mut config: DevAuthConfig) -> DevAuthConfig {
    let pagination = config.pagination.get_or_insert_with(PaginationConfig::default);
    pagination.default_per_page.get_or_insert(DEFAULT_PER_PAGE);
    pagination.max_per_page.get_or_insert(DEFAULT_MAX_PER_PAGE);
    config
}

fn apply_device_defaults(mut config: DevAuthConfig) -> DevAuthConfig {
    let devices = config.devices.get_or_insert_with(DevicesConfig::default);
    devices.allow_accepted_key_rotation.get_or_insert(true);
    config
}

fn apply_logging_defaults(mut config: DevAuthConfig) -> DevAuthConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.json.get_or_insert(false);
    config
}
