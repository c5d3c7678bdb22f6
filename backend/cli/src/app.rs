//! Service wiring: storage, keys, token authority, tenant resolver, gateway.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use devauth_config::{StorageBackend, TenancyMode};
use devauth_core::{Clock, DeviceRegistry, SystemClock, TokenStore};
use devauth_gateway::{start_server, GatewaySettings, GatewayState};
use devauth_security::{TenantResolver, TokenAuthority, TokenKeys, TokenPolicy};
use devauth_service::{DevAuth, DevAuthOptions};
use devauth_store::{MemoryStore, SqliteStore};

use crate::config::Settings;

type Stores = (Arc<dyn DeviceRegistry>, Arc<dyn TokenStore>);

async fn read_key(path: &Path, what: &str) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {what} from {}", path.display()))
}

fn open_store(settings: &Settings) -> Result<Stores> {
    match settings.storage_backend {
        StorageBackend::Sqlite => {
            let store = Arc::new(SqliteStore::open(&settings.db_path)?);
            Ok((store.clone(), store))
        }
        StorageBackend::Memory => {
            info!("Using in-memory device store");
            let store = Arc::new(MemoryStore::new());
            Ok((store.clone(), store))
        }
    }
}

async fn tenant_resolver(settings: &Settings) -> Result<TenantResolver> {
    Ok(match settings.tenancy_mode {
        TenancyMode::Single => TenantResolver::single(),
        TenancyMode::Passthrough => TenantResolver::passthrough(),
        TenancyMode::Signed => {
            let path = settings
                .tenant_verify_key_path
                .as_deref()
                .context("Signed tenancy requires a verification key")?;
            TenantResolver::signed(&read_key(path, "tenant verification key").await?)?
        }
    })
}

/// Build the gateway state for the given settings.
pub async fn build_state(settings: &Settings) -> Result<GatewayState> {
    let (devices, tokens) = open_store(settings)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let keys = TokenKeys::from_pem(
        &read_key(&settings.private_key_path, "server private key").await?,
        &read_key(&settings.public_key_path, "server public key").await?,
    )?;
    let policy = TokenPolicy {
        issuer: settings.issuer.clone(),
        expiration: chrono::Duration::seconds(settings.expiration_secs),
        leeway: chrono::Duration::seconds(settings.leeway_secs),
        storage_timeout: settings.storage_timeout,
    };
    let authority = Arc::new(TokenAuthority::new(
        keys,
        policy,
        devices.clone(),
        tokens,
        clock.clone(),
    ));

    let tenants = tenant_resolver(settings).await?;
    info!(mode = ?tenants.mode(), "Tenant resolution configured");

    let service = DevAuth::new(
        devices,
        authority,
        tenants,
        clock,
        DevAuthOptions {
            storage_timeout: settings.storage_timeout,
            allow_accepted_key_rotation: settings.allow_accepted_key_rotation,
        },
    );
    let gateway = GatewaySettings::new(
        &settings.management_header,
        settings.default_per_page,
        settings.max_per_page,
    )?;
    Ok(GatewayState::new(Arc::new(service), gateway))
}

pub async fn run_server(settings: Settings) -> Result<()> {
    let addr = settings.socket_addr()?;
    info!(
        addr = %addr,
        backend = ?settings.storage_backend,
        issuer = %settings.issuer,
        "Starting devauth"
    );
    let state = build_state(&settings).await?;
    start_server(addr, state).await
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use devauth_core::{DeviceStatus, PageRequest, TenantId};
    use devauth_logging::LoggingOptions;
    use devauth_security::sign_request;
    use devauth_service::DevAuthApi;

    use super::*;

    const SERVER_PRIVATE: &str = include_str!("../../../testdata/server_private.pem");
    const SERVER_PUBLIC: &str = include_str!("../../../testdata/server_public.pem");
    const DEVICE_PRIVATE: &str = include_str!("../../../testdata/device_private.pem");
    const DEVICE_PUBLIC: &str = include_str!("../../../testdata/device_public.pem");

    fn write_keys(name: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("devauth-cli-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let private = dir.join("server.pem");
        let public = dir.join("server.pub");
        std::fs::write(&private, SERVER_PRIVATE).unwrap();
        std::fs::write(&public, SERVER_PUBLIC).unwrap();
        (private, public)
    }

    fn settings(private_key_path: PathBuf, public_key_path: PathBuf) -> Settings {
        Settings {
            bind_address: "127.0.0.1".into(),
            port: 0,
            storage_backend: StorageBackend::Memory,
            db_path: String::new(),
            storage_timeout: Duration::from_secs(5),
            private_key_path,
            public_key_path,
            issuer: "devauth".into(),
            expiration_secs: 3600,
            leeway_secs: 0,
            tenancy_mode: TenancyMode::Single,
            tenant_verify_key_path: None,
            management_header: "x-devauth-tenant".into(),
            default_per_page: 20,
            max_per_page: 500,
            allow_accepted_key_rotation: true,
            logging: LoggingOptions::default(),
        }
    }

    #[tokio::test]
    async fn wired_service_authenticates_accepted_device() {
        let (private, public) = write_keys("wired");
        let state = build_state(&settings(private, public)).await.unwrap();

        let body = serde_json::json!({
            "id_data": "{\"mac\":\"00:11:22:33:44:55\"}",
            "pubkey": DEVICE_PUBLIC,
        })
        .to_string();
        let signature = sign_request(body.as_bytes(), DEVICE_PRIVATE).unwrap();

        let err = state.api.submit_auth_request(body.as_bytes(), Some(&signature)).await;
        assert!(err.is_err());

        let tenant = TenantId::default();
        let page = state.api.list_devices(&tenant, PageRequest::new(1, 20)).await.unwrap();
        assert_eq!(page.items.len(), 1);
        let device_id = page.items[0].id.clone();
        state
            .api
            .set_device_status(&tenant, &device_id, DeviceStatus::Accepted)
            .await
            .unwrap();

        let raw = state.api.submit_auth_request(body.as_bytes(), Some(&signature)).await.unwrap();
        let verified = state.api.verify_token(&raw).await.unwrap();
        assert_eq!(verified.device_id, device_id);
    }

    #[tokio::test]
    async fn missing_key_file_is_reported() {
        let (_, public) = write_keys("missing");
        let err = build_state(&settings(PathBuf::from("/nonexistent/server.pem"), public))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("server private key"));
    }

    #[tokio::test]
    async fn signed_tenancy_requires_key_file() {
        let (private, public) = write_keys("signed");
        let mut settings = settings(private, public);
        settings.tenancy_mode = TenancyMode::Signed;
        assert!(build_state(&settings).await.is_err());
    }
}
