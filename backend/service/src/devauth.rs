//! Auth request processing and device management.
//!
//! An auth request runs through a fixed pipeline: decode, field validation,
//! signature presence, signature check, tenant resolution, device
//! create-or-fetch, token issuance. The first failing step ends it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devauth_core::{
    bounded, AuthRequest, Clock, DevAuthError, Device, DeviceRegistry, DeviceStatus, Page,
    PageRequest, Result, TenantId, DEFAULT_STORAGE_TIMEOUT,
};
use devauth_security::{
    public_key_is_valid, verify_signature, TenantResolver, TokenAuthority, VerifiedToken,
};
use tracing::{debug, info};

use crate::api::DevAuthApi;

#[derive(Debug, Clone)]
pub struct DevAuthOptions {
    pub storage_timeout: Duration,
    /// Let an accepted device replace its registered key by signing with a new one.
    pub allow_accepted_key_rotation: bool,
}

impl Default for DevAuthOptions {
    fn default() -> Self {
        Self {
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
            allow_accepted_key_rotation: true,
        }
    }
}

pub struct DevAuth {
    devices: Arc<dyn DeviceRegistry>,
    authority: Arc<TokenAuthority>,
    tenants: TenantResolver,
    clock: Arc<dyn Clock>,
    options: DevAuthOptions,
}

impl DevAuth {
    pub fn new(
        devices: Arc<dyn DeviceRegistry>,
        authority: Arc<TokenAuthority>,
        tenants: TenantResolver,
        clock: Arc<dyn Clock>,
        options: DevAuthOptions,
    ) -> Self {
        Self { devices, authority, tenants, clock, options }
    }

    /// Find the device behind a verified request, registering it as pending
    /// on first sighting.
    async fn lookup_device(&self, tenant: &TenantId, req: &AuthRequest) -> Result<Device> {
        let now = self.clock.now();
        let candidate = Device::new(
            tenant.clone(),
            req.identity_data.as_str(),
            req.public_key.as_str(),
            now,
        );
        let (device, created) = bounded(
            self.options.storage_timeout,
            "get_or_create",
            self.devices.get_or_create(candidate),
        )
        .await?;

        if created {
            info!(device_id = %device.id, tenant = %tenant, "Registered new device as pending");
            return Ok(device);
        }
        if device.public_key.trim() == req.public_key.trim() {
            return Ok(device);
        }

        // first-sighting key is fixed until the device is trusted
        if !self.options.allow_accepted_key_rotation || device.status != DeviceStatus::Accepted {
            debug!(device_id = %device.id, status = %device.status, "Refused key change");
            return Err(DevAuthError::NotEntitled);
        }
        let rotated = bounded(
            self.options.storage_timeout,
            "rotate_key",
            self.devices.rotate_key(tenant, &device.id, &req.public_key, now),
        )
        .await?;
        if !rotated {
            debug!(device_id = %device.id, "Device left accepted before key rotation");
            return Err(DevAuthError::NotEntitled);
        }
        info!(device_id = %device.id, tenant = %tenant, "Rotated device key");
        Ok(device)
    }
}

#[async_trait]
impl DevAuthApi for DevAuth {
    async fn submit_auth_request(&self, body: &[u8], signature: Option<&str>) -> Result<String> {
        let req = AuthRequest::parse(body)?;
        req.validate()?;

        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(DevAuthError::MissingSignature)?;
        if !public_key_is_valid(&req.public_key) {
            return Err(DevAuthError::validation(
                "invalid auth request: cannot decode public key",
            ));
        }
        if !verify_signature(body, &req.public_key, signature) {
            debug!("Auth request signature did not verify");
            return Err(DevAuthError::SignatureInvalid);
        }

        let tenant = self.tenants.resolve(req.tenant_token.as_deref())?;
        let device = self.lookup_device(&tenant, &req).await?;
        let token = self.authority.issue(&tenant, &device.id).await?;
        Ok(token.raw)
    }

    async fn set_device_status(
        &self,
        tenant: &TenantId,
        device_id: &str,
        status: DeviceStatus,
    ) -> Result<()> {
        let found = bounded(
            self.options.storage_timeout,
            "update_status",
            self.devices.update_status(tenant, device_id, status, self.clock.now()),
        )
        .await?;
        if !found {
            return Err(DevAuthError::DeviceNotFound);
        }
        // status is written first so verify already sees it while tokens are revoked
        self.authority.on_status_changed(tenant, device_id, status).await?;
        info!(device_id = %device_id, tenant = %tenant, status = %status, "Device status set");
        Ok(())
    }

    async fn get_device(&self, tenant: &TenantId, device_id: &str) -> Result<Device> {
        bounded(
            self.options.storage_timeout,
            "get_device",
            self.devices.get_device(tenant, device_id),
        )
        .await?
        .ok_or(DevAuthError::DeviceNotFound)
    }

    async fn list_devices(&self, tenant: &TenantId, page: PageRequest) -> Result<Page<Device>> {
        let items = bounded(
            self.options.storage_timeout,
            "list_devices",
            self.devices.list_devices(tenant, page.skip(), page.limit()),
        )
        .await?;
        Ok(page.paginate(items))
    }

    async fn verify_token(&self, raw: &str) -> Result<VerifiedToken> {
        self.authority.verify(raw.trim()).await
    }

    async fn revoke_token(&self, tenant: &TenantId, token_id: &str) -> Result<()> {
        self.authority.revoke(tenant, token_id).await
    }
}
