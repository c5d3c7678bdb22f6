use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Device, DeviceStatus, TenantId, Token};

/// Durable owner of [`Device`] records.
///
/// Every lookup is scoped by tenant; `(identity_data, tenant_id)` uniqueness is
/// the implementation's responsibility, not the caller's.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Insert `candidate` unless a device with the same identity data already
    /// exists in its tenant, in which case the existing record is returned.
    /// The flag is `true` when `candidate` was stored.
    async fn get_or_create(&self, candidate: Device) -> Result<(Device, bool)>;

    async fn get_device(&self, tenant: &TenantId, id: &str) -> Result<Option<Device>>;

    /// Devices ordered by id.
    async fn list_devices(&self, tenant: &TenantId, skip: usize, limit: usize)
        -> Result<Vec<Device>>;

    /// Returns `false` if the device does not exist.
    async fn update_status(
        &self,
        tenant: &TenantId,
        id: &str,
        status: DeviceStatus,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Replace the public key only while the device is `accepted`.
    /// Returns `false` when nothing was updated.
    async fn rotate_key(
        &self,
        tenant: &TenantId,
        id: &str,
        public_key: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Durable owner of [`Token`] records.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Atomically return the device's live token, or store `candidate` if there
    /// is none. Unrevoked tokens already expired at `now` are revoked first.
    async fn insert_or_get_live(&self, candidate: Token, now: DateTime<Utc>) -> Result<Token>;

    async fn get_token(&self, tenant: &TenantId, id: &str) -> Result<Option<Token>>;

    /// Returns `false` if the token does not exist; revoking twice is fine.
    async fn revoke_token(&self, tenant: &TenantId, id: &str) -> Result<bool>;

    /// Revoke every outstanding token of a device, returning how many changed.
    async fn revoke_device_tokens(&self, tenant: &TenantId, device_id: &str) -> Result<usize>;
}
