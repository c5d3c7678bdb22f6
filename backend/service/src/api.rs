use async_trait::async_trait;
use devauth_core::{Device, DeviceStatus, Page, PageRequest, Result, TenantId};
use devauth_security::VerifiedToken;

/// Operations offered to the boundary layer.
///
/// Every management call is scoped by an explicit tenant; the auth request
/// resolves its own tenant from the submitted tenant token.
#[async_trait]
pub trait DevAuthApi: Send + Sync {
    /// Process one signed auth request and return the serialized token.
    async fn submit_auth_request(&self, body: &[u8], signature: Option<&str>) -> Result<String>;

    async fn set_device_status(
        &self,
        tenant: &TenantId,
        device_id: &str,
        status: DeviceStatus,
    ) -> Result<()>;

    async fn accept_device(&self, tenant: &TenantId, device_id: &str) -> Result<()> {
        self.set_device_status(tenant, device_id, DeviceStatus::Accepted).await
    }

    async fn reject_device(&self, tenant: &TenantId, device_id: &str) -> Result<()> {
        self.set_device_status(tenant, device_id, DeviceStatus::Rejected).await
    }

    async fn reset_device(&self, tenant: &TenantId, device_id: &str) -> Result<()> {
        self.set_device_status(tenant, device_id, DeviceStatus::Pending).await
    }

    async fn get_device(&self, tenant: &TenantId, device_id: &str) -> Result<Device>;

    async fn list_devices(&self, tenant: &TenantId, page: PageRequest) -> Result<Page<Device>>;

    async fn verify_token(&self, raw: &str) -> Result<VerifiedToken>;

    async fn revoke_token(&self, tenant: &TenantId, token_id: &str) -> Result<()>;
}
