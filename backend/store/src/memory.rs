//! In-process store for tests and ephemeral deployments.
//!
//! All state sits behind one lock, which makes every trait method atomic.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devauth_core::{Device, DeviceRegistry, DeviceStatus, TenantId, Token, TokenStore};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct State {
    /// (tenant, device id) -> device; BTreeMap keeps listings ordered by id.
    devices: BTreeMap<(TenantId, String), Device>,
    /// (tenant, identity data) -> device id
    identities: HashMap<(TenantId, String), String>,
    /// (tenant, token id) -> token
    tokens: HashMap<(TenantId, String), Token>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceRegistry for MemoryStore {
    async fn get_or_create(&self, candidate: Device) -> Result<(Device, bool)> {
        let mut state = self.state.write().await;
        let identity = (candidate.tenant_id.clone(), candidate.identity_data.clone());
        if let Some(id) = state.identities.get(&identity) {
            let key = (candidate.tenant_id.clone(), id.clone());
            if let Some(existing) = state.devices.get(&key) {
                return Ok((existing.clone(), false));
            }
        }
        state.identities.insert(identity, candidate.id.clone());
        state
            .devices
            .insert((candidate.tenant_id.clone(), candidate.id.clone()), candidate.clone());
        debug!(device_id = %candidate.id, "Stored new device");
        Ok((candidate, true))
    }

    async fn get_device(&self, tenant: &TenantId, id: &str) -> Result<Option<Device>> {
        let state = self.state.read().await;
        Ok(state.devices.get(&(tenant.clone(), id.to_string())).cloned())
    }

    async fn list_devices(&self, tenant: &TenantId, skip: usize, limit: usize) -> Result<Vec<Device>> {
        let state = self.state.read().await;
        Ok(state
            .devices
            .iter()
            .filter(|((t, _), _)| t == tenant)
            .map(|(_, d)| d.clone())
            .skip(skip)
            .take(limit)
            .collect())
    }

    async fn update_status(
        &self,
        tenant: &TenantId,
        id: &str,
        status: DeviceStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.devices.get_mut(&(tenant.clone(), id.to_string())) {
            Some(device) => {
                device.status = status;
                device.updated_ts = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rotate_key(
        &self,
        tenant: &TenantId,
        id: &str,
        public_key: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.devices.get_mut(&(tenant.clone(), id.to_string())) {
            Some(device) if device.status == DeviceStatus::Accepted => {
                device.public_key = public_key.to_string();
                device.updated_ts = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_or_get_live(&self, candidate: Token, now: DateTime<Utc>) -> Result<Token> {
        let mut state = self.state.write().await;
        for token in state.tokens.values_mut().filter(|t| {
            !t.revoked && t.tenant_id == candidate.tenant_id && t.device_id == candidate.device_id
        }) {
            if token.is_expired_at(now) {
                token.revoked = true;
            } else {
                return Ok(token.clone());
            }
        }
        state
            .tokens
            .insert((candidate.tenant_id.clone(), candidate.id.clone()), candidate.clone());
        Ok(candidate)
    }

    async fn get_token(&self, tenant: &TenantId, id: &str) -> Result<Option<Token>> {
        let state = self.state.read().await;
        Ok(state.tokens.get(&(tenant.clone(), id.to_string())).cloned())
    }

    async fn revoke_token(&self, tenant: &TenantId, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.tokens.get_mut(&(tenant.clone(), id.to_string())) {
            Some(token) => {
                token.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_device_tokens(&self, tenant: &TenantId, device_id: &str) -> Result<usize> {
        let mut state = self.state.write().await;
        let mut revoked = 0;
        for token in state.tokens.values_mut() {
            if !token.revoked && &token.tenant_id == tenant && token.device_id == device_id {
                token.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}
