//! Token authority: issues, verifies and revokes device tokens.
//!
//! Tokens are RS256 JWTs signed with the server key. The JWT is only the
//! serialized form; the authoritative record (and its `revoked` flag) lives in
//! the [`TokenStore`], and the bound device's status is re-checked on every
//! verification.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use devauth_core::{
    bounded, Clock, DevAuthError, DeviceRegistry, DeviceStatus, TenantId, Token, TokenStore,
    DEFAULT_STORAGE_TIMEOUT,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Default token validity window: one week.
pub const DEFAULT_EXPIRATION_SECS: i64 = 7 * 24 * 60 * 60;

pub const DEFAULT_ISSUER: &str = "devauth";

/// Claims carried by a device token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub jti: String,
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tenant: String,
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub token_id: String,
    pub device_id: String,
    pub tenant_id: TenantId,
    pub expires_at: DateTime<Utc>,
}

/// Server signing key pair.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn from_pem(private_pem: &str, public_pem: &str) -> Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes())
                .context("Failed to parse token signing key")?,
            decoding: DecodingKey::from_rsa_pem(public_pem.as_bytes())
                .context("Failed to parse token verification key")?,
        })
    }
}

impl fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenKeys(***)")
    }
}

#[derive(Debug, Clone)]
pub struct TokenPolicy {
    pub issuer: String,
    pub expiration: chrono::Duration,
    /// Fixed clock-skew margin added to `exp` at verification time.
    pub leeway: chrono::Duration,
    pub storage_timeout: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            expiration: chrono::Duration::seconds(DEFAULT_EXPIRATION_SECS),
            leeway: chrono::Duration::zero(),
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }
}

pub struct TokenAuthority {
    keys: TokenKeys,
    validation: Validation,
    policy: TokenPolicy,
    devices: Arc<dyn DeviceRegistry>,
    tokens: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl TokenAuthority {
    pub fn new(
        keys: TokenKeys,
        policy: TokenPolicy,
        devices: Arc<dyn DeviceRegistry>,
        tokens: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        // expiry is judged against our own clock in `verify`
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[policy.issuer.as_str()]);
        Self { keys, validation, policy, devices, tokens, clock }
    }

    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// Issue (or reuse) the token of an accepted device.
    ///
    /// Fails with [`DevAuthError::NotEntitled`] unless the device is `accepted`.
    pub async fn issue(&self, tenant: &TenantId, device_id: &str) -> Result<Token, DevAuthError> {
        self.ensure_accepted(tenant, device_id).await?;

        let now = self.clock.now();
        let candidate = self.mint(tenant, device_id, now)?;
        let candidate_id = candidate.id.clone();
        let token = bounded(
            self.policy.storage_timeout,
            "insert_or_get_live",
            self.tokens.insert_or_get_live(candidate, now),
        )
        .await?;

        // a concurrent reject/reset may have landed between the check and the insert
        if let Err(e) = self.ensure_accepted(tenant, device_id).await {
            bounded(
                self.policy.storage_timeout,
                "revoke_token",
                self.tokens.revoke_token(tenant, &token.id),
            )
            .await?;
            return Err(e);
        }

        if token.id == candidate_id {
            info!(device_id = %device_id, tenant = %tenant, token_id = %token.id, "Issued token");
        } else {
            debug!(device_id = %device_id, token_id = %token.id, "Reusing live token");
        }
        Ok(token)
    }

    /// Check integrity, expiry, existence, revocation, and the bound device's status.
    pub async fn verify(&self, raw: &str) -> Result<VerifiedToken, DevAuthError> {
        let claims = decode::<Claims>(raw, &self.keys.decoding, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "Token failed integrity check");
                DevAuthError::TokenInvalid
            })?
            .claims;

        let now = self.clock.now();
        let leeway = self.policy.leeway.num_seconds();
        if now.timestamp() >= claims.exp.saturating_add(leeway) {
            debug!(token_id = %claims.jti, "Token expired");
            return Err(DevAuthError::TokenExpired);
        }

        let tenant = TenantId::new(claims.tenant.clone());
        let token = bounded(
            self.policy.storage_timeout,
            "get_token",
            self.tokens.get_token(&tenant, &claims.jti),
        )
        .await?
        .ok_or_else(|| {
            debug!(token_id = %claims.jti, "Unknown token");
            DevAuthError::TokenInvalid
        })?;
        if token.revoked || token.device_id != claims.sub {
            debug!(token_id = %token.id, "Token revoked");
            return Err(DevAuthError::TokenInvalid);
        }

        let device = bounded(
            self.policy.storage_timeout,
            "get_device",
            self.devices.get_device(&tenant, &claims.sub),
        )
        .await?;
        match device {
            Some(d) if d.status == DeviceStatus::Accepted => Ok(VerifiedToken {
                token_id: token.id,
                device_id: d.id,
                tenant_id: tenant,
                expires_at: token.expires_at,
            }),
            _ => {
                debug!(token_id = %token.id, device_id = %claims.sub, "Token device no longer accepted");
                Err(DevAuthError::TokenInvalid)
            }
        }
    }

    pub async fn revoke(&self, tenant: &TenantId, token_id: &str) -> Result<(), DevAuthError> {
        let found = bounded(
            self.policy.storage_timeout,
            "revoke_token",
            self.tokens.revoke_token(tenant, token_id),
        )
        .await?;
        if !found {
            return Err(DevAuthError::TokenNotFound);
        }
        info!(token_id = %token_id, tenant = %tenant, "Revoked token");
        Ok(())
    }

    /// React to a device status change: anything but `accepted` loses its tokens.
    pub async fn on_status_changed(
        &self,
        tenant: &TenantId,
        device_id: &str,
        status: DeviceStatus,
    ) -> Result<usize, DevAuthError> {
        if !status.revokes_tokens() {
            return Ok(0);
        }
        let revoked = bounded(
            self.policy.storage_timeout,
            "revoke_device_tokens",
            self.tokens.revoke_device_tokens(tenant, device_id),
        )
        .await?;
        if revoked > 0 {
            info!(device_id = %device_id, tenant = %tenant, revoked, "Revoked device tokens");
        }
        Ok(revoked)
    }

    async fn ensure_accepted(&self, tenant: &TenantId, device_id: &str) -> Result<(), DevAuthError> {
        let device = bounded(
            self.policy.storage_timeout,
            "get_device",
            self.devices.get_device(tenant, device_id),
        )
        .await?;
        match device {
            Some(d) if d.status == DeviceStatus::Accepted => Ok(()),
            Some(d) => {
                debug!(device_id = %device_id, status = %d.status, "Device not entitled to a token");
                Err(DevAuthError::NotEntitled)
            }
            None => Err(DevAuthError::NotEntitled),
        }
    }

    fn mint(&self, tenant: &TenantId, device_id: &str, now: DateTime<Utc>) -> Result<Token, DevAuthError> {
        let expires = now + self.policy.expiration;
        let claims = Claims {
            jti: Uuid::new_v4().to_string(),
            sub: device_id.to_string(),
            iss: self.policy.issuer.clone(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
            tenant: tenant.as_str().to_string(),
        };
        let raw = encode(&Header::new(Algorithm::RS256), &claims, &self.keys.encoding)
            .context("Failed to sign device token")?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| anyhow!("token expiry out of range"))?;
        Ok(Token {
            id: claims.jti,
            device_id: claims.sub,
            tenant_id: tenant.clone(),
            raw,
            issued_at: now,
            expires_at,
            revoked: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use devauth_core::{Device, ManualClock};
    use devauth_store::MemoryStore;

    const SERVER_PRIVATE: &str = include_str!("../../../testdata/server_private.pem");
    const SERVER_PUBLIC: &str = include_str!("../../../testdata/server_public.pem");
    const OTHER_PRIVATE: &str = include_str!("../../../testdata/device_other_private.pem");

    struct Fixture {
        authority: Arc<TokenAuthority>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture(policy: TokenPolicy) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let keys = TokenKeys::from_pem(SERVER_PRIVATE, SERVER_PUBLIC).unwrap();
        let authority = Arc::new(TokenAuthority::new(
            keys,
            policy,
            store.clone(),
            store.clone(),
            clock.clone(),
        ));
        Fixture { authority, store, clock }
    }

    async fn device(f: &Fixture, tenant: &str, status: DeviceStatus) -> Device {
        let (d, _) = f
            .store
            .get_or_create(Device::new(TenantId::new(tenant), "id-0001", "pubkey", f.clock.now()))
            .await
            .unwrap();
        f.store
            .update_status(&d.tenant_id, &d.id, status, f.clock.now())
            .await
            .unwrap();
        d
    }

    #[tokio::test]
    async fn pending_and_unknown_devices_are_not_entitled() {
        let f = fixture(TokenPolicy::default());
        let d = device(&f, "", DeviceStatus::Pending).await;
        assert!(matches!(
            f.authority.issue(&d.tenant_id, &d.id).await,
            Err(DevAuthError::NotEntitled)
        ));
        assert!(matches!(
            f.authority.issue(&TenantId::default(), "ghost").await,
            Err(DevAuthError::NotEntitled)
        ));
    }

    #[tokio::test]
    async fn issued_token_verifies_and_is_reused() {
        let f = fixture(TokenPolicy::default());
        let d = device(&f, "t1", DeviceStatus::Accepted).await;

        let token = f.authority.issue(&d.tenant_id, &d.id).await.unwrap();
        assert!(!token.raw.is_empty());
        let again = f.authority.issue(&d.tenant_id, &d.id).await.unwrap();
        assert_eq!(again.raw, token.raw);

        let verified = f.authority.verify(&token.raw).await.unwrap();
        assert_eq!(verified.device_id, d.id);
        assert_eq!(verified.tenant_id, TenantId::new("t1"));
        assert_eq!(verified.token_id, token.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_issuance_yields_one_live_token() {
        let f = fixture(TokenPolicy::default());
        let d = device(&f, "", DeviceStatus::Accepted).await;

        let attempts = (0..16).map(|_| {
            let authority = Arc::clone(&f.authority);
            let (tenant, id) = (d.tenant_id.clone(), d.id.clone());
            tokio::spawn(async move { authority.issue(&tenant, &id).await.unwrap() })
        });
        let tokens: Vec<Token> = futures::future::join_all(attempts)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let ids: std::collections::HashSet<_> = tokens.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids.len(), 1);
        let mut valid = 0;
        for t in &tokens {
            if f.authority.verify(&t.raw).await.is_ok() {
                valid += 1;
            }
        }
        assert_eq!(valid, tokens.len());
    }

    #[tokio::test]
    async fn rejection_invalidates_tokens() {
        let f = fixture(TokenPolicy::default());
        let d = device(&f, "", DeviceStatus::Accepted).await;
        let token = f.authority.issue(&d.tenant_id, &d.id).await.unwrap();

        f.store
            .update_status(&d.tenant_id, &d.id, DeviceStatus::Rejected, f.clock.now())
            .await
            .unwrap();
        let revoked = f
            .authority
            .on_status_changed(&d.tenant_id, &d.id, DeviceStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(revoked, 1);
        assert!(matches!(f.authority.verify(&token.raw).await, Err(DevAuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn device_status_is_checked_even_without_revocation() {
        let f = fixture(TokenPolicy::default());
        let d = device(&f, "", DeviceStatus::Accepted).await;
        let token = f.authority.issue(&d.tenant_id, &d.id).await.unwrap();

        // status flipped behind the authority's back
        f.store
            .update_status(&d.tenant_id, &d.id, DeviceStatus::Pending, f.clock.now())
            .await
            .unwrap();
        assert!(matches!(f.authority.verify(&token.raw).await, Err(DevAuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn expiry_uses_authority_clock_and_leeway() {
        let f = fixture(TokenPolicy {
            expiration: ChronoDuration::seconds(60),
            leeway: ChronoDuration::seconds(30),
            ..TokenPolicy::default()
        });
        let d = device(&f, "", DeviceStatus::Accepted).await;
        let token = f.authority.issue(&d.tenant_id, &d.id).await.unwrap();

        f.clock.advance(ChronoDuration::seconds(75));
        assert!(f.authority.verify(&token.raw).await.is_ok());

        f.clock.advance(ChronoDuration::seconds(30));
        assert!(matches!(f.authority.verify(&token.raw).await, Err(DevAuthError::TokenExpired)));

        // an expired token is replaced rather than reused
        let fresh = f.authority.issue(&d.tenant_id, &d.id).await.unwrap();
        assert_ne!(fresh.id, token.id);
        assert!(f.authority.verify(&fresh.raw).await.is_ok());
    }

    #[tokio::test]
    async fn forged_and_garbage_tokens_are_invalid() {
        let f = fixture(TokenPolicy::default());
        let d = device(&f, "", DeviceStatus::Accepted).await;
        let token = f.authority.issue(&d.tenant_id, &d.id).await.unwrap();

        let forged_keys = TokenKeys::from_pem(OTHER_PRIVATE, SERVER_PUBLIC).unwrap();
        let claims = decode::<Claims>(&token.raw, &f.authority.keys.decoding, &f.authority.validation)
            .unwrap()
            .claims;
        let forged = encode(&Header::new(Algorithm::RS256), &claims, &forged_keys.encoding).unwrap();

        assert!(matches!(f.authority.verify(&forged).await, Err(DevAuthError::TokenInvalid)));
        assert!(matches!(f.authority.verify("dummytoken").await, Err(DevAuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn unknown_token_id_is_invalid() {
        let f = fixture(TokenPolicy::default());
        let d = device(&f, "", DeviceStatus::Accepted).await;
        let now = f.clock.now();
        // correctly signed but never stored
        let stray = f.authority.mint(&d.tenant_id, &d.id, now).unwrap();
        assert!(matches!(f.authority.verify(&stray.raw).await, Err(DevAuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn explicit_revocation() {
        let f = fixture(TokenPolicy::default());
        let d = device(&f, "", DeviceStatus::Accepted).await;
        let token = f.authority.issue(&d.tenant_id, &d.id).await.unwrap();

        f.authority.revoke(&d.tenant_id, &token.id).await.unwrap();
        f.authority.revoke(&d.tenant_id, &token.id).await.unwrap();
        assert!(matches!(f.authority.verify(&token.raw).await, Err(DevAuthError::TokenInvalid)));
        assert!(matches!(
            f.authority.revoke(&d.tenant_id, "missing").await,
            Err(DevAuthError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn accepting_does_not_revoke() {
        let f = fixture(TokenPolicy::default());
        let d = device(&f, "", DeviceStatus::Accepted).await;
        let token = f.authority.issue(&d.tenant_id, &d.id).await.unwrap();
        let revoked = f
            .authority
            .on_status_changed(&d.tenant_id, &d.id, DeviceStatus::Accepted)
            .await
            .unwrap();
        assert_eq!(revoked, 0);
        assert!(f.authority.verify(&token.raw).await.is_ok());
    }
}
