//! Tenant scope resolution for incoming auth requests.

use std::fmt;

use anyhow::{Context, Result};
use devauth_core::{DevAuthError, TenantId};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How tenant tokens are interpreted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenantMode {
    /// Every request belongs to the default scope.
    #[default]
    Single,
    /// A non-empty tenant token is the tenant id.
    Passthrough,
    /// The tenant token is an RS256 JWT carrying a `tenant` claim.
    Signed,
}

/// Claims of a signed tenant token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantClaims {
    pub tenant: String,
}

enum Strategy {
    Single,
    Passthrough,
    Signed { key: DecodingKey, validation: Validation },
}

pub struct TenantResolver {
    strategy: Strategy,
}

impl fmt::Debug for TenantResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantResolver").field("mode", &self.mode()).finish()
    }
}

impl TenantResolver {
    pub fn single() -> Self {
        Self { strategy: Strategy::Single }
    }

    pub fn passthrough() -> Self {
        Self { strategy: Strategy::Passthrough }
    }

    /// Verify tenant tokens with the tenant administration service's public key.
    pub fn signed(verify_key_pem: &str) -> Result<Self> {
        let key = DecodingKey::from_rsa_pem(verify_key_pem.as_bytes())
            .context("Failed to parse tenant verification key")?;
        let mut validation = Validation::new(Algorithm::RS256);
        // exp is honoured when present but not required
        validation.required_spec_claims.clear();
        Ok(Self { strategy: Strategy::Signed { key, validation } })
    }

    pub fn mode(&self) -> TenantMode {
        match self.strategy {
            Strategy::Single => TenantMode::Single,
            Strategy::Passthrough => TenantMode::Passthrough,
            Strategy::Signed { .. } => TenantMode::Signed,
        }
    }

    /// Map an optional tenant token to the scope threaded through storage calls.
    pub fn resolve(&self, tenant_token: Option<&str>) -> Result<TenantId, DevAuthError> {
        match &self.strategy {
            Strategy::Single => Ok(TenantId::default()),
            Strategy::Passthrough => Ok(tenant_token
                .filter(|t| !t.is_empty())
                .map(TenantId::new)
                .unwrap_or_default()),
            Strategy::Signed { key, validation } => {
                let token = tenant_token
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or(DevAuthError::NotEntitled)?;
                let data = decode::<TenantClaims>(token, key, validation).map_err(|e| {
                    debug!(error = %e, "Tenant token rejected");
                    DevAuthError::NotEntitled
                })?;
                if data.claims.tenant.is_empty() {
                    debug!("Tenant token carries no tenant");
                    return Err(DevAuthError::NotEntitled);
                }
                Ok(TenantId::new(data.claims.tenant))
            }
        }
    }
}

impl Default for TenantResolver {
    fn default() -> Self {
        Self::single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const ISSUER_PRIVATE: &str = include_str!("../../../testdata/tenantadm_private.pem");
    const ISSUER_PUBLIC: &str = include_str!("../../../testdata/tenantadm_public.pem");
    const SERVER_PRIVATE: &str = include_str!("../../../testdata/server_private.pem");

    fn tenant_token(tenant: &str, signer: &str) -> String {
        let key = EncodingKey::from_rsa_pem(signer.as_bytes()).unwrap();
        encode(
            &Header::new(Algorithm::RS256),
            &TenantClaims { tenant: tenant.to_string() },
            &key,
        )
        .unwrap()
    }

    #[test]
    fn single_mode_ignores_token() {
        let r = TenantResolver::single();
        assert_eq!(r.resolve(Some("tenant-0001")).unwrap(), TenantId::default());
        assert_eq!(r.resolve(None).unwrap(), TenantId::default());
    }

    #[test]
    fn passthrough_uses_token_verbatim() {
        let r = TenantResolver::passthrough();
        assert_eq!(r.resolve(Some("t1")).unwrap(), TenantId::new("t1"));
        assert_eq!(r.resolve(Some(" t1 ")).unwrap(), TenantId::new(" t1 "));
        assert_eq!(r.resolve(Some("")).unwrap(), TenantId::default());
        assert_eq!(r.resolve(None).unwrap(), TenantId::default());
    }

    #[test]
    fn signed_mode_extracts_claim() {
        let r = TenantResolver::signed(ISSUER_PUBLIC).unwrap();
        let token = tenant_token("acme", ISSUER_PRIVATE);
        assert_eq!(r.resolve(Some(&token)).unwrap(), TenantId::new("acme"));
    }

    #[test]
    fn signed_mode_rejects_foreign_or_missing_tokens() {
        let r = TenantResolver::signed(ISSUER_PUBLIC).unwrap();
        let forged = tenant_token("acme", SERVER_PRIVATE);
        assert!(matches!(r.resolve(Some(&forged)), Err(DevAuthError::NotEntitled)));
        assert!(matches!(r.resolve(Some("garbage")), Err(DevAuthError::NotEntitled)));
        assert!(matches!(r.resolve(None), Err(DevAuthError::NotEntitled)));
    }
}
