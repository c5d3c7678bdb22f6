//! Request extractors for caller context: tenant scope, request id and the
//! presented device token.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use devauth_core::TenantId;

use crate::error::ApiError;
use crate::server::GatewayState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Caller-supplied request id, echoed back in error bodies.
pub struct RequestId(pub Option<String>);

impl RequestId {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Ok(RequestId(id))
    }
}

/// Tenant scope of a management call, set by the authenticating proxy in front
/// of the gateway. No header means the default scope.
pub struct TenantScope(pub TenantId);

#[async_trait]
impl FromRequestParts<GatewayState> for TenantScope {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GatewayState,
    ) -> Result<Self, Self::Rejection> {
        match parts.headers.get(&state.settings.management_header) {
            None => Ok(TenantScope(TenantId::default())),
            Some(value) => {
                let tenant = value
                    .to_str()
                    .map_err(|_| ApiError::bad_request("invalid tenant header"))?;
                Ok(TenantScope(TenantId::new(tenant.trim())))
            }
        }
    }
}

/// Token from the `Authorization` header, raw or as `Bearer <token>`.
pub struct PresentedToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for PresentedToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let missing = || ApiError::new(StatusCode::UNAUTHORIZED, "missing authorization header");
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(missing)?;
        let token = header
            .strip_prefix("Bearer ")
            .unwrap_or(header)
            .trim();
        if token.is_empty() {
            return Err(missing());
        }
        Ok(PresentedToken(token.to_string()))
    }
}
