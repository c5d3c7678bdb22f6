//! Route handlers.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use devauth_core::{DevAuthError, Device, DeviceStatus, Page, PageRequest};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{PresentedToken, RequestId, TenantScope};
use crate::error::ApiError;
use crate::server::GatewayState;

/// Header carrying the base64 signature of an auth request body.
pub const SIGNATURE_HEADER: &str = "x-devauth-signature";

pub const JWT_CONTENT_TYPE: &str = "application/jwt";

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    page: Option<String>,
    per_page: Option<String>,
}

fn fail(request_id: &RequestId) -> impl Fn(DevAuthError) -> ApiError + '_ {
    move |e| ApiError::from(e).with_request_id(request_id.as_deref())
}

/// Health check endpoint.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "devauth",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/devices/v1/authentication/auth_requests`
pub async fn submit_auth_request(
    State(state): State<GatewayState>,
    request_id: RequestId,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let token = state
        .api
        .submit_auth_request(&body, signature)
        .await
        .map_err(fail(&request_id))?;
    Ok(([(header::CONTENT_TYPE, JWT_CONTENT_TYPE)], token).into_response())
}

/// `PUT /api/management/v1/devauth/devices/:id/status`
pub async fn set_device_status(
    State(state): State<GatewayState>,
    TenantScope(tenant): TenantScope,
    request_id: RequestId,
    Path(device_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let update: StatusUpdate = serde_json::from_slice(&body).map_err(|e| {
        ApiError::bad_request(format!("failed to decode status data: {e}"))
            .with_request_id(request_id.as_deref())
    })?;
    let status: DeviceStatus = update.status.parse().map_err(fail(&request_id))?;
    state
        .api
        .set_device_status(&tenant, &device_id, status)
        .await
        .map_err(fail(&request_id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/management/v1/devauth/devices/:id`
pub async fn get_device(
    State(state): State<GatewayState>,
    TenantScope(tenant): TenantScope,
    request_id: RequestId,
    Path(device_id): Path<String>,
) -> Result<Json<Device>, ApiError> {
    let device = state
        .api
        .get_device(&tenant, &device_id)
        .await
        .map_err(fail(&request_id))?;
    Ok(Json(device))
}

/// `GET /api/management/v1/devauth/devices?page=&per_page=`
pub async fn list_devices(
    State(state): State<GatewayState>,
    TenantScope(tenant): TenantScope,
    request_id: RequestId,
    uri: Uri,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let request = PageRequest::from_query(
        params.page.as_deref(),
        params.per_page.as_deref(),
        state.settings.default_per_page,
        state.settings.max_per_page,
    )
    .map_err(fail(&request_id))?;
    let page = state
        .api
        .list_devices(&tenant, request)
        .await
        .map_err(fail(&request_id))?;

    let link = link_header(uri.path(), &page);
    let mut response = Json(page.items).into_response();
    if let Ok(value) = HeaderValue::from_str(&link) {
        response.headers_mut().insert(header::LINK, value);
    }
    Ok(response)
}

/// `POST /api/internal/v1/devauth/tokens/verify`
pub async fn verify_token(
    State(state): State<GatewayState>,
    request_id: RequestId,
    PresentedToken(token): PresentedToken,
) -> Result<StatusCode, ApiError> {
    state.api.verify_token(&token).await.map_err(fail(&request_id))?;
    Ok(StatusCode::OK)
}

/// `DELETE /api/management/v1/devauth/tokens/:id`
pub async fn revoke_token(
    State(state): State<GatewayState>,
    TenantScope(tenant): TenantScope,
    request_id: RequestId,
    Path(token_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .api
        .revoke_token(&tenant, &token_id)
        .await
        .map_err(fail(&request_id))?;
    Ok(StatusCode::NO_CONTENT)
}

fn link_header<T>(path: &str, page: &Page<T>) -> String {
    let link = |n: usize, rel: &str| {
        format!("<{path}?page={n}&per_page={}>; rel=\"{rel}\"", page.per_page)
    };
    let mut links = vec![link(1, "first")];
    if page.has_prev() {
        links.push(link(page.page - 1, "prev"));
    }
    if let Some(next) = page.page.checked_add(1).filter(|_| page.has_more) {
        links.push(link(next, "next"));
    }
    links.join(", ")
}
