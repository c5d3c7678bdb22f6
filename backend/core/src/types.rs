use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DevAuthError;

/// Isolation scope for devices and tokens. The empty id is the default scope
/// used by single-tenant deployments.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<default>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Approval state of a device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Pending => "pending",
            DeviceStatus::Accepted => "accepted",
            DeviceStatus::Rejected => "rejected",
        }
    }

    /// Leaving `accepted` (or entering `rejected`/`pending`) must kill outstanding tokens.
    pub fn revokes_tokens(&self) -> bool {
        !matches!(self, DeviceStatus::Accepted)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = DevAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeviceStatus::Pending),
            "accepted" => Ok(DeviceStatus::Accepted),
            "rejected" => Ok(DeviceStatus::Rejected),
            _ => Err(DevAuthError::validation("incorrect device status")),
        }
    }
}

/// A claimed hardware identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    #[serde(rename = "id_data")]
    pub identity_data: String,
    #[serde(rename = "pubkey")]
    pub public_key: String,
    pub status: DeviceStatus,
    #[serde(default, skip_serializing_if = "TenantId::is_default")]
    pub tenant_id: TenantId,
    pub created_ts: DateTime<Utc>,
    pub updated_ts: DateTime<Utc>,
}

impl Device {
    /// A fresh `pending` device seen for the first time.
    pub fn new(
        tenant_id: TenantId,
        identity_data: impl Into<String>,
        public_key: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            identity_data: identity_data.into(),
            public_key: public_key.into(),
            status: DeviceStatus::Pending,
            tenant_id,
            created_ts: now,
            updated_ts: now,
        }
    }
}

/// A credential issued to an accepted device.
///
/// Only `revoked` ever changes after issuance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub id: String,
    pub device_id: String,
    pub tenant_id: TenantId,
    /// Serialized, signed form handed to the device.
    pub raw: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl Token {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }
}

/// One authentication submission as decoded from the request body.
///
/// Missing fields decode as empty strings so that validation, not the decoder,
/// reports them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthRequest {
    #[serde(rename = "id_data", default)]
    pub identity_data: String,
    #[serde(rename = "pubkey", default)]
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_token: Option<String>,
}

impl AuthRequest {
    pub fn parse(body: &[u8]) -> Result<Self, DevAuthError> {
        serde_json::from_slice(body)
            .map_err(|e| DevAuthError::malformed(format!("failed to decode auth request: {e}")))
    }

    /// Checks required fields in the fixed order id_data, then pubkey.
    pub fn validate(&self) -> Result<(), DevAuthError> {
        if self.identity_data.is_empty() {
            return Err(DevAuthError::validation(
                "invalid auth request: id_data must be provided",
            ));
        }
        if self.public_key.is_empty() {
            return Err(DevAuthError::validation(
                "invalid auth request: pubkey must be provided",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn status_parses_known_values_only() {
        assert_eq!("accepted".parse::<DeviceStatus>().unwrap(), DeviceStatus::Accepted);
        assert_eq!("pending".parse::<DeviceStatus>().unwrap(), DeviceStatus::Pending);
        let err = "foo".parse::<DeviceStatus>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(err.to_string(), "incorrect device status");
    }

    #[test]
    fn device_serializes_with_wire_names() {
        let dev = Device::new(TenantId::default(), "deadcafe", "pubkey", Utc::now());
        let json = serde_json::to_value(&dev).unwrap();
        assert_eq!(json["id_data"], "deadcafe");
        assert_eq!(json["pubkey"], "pubkey");
        assert_eq!(json["status"], "pending");
        assert!(json.get("tenant_id").is_none());
    }

    #[test]
    fn empty_body_is_malformed() {
        let err = AuthRequest::parse(b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(err.to_string().starts_with("failed to decode auth request: "));
    }

    #[test]
    fn validation_reports_id_data_first() {
        let req = AuthRequest::parse(br#"{"tenant_token":"t1"}"#).unwrap();
        assert_eq!(
            req.validate().unwrap_err().to_string(),
            "invalid auth request: id_data must be provided"
        );

        let req = AuthRequest::parse(br#"{"id_data":"id-0001"}"#).unwrap();
        assert_eq!(
            req.validate().unwrap_err().to_string(),
            "invalid auth request: pubkey must be provided"
        );
    }

    #[test]
    fn token_liveness() {
        let now = Utc::now();
        let mut token = Token {
            id: "t".into(),
            device_id: "d".into(),
            tenant_id: TenantId::default(),
            raw: "raw".into(),
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(10),
            revoked: false,
        };
        assert!(token.is_live_at(now));
        assert!(!token.is_live_at(now + chrono::Duration::seconds(10)));
        token.revoked = true;
        assert!(!token.is_live_at(now));
    }

    #[test]
    fn default_tenant_display() {
        assert_eq!(TenantId::default().to_string(), "<default>");
        assert_eq!(TenantId::new("t1").to_string(), "t1");
    }
}
