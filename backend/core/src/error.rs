use std::fmt;

use thiserror::Error;

/// Top-level error type for the device authentication engine.
///
/// Every variant except [`DevAuthError::Internal`] is an expected outcome that
/// callers map to a specific response; only `Internal` carries an opaque cause.
#[derive(Debug, Error)]
pub enum DevAuthError {
    #[error("{0}")]
    MalformedInput(String),

    #[error("{0}")]
    Validation(String),

    #[error("missing request signature header")]
    MissingSignature,

    #[error("signature verification failed")]
    SignatureInvalid,

    /// Pending, rejected and unknown devices all collapse into this outcome.
    #[error("unauthorized")]
    NotEntitled,

    #[error("device not found")]
    DeviceNotFound,

    #[error("token not found")]
    TokenNotFound,

    #[error("token expired")]
    TokenExpired,

    #[error("token invalid")]
    TokenInvalid,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Coarse classification of a [`DevAuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedInput,
    ValidationFailed,
    SignatureInvalid,
    NotEntitled,
    NotFound,
    TokenExpired,
    TokenInvalid,
    Internal,
}

impl DevAuthError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedInput(_) | Self::MissingSignature => ErrorKind::MalformedInput,
            Self::Validation(_) => ErrorKind::ValidationFailed,
            Self::SignatureInvalid => ErrorKind::SignatureInvalid,
            Self::NotEntitled => ErrorKind::NotEntitled,
            Self::DeviceNotFound | Self::TokenNotFound => ErrorKind::NotFound,
            Self::TokenExpired => ErrorKind::TokenExpired,
            Self::TokenInvalid => ErrorKind::TokenInvalid,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::MalformedInput => "malformed-input",
            ErrorKind::ValidationFailed => "validation-failed",
            ErrorKind::SignatureInvalid => "signature-invalid",
            ErrorKind::NotEntitled => "not-entitled",
            ErrorKind::NotFound => "not-found",
            ErrorKind::TokenExpired => "token-expired",
            ErrorKind::TokenInvalid => "token-invalid",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

pub type Result<T, E = DevAuthError> = std::result::Result<T, E>;
