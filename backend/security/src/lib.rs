//! Cryptographic building blocks of the device authentication engine.

pub mod signature;
pub mod tenant;
pub mod token;

pub use signature::{public_key_is_valid, sign_request, verify_signature};
pub use tenant::{TenantClaims, TenantMode, TenantResolver};
pub use token::{Claims, TokenAuthority, TokenKeys, TokenPolicy, VerifiedToken};
