//! devauth HTTP gateway
//!
//! Maps the device, management and internal endpoints onto [`DevAuthApi`].
//!
//! [`DevAuthApi`]: devauth_service::DevAuthApi

pub mod api;
pub mod auth;
pub mod error;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, start_server, GatewaySettings, GatewayState};
