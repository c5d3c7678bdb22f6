//! Device authentication service: the auth request processor and the
//! management operations the HTTP boundary exposes.

pub mod api;
pub mod devauth;

pub use api::DevAuthApi;
pub use devauth::{DevAuth, DevAuthOptions};
