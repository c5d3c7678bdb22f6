pub mod clock;
pub mod error;
pub mod pagination;
pub mod storage;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DevAuthError, ErrorKind, Result};
pub use pagination::{Page, PageRequest, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use storage::{bounded, DEFAULT_STORAGE_TIMEOUT};
pub use traits::{DeviceRegistry, TokenStore};
pub use types::{AuthRequest, Device, DeviceStatus, TenantId, Token};
