//! CollegeHub client core: REST client, session state and form helpers for
//! the college admissions backend.

pub mod config;
pub mod net;
pub mod state;
pub mod storage;
pub mod validate;

pub use config::ClientConfig;
pub use net::{ApiClient, ApiError, AuthApi};
pub use state::{AuthStatus, SessionContext};
pub use storage::{FileStore, MemoryStore, SessionStore};
