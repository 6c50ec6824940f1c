//! Networking modules for the backend REST API.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` performs the HTTP calls, `types` defines the wire records and
//! payloads, and `error` is the single failure type every call returns.

pub mod api;
pub mod error;
pub mod types;

pub use api::{ApiClient, AuthApi};
pub use error::ApiError;
