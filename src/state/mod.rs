//! Client-side application state.
//!
//! SYSTEM CONTEXT
//! ==============
//! `session` owns the authenticated user and token for the whole process.

pub mod session;

pub use session::{AuthStatus, Session, SessionContext};
