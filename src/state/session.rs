//! Auth-session state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! One `SessionContext` exists per running client. It is the only writer of
//! the durable token/user pair; everything else reads the current user from
//! here. Every token change is also pushed into the API client, so requests
//! carry the in-memory token even when the store could not be written.
//!
//! STATE MACHINE
//! =============
//! `Unknown` -> `initialize()` -> `Verifying` (stored token + user found)
//! -> `Authenticated` | `Unauthenticated`. `login`/`signup` move to
//! `Authenticated` on success, `logout` always lands in `Unauthenticated`.
//!
//! Mutators take `&mut self`, so two of them can never interleave on the same
//! session.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;

use crate::net::ApiError;
use crate::net::api::AuthApi;
use crate::net::types::{AuthResponse, LoginRequest, ProfileUpdate, RegisterRequest, SocialLoginRequest, User};
use crate::storage::{SessionStore, StorageError};

/// The in-memory session: current user and bearer token.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub token: Option<String>,
}

/// Where the session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    /// Startup, before `initialize()` has run.
    Unknown,
    /// A stored token is being checked against the backend.
    Verifying,
    Unauthenticated,
    Authenticated,
}

/// Owner of the current session and its durable mirror.
pub struct SessionContext<A: AuthApi> {
    api: A,
    store: Arc<dyn SessionStore>,
    session: Session,
    status: AuthStatus,
    last_error: Option<String>,
}

impl<A: AuthApi> SessionContext<A> {
    pub fn new(api: A, store: Arc<dyn SessionStore>) -> Self {
        Self { api, store, session: Session::default(), status: AuthStatus::Unknown, last_error: None }
    }

    /// Restore a stored session, verifying the token with a live profile fetch.
    ///
    /// A rejected token is not an error for the caller: the stored session is
    /// dropped and the context ends up `Unauthenticated`.
    pub async fn initialize(&mut self) -> AuthStatus {
        let token = self.read_durable("token", |store| store.token());
        let cached = self.read_durable("user", |store| store.user());

        let (token, user) = match (token, cached) {
            (Some(token), Some(user)) => (token, user),
            (token, cached) => {
                if token.is_some() || cached.is_some() {
                    tracing::debug!("partial stored session; clearing it");
                    self.clear_durable();
                }
                self.api.adopt_token(None);
                self.session = Session::default();
                self.status = AuthStatus::Unauthenticated;
                return self.status;
            }
        };

        self.api.adopt_token(Some(&token));
        self.session = Session { user: Some(user), token: Some(token) };
        self.status = AuthStatus::Verifying;

        match self.api.get_profile().await {
            Ok(fresh) => {
                tracing::info!(user_id = fresh.id.as_deref().unwrap_or("-"), "restored session");
                self.write_durable("user", |store| store.set_user(&fresh));
                self.session.user = Some(fresh);
                self.status = AuthStatus::Authenticated;
            }
            Err(e) => {
                tracing::info!(error = %e, "stored session rejected; signing out");
                self.clear_durable();
                self.api.adopt_token(None);
                self.session = Session::default();
                self.status = AuthStatus::Unauthenticated;
            }
        }
        self.status
    }

    /// Log in with email and password. Returns `false` on any failure and
    /// leaves the session untouched; the reason is kept in [`Self::last_error`].
    pub async fn login(&mut self, email: &str, password: &str) -> bool {
        let request = LoginRequest { email: email.to_owned(), password: password.to_owned() };
        match self.api.login(&request).await {
            Ok(auth) => {
                self.establish(auth);
                true
            }
            Err(e) => {
                self.record_failure("login", &e);
                false
            }
        }
    }

    /// Register a new account and log in as it. Same contract as [`Self::login`].
    pub async fn signup(&mut self, name: &str, email: &str, password: &str) -> bool {
        let request = RegisterRequest {
            name: name.to_owned(),
            email: email.to_owned(),
            password: password.to_owned(),
            ..RegisterRequest::default()
        };
        match self.api.register(&request).await {
            Ok(auth) => {
                self.establish(auth);
                true
            }
            Err(e) => {
                self.record_failure("signup", &e);
                false
            }
        }
    }

    /// Sign in with an identity an external provider (`google`, `github`)
    /// has already verified. Same contract as [`Self::login`].
    pub async fn social_login(&mut self, email: &str, name: Option<&str>, provider: &str) -> bool {
        let request = SocialLoginRequest {
            email: email.to_owned(),
            name: name.map(str::to_owned),
            auth_provider: provider.to_owned(),
        };
        match self.api.social_login(&request).await {
            Ok(auth) => {
                self.establish(auth);
                true
            }
            Err(e) => {
                self.record_failure("social login", &e);
                false
            }
        }
    }

    /// Drop the session from memory and durable storage. Never calls the network.
    pub fn logout(&mut self) {
        self.api.adopt_token(None);
        self.session = Session::default();
        self.status = AuthStatus::Unauthenticated;
        self.last_error = None;
        self.clear_durable();
        tracing::info!("logged out");
    }

    /// Replace the current user after a profile change succeeded elsewhere.
    /// The token is left as is.
    pub fn update_user(&mut self, user: User) {
        self.write_durable("user", |store| store.set_user(&user));
        self.session.user = Some(user);
    }

    /// Push a profile update to the backend and adopt the returned user.
    ///
    /// # Errors
    ///
    /// Returns the request-layer error unchanged; the session is untouched.
    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<User, ApiError> {
        match self.api.update_profile(update).await {
            Ok(user) => {
                self.last_error = None;
                self.update_user(user.clone());
                Ok(user)
            }
            Err(e) => {
                self.record_failure("profile update", &e);
                Err(e)
            }
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.session.user.as_ref()
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.session.token.as_deref()
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.status
    }

    /// True until startup verification has finished.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self.status, AuthStatus::Unknown | AuthStatus::Verifying)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }

    /// Message of the most recent failed sign-in, signup or profile update.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn api(&self) -> &A {
        &self.api
    }

    fn establish(&mut self, auth: AuthResponse) {
        let AuthResponse { user, token, .. } = auth;
        self.api.adopt_token(Some(&token));
        self.write_durable("token", |store| store.set_token(&token));
        self.write_durable("user", |store| store.set_user(&user));
        tracing::info!(user_id = user.id.as_deref().unwrap_or("-"), "session established");
        self.session = Session { user: Some(user), token: Some(token) };
        self.status = AuthStatus::Authenticated;
        self.last_error = None;
    }

    fn record_failure(&mut self, action: &'static str, error: &ApiError) {
        tracing::info!(%action, error = %error, "auth request failed");
        self.last_error = Some(error.message());
    }

    fn read_durable<T>(
        &self,
        key: &'static str,
        read: impl FnOnce(&dyn SessionStore) -> Result<Option<T>, StorageError>,
    ) -> Option<T> {
        match read(self.store.as_ref()) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(%key, error = %e, "session storage read failed");
                None
            }
        }
    }

    fn write_durable(
        &self,
        key: &'static str,
        write: impl FnOnce(&dyn SessionStore) -> Result<(), StorageError>,
    ) {
        if let Err(e) = write(self.store.as_ref()) {
            tracing::warn!(%key, error = %e, "session storage write failed; keeping in-memory session");
        }
    }

    fn clear_durable(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "session storage clear failed");
        }
    }
}
