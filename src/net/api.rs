//! REST client for the CollegeHub backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every backend call in the application goes through [`ApiClient`]. The
//! session context drives the auth calls through the [`AuthApi`] seam; the
//! CLI calls the resource methods directly.
//!
//! TOKEN SOURCE
//! ============
//! A bare client reads the bearer token from the durable store on every
//! call. Once a session context adopts the client it hands over its
//! in-memory token, and the store is no longer consulted; a failed store
//! write can then never strand an authenticated session without a header.
//!
//! ERROR HANDLING
//! ==============
//! Calls return `Result<_, ApiError>`. Non-success statuses are reduced to the
//! backend's `error` message, transport failures to a generic message. There
//! is no retry, timeout or cancellation: a hung request hangs its caller.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{ApiError, rejection_message};
use super::types::{
    AuthResponse, Booking, College, CollegeFilter, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest,
    NewBooking, NewReview, ProfileEnvelope, ProfileUpdate, RegisterRequest, ResetPasswordRequest, Review,
    ReviewUpdate, SocialLoginRequest, User, normalize_ids,
};
use crate::storage::SessionStore;

/// Whether a call carries the stored bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Public,
    Bearer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum TokenSource {
    #[default]
    Store,
    /// Held by a session context; `None` means signed out.
    Session(Option<String>),
}

fn college_endpoint(id: &str) -> String {
    format!("/api/colleges/{id}")
}

fn booking_endpoint(id: &str) -> String {
    format!("/api/bookings/{id}")
}

fn review_endpoint(id: &str) -> String {
    format!("/api/reviews/{id}")
}

fn college_reviews_endpoint(college_id: &str) -> String {
    format!("/api/reviews/college/{college_id}")
}

/// Build the college listing URL, appending only the filters that are set.
///
/// # Errors
///
/// Returns [`ApiError::Client`] if `base_url` is not a valid URL.
pub fn college_list_url(base_url: &str, filter: &CollegeFilter) -> Result<Url, ApiError> {
    let mut url = Url::parse(&format!("{base_url}/api/colleges")).map_err(|e| ApiError::Client(e.to_string()))?;
    let pairs = filter.query_pairs();
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(url)
}

/// Decode a success body into `T`, normalizing ids first.
///
/// An empty body decodes as JSON `null`.
pub(crate) fn decode_body<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    let mut value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str::<Value>(text).map_err(|e| ApiError::Decode(e.to_string()))?
    };
    normalize_ids(&mut value);
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Auth operations the session context depends on.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /api/auth/register`.
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError>;

    /// `POST /api/auth/login`.
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError>;

    /// `POST /api/auth/google-login`, for identities verified by an external
    /// provider.
    async fn social_login(&self, request: &SocialLoginRequest) -> Result<AuthResponse, ApiError>;

    /// `GET /api/auth/me` with the stored token.
    async fn get_profile(&self) -> Result<User, ApiError>;

    /// `PUT /api/auth/profile` with the stored token.
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError>;

    /// Take `token` as the bearer for later calls, in place of whatever the
    /// durable store holds.
    fn adopt_token(&self, token: Option<&str>);
}

/// HTTP client bound to one backend origin.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn SessionStore>,
    token: Arc<RwLock<TokenSource>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for `base_url`, reading bearer tokens from `store` until
    /// a session adopts it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] if the base URL does not parse or the HTTP
    /// client cannot be constructed.
    pub fn new(base_url: &str, store: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        Url::parse(&base_url).map_err(|e| ApiError::Client(format!("invalid base URL {base_url}: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self { http, base_url, store, token: Arc::default() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn current_token(&self) -> Option<String> {
        let source = self.token.read().unwrap_or_else(PoisonError::into_inner).clone();
        match source {
            TokenSource::Session(token) => token,
            TokenSource::Store => self.stored_token(),
        }
    }

    fn stored_token(&self) -> Option<String> {
        match self.store.token() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "could not read stored token; sending request without it");
                None
            }
        }
    }

    fn request(&self, method: Method, url: impl reqwest::IntoUrl, auth: Auth) -> RequestBuilder {
        let builder = self.http.request(method, url);
        if auth == Auth::Bearer {
            if let Some(token) = self.current_token() {
                return builder.bearer_auth(token);
            }
        }
        builder
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().await.map_err(|e| {
            tracing::debug!(error = %e, "request failed before a response arrived");
            ApiError::Transport
        })?;

        let status = response.status();
        let url = response.url().path().to_owned();
        let text = response.text().await.map_err(|e| {
            tracing::debug!(error = %e, %url, "response body could not be read");
            ApiError::Transport
        })?;

        if !status.is_success() {
            let message = rejection_message(&text);
            tracing::debug!(status = status.as_u16(), %url, %message, "request rejected");
            return Err(ApiError::Rejected { status: status.as_u16(), message });
        }

        tracing::debug!(status = status.as_u16(), %url, "request succeeded");
        decode_body(&text)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, auth: Auth) -> Result<T, ApiError> {
        self.execute(self.request(Method::GET, self.endpoint(path), auth)).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &(impl Serialize + Sync),
        auth: Auth,
    ) -> Result<T, ApiError> {
        self.execute(self.request(method, self.endpoint(path), auth).json(body)).await
    }

    async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.execute(self.request(Method::DELETE, self.endpoint(path), Auth::Bearer)).await
    }

    // =========================================================================
    // PASSWORD RECOVERY
    // =========================================================================

    /// `POST /api/auth/forgot-password`. The reply says nothing about whether
    /// the address is registered.
    pub async fn forgot_password(&self, email: &str) -> Result<ForgotPasswordResponse, ApiError> {
        let request = ForgotPasswordRequest { email: email.to_owned() };
        self.send_json(Method::POST, "/api/auth/forgot-password", &request, Auth::Public).await
    }

    /// `POST /api/auth/reset-password` with the token from a reset request.
    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<Value, ApiError> {
        self.send_json(Method::POST, "/api/auth/reset-password", request, Auth::Public).await
    }

    // =========================================================================
    // COLLEGES
    // =========================================================================

    /// `GET /api/colleges` with the filters that are set.
    pub async fn list_colleges(&self, filter: &CollegeFilter) -> Result<Vec<College>, ApiError> {
        let url = college_list_url(&self.base_url, filter)?;
        self.execute(self.request(Method::GET, url, Auth::Public)).await
    }

    pub async fn get_college(&self, id: &str) -> Result<College, ApiError> {
        self.get(&college_endpoint(id), Auth::Public).await
    }

    /// Create a college from a free-form record.
    pub async fn create_college(&self, data: &Value) -> Result<College, ApiError> {
        self.send_json(Method::POST, "/api/colleges", data, Auth::Bearer).await
    }

    pub async fn update_college(&self, id: &str, data: &Value) -> Result<College, ApiError> {
        self.send_json(Method::PUT, &college_endpoint(id), data, Auth::Bearer).await
    }

    pub async fn delete_college(&self, id: &str) -> Result<Value, ApiError> {
        self.delete(&college_endpoint(id)).await
    }

    // =========================================================================
    // BOOKINGS
    // =========================================================================

    /// Bookings owned by the current user.
    pub async fn list_bookings(&self) -> Result<Vec<Booking>, ApiError> {
        self.get("/api/bookings", Auth::Bearer).await
    }

    pub async fn get_booking(&self, id: &str) -> Result<Booking, ApiError> {
        self.get(&booking_endpoint(id), Auth::Bearer).await
    }

    pub async fn create_booking(&self, booking: &NewBooking) -> Result<Booking, ApiError> {
        self.send_json(Method::POST, "/api/bookings", booking, Auth::Bearer).await
    }

    pub async fn update_booking(&self, id: &str, data: &Value) -> Result<Booking, ApiError> {
        self.send_json(Method::PUT, &booking_endpoint(id), data, Auth::Bearer).await
    }

    pub async fn delete_booking(&self, id: &str) -> Result<Value, ApiError> {
        self.delete(&booking_endpoint(id)).await
    }

    // =========================================================================
    // REVIEWS
    // =========================================================================

    pub async fn college_reviews(&self, college_id: &str) -> Result<Vec<Review>, ApiError> {
        self.get(&college_reviews_endpoint(college_id), Auth::Public).await
    }

    /// Reviews written by the current user.
    pub async fn my_reviews(&self) -> Result<Vec<Review>, ApiError> {
        self.get("/api/reviews/user", Auth::Bearer).await
    }

    pub async fn create_review(&self, review: &NewReview) -> Result<Review, ApiError> {
        self.send_json(Method::POST, "/api/reviews", review, Auth::Bearer).await
    }

    pub async fn update_review(&self, id: &str, update: &ReviewUpdate) -> Result<Review, ApiError> {
        self.send_json(Method::PUT, &review_endpoint(id), update, Auth::Bearer).await
    }

    pub async fn delete_review(&self, id: &str) -> Result<Value, ApiError> {
        self.delete(&review_endpoint(id)).await
    }
}

#[async_trait::async_trait]
impl AuthApi for ApiClient {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.send_json(Method::POST, "/api/auth/register", request, Auth::Public).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.send_json(Method::POST, "/api/auth/login", request, Auth::Public).await
    }

    async fn social_login(&self, request: &SocialLoginRequest) -> Result<AuthResponse, ApiError> {
        self.send_json(Method::POST, "/api/auth/google-login", request, Auth::Public).await
    }

    async fn get_profile(&self) -> Result<User, ApiError> {
        let envelope: ProfileEnvelope = self.get("/api/auth/me", Auth::Bearer).await?;
        Ok(envelope.into_user())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let envelope: ProfileEnvelope = self
            .send_json(Method::PUT, "/api/auth/profile", update, Auth::Bearer).await?;
        Ok(envelope.into_user())
    }

    fn adopt_token(&self, token: Option<&str>) {
        let mut source = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *source = TokenSource::Session(token.map(str::to_owned));
    }
}
