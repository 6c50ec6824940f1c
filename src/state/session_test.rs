use super::*;
use crate::storage::MemoryStore;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// TEST DOUBLES
// =============================================================================

fn ada() -> User {
    User {
        id: Some("u1".into()),
        name: "Ada".into(),
        email: "ada@example.com".into(),
        ..User::default()
    }
}

fn rejected(status: u16, message: &str) -> ApiError {
    ApiError::Rejected { status, message: message.to_owned() }
}

struct MockAuth {
    profile: Mutex<Result<User, ApiError>>,
    profile_calls: AtomicUsize,
    bearer: Mutex<Option<String>>,
}

impl MockAuth {
    fn new() -> Self {
        Self::with_profile(Ok(ada()))
    }

    fn with_profile(profile: Result<User, ApiError>) -> Self {
        Self { profile: Mutex::new(profile), profile_calls: AtomicUsize::new(0), bearer: Mutex::new(None) }
    }

    /// Token the next authenticated request would carry.
    fn bearer(&self) -> Option<String> {
        self.bearer.lock().expect("mock mutex should lock").clone()
    }
}

#[async_trait::async_trait]
impl AuthApi for MockAuth {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        if request.email == "taken@example.com" {
            return Err(rejected(400, "User already exists"));
        }
        let user = User {
            id: Some("u2".into()),
            name: request.name.clone(),
            email: request.email.clone(),
            ..User::default()
        };
        Ok(AuthResponse { message: "registered".into(), user, token: "tok-new".into() })
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        if request.password == "password" {
            Ok(AuthResponse { message: "ok".into(), user: ada(), token: "tok-1".into() })
        } else if request.password == "offline" {
            Err(ApiError::Transport)
        } else {
            Err(rejected(401, "Invalid credentials"))
        }
    }

    async fn social_login(&self, request: &SocialLoginRequest) -> Result<AuthResponse, ApiError> {
        if request.auth_provider != "github" {
            return Err(rejected(400, "Unsupported provider"));
        }
        let user = User {
            id: Some("u3".into()),
            name: request.name.clone().unwrap_or_default(),
            email: request.email.clone(),
            ..User::default()
        };
        Ok(AuthResponse { message: String::new(), user, token: "tok-social".into() })
    }

    async fn get_profile(&self) -> Result<User, ApiError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.profile.lock().expect("mock mutex should lock").clone()
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        if update.new_password.is_some() && update.current_password.is_none() {
            return Err(rejected(400, "Current password is required"));
        }
        let mut user = ada();
        if let Some(name) = &update.name {
            user.name.clone_from(name);
        }
        user.phone.clone_from(&update.phone);
        Ok(user)
    }

    fn adopt_token(&self, token: Option<&str>) {
        *self.bearer.lock().expect("mock mutex should lock") = token.map(str::to_owned);
    }
}

/// Counts durable writes so tests can assert that none happened.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
    read_only: bool,
}

impl RecordingStore {
    fn seeded(token: &str, user: &User) -> Self {
        Self { inner: MemoryStore::seeded(token, user).unwrap(), ..Self::default() }
    }

    /// Every set fails, like a session file on a read-only disk.
    fn read_only() -> Self {
        Self { read_only: true, ..Self::default() }
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.read_only {
            return Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into());
        }
        Ok(())
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl SessionStore for RecordingStore {
    fn token(&self) -> Result<Option<String>, StorageError> {
        self.inner.token()
    }

    fn user(&self) -> Result<Option<User>, StorageError> {
        self.inner.user()
    }

    fn set_token(&self, token: &str) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        self.inner.set_token(token)
    }

    fn set_user(&self, user: &User) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        self.inner.set_user(user)
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.clear()
    }
}

fn context(api: MockAuth, store: &Arc<RecordingStore>) -> SessionContext<MockAuth> {
    let store: Arc<dyn SessionStore> = store.clone();
    SessionContext::new(api, store)
}

// =============================================================================
// STARTUP
// =============================================================================

#[test]
fn new_context_starts_unknown_and_loading() {
    let store = Arc::new(RecordingStore::default());
    let ctx = context(MockAuth::new(), &store);
    assert_eq!(ctx.status(), AuthStatus::Unknown);
    assert!(ctx.is_loading());
    assert!(ctx.user().is_none());
}

#[tokio::test]
async fn initialize_with_empty_store_is_unauthenticated_without_network() {
    let store = Arc::new(RecordingStore::default());
    let mut ctx = context(MockAuth::new(), &store);

    assert_eq!(ctx.initialize().await, AuthStatus::Unauthenticated);
    assert!(!ctx.is_loading());
    assert_eq!(ctx.api().profile_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn initialize_replaces_cached_user_with_fresh_profile() {
    let stale = User { name: "Old Name".into(), ..ada() };
    let store = Arc::new(RecordingStore::seeded("tok-1", &stale));
    let fresh = User { name: "Ada Lovelace".into(), ..ada() };
    let mut ctx = context(MockAuth::with_profile(Ok(fresh.clone())), &store);

    assert_eq!(ctx.initialize().await, AuthStatus::Authenticated);
    assert!(!ctx.is_loading());
    assert_eq!(ctx.user(), Some(&fresh));
    assert_eq!(ctx.token(), Some("tok-1"));
    assert_eq!(store.user().unwrap(), Some(fresh));
    assert_eq!(store.token().unwrap().as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn initialize_with_rejected_token_clears_both_keys() {
    let store = Arc::new(RecordingStore::seeded("expired", &ada()));
    let mut ctx = context(MockAuth::with_profile(Err(rejected(401, "Token expired"))), &store);

    assert_eq!(ctx.initialize().await, AuthStatus::Unauthenticated);
    assert!(ctx.user().is_none());
    assert!(ctx.token().is_none());
    assert_eq!(store.token().unwrap(), None);
    assert_eq!(store.user().unwrap(), None);
    // Soft failure: nothing surfaced to the caller.
    assert_eq!(ctx.last_error(), None);
}

#[tokio::test]
async fn initialize_with_partial_store_clears_leftovers() {
    let store = Arc::new(RecordingStore::default());
    store.inner.set_token("orphan").unwrap();
    let mut ctx = context(MockAuth::new(), &store);

    assert_eq!(ctx.initialize().await, AuthStatus::Unauthenticated);
    assert_eq!(store.token().unwrap(), None);
    assert_eq!(ctx.api().profile_calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// LOGIN / SIGNUP
// =============================================================================

#[tokio::test]
async fn successful_login_authenticates_and_persists() {
    let store = Arc::new(RecordingStore::default());
    let mut ctx = context(MockAuth::new(), &store);
    ctx.initialize().await;

    assert!(ctx.login("ada@example.com", "password").await);
    assert_eq!(ctx.status(), AuthStatus::Authenticated);
    assert!(ctx.is_authenticated());
    assert_eq!(ctx.user(), Some(&ada()));
    assert_eq!(store.token().unwrap().as_deref(), Some("tok-1"));
    assert_eq!(store.user().unwrap(), Some(ada()));
}

#[tokio::test]
async fn failed_login_keeps_state_and_skips_storage() {
    let store = Arc::new(RecordingStore::default());
    let mut ctx = context(MockAuth::new(), &store);
    ctx.initialize().await;

    assert!(!ctx.login("ada@example.com", "wrong").await);
    assert_eq!(ctx.status(), AuthStatus::Unauthenticated);
    assert!(ctx.user().is_none());
    assert_eq!(store.writes(), 0);
    assert_eq!(ctx.last_error(), Some("Invalid credentials"));
}

#[tokio::test]
async fn login_transport_failure_reports_generic_message() {
    let store = Arc::new(RecordingStore::default());
    let mut ctx = context(MockAuth::new(), &store);
    ctx.initialize().await;

    assert!(!ctx.login("ada@example.com", "offline").await);
    assert_eq!(ctx.last_error(), Some(crate::net::error::NETWORK_ERROR_MESSAGE));
}

#[tokio::test]
async fn successful_login_clears_previous_error() {
    let store = Arc::new(RecordingStore::default());
    let mut ctx = context(MockAuth::new(), &store);
    ctx.initialize().await;

    assert!(!ctx.login("ada@example.com", "wrong").await);
    assert!(ctx.login("ada@example.com", "password").await);
    assert_eq!(ctx.last_error(), None);
}

#[tokio::test]
async fn signup_authenticates_new_account() {
    let store = Arc::new(RecordingStore::default());
    let mut ctx = context(MockAuth::new(), &store);
    ctx.initialize().await;

    assert!(ctx.signup("Grace", "grace@example.com", "secret1").await);
    assert_eq!(ctx.user().map(|u| u.name.as_str()), Some("Grace"));
    assert_eq!(store.token().unwrap().as_deref(), Some("tok-new"));
}

#[tokio::test]
async fn rejected_signup_returns_false_with_reason() {
    let store = Arc::new(RecordingStore::default());
    let mut ctx = context(MockAuth::new(), &store);
    ctx.initialize().await;

    assert!(!ctx.signup("Dup", "taken@example.com", "secret1").await);
    assert_eq!(ctx.status(), AuthStatus::Unauthenticated);
    assert_eq!(ctx.last_error(), Some("User already exists"));
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn social_login_goes_through_the_session() {
    let store = Arc::new(RecordingStore::default());
    let mut ctx = context(MockAuth::new(), &store);
    ctx.initialize().await;

    assert!(ctx.social_login("octo@example.com", Some("Octo"), "github").await);
    assert!(ctx.is_authenticated());
    assert_eq!(ctx.user().map(|u| u.name.as_str()), Some("Octo"));
    assert_eq!(store.token().unwrap().as_deref(), Some("tok-social"));
    assert_eq!(store.user().unwrap().and_then(|u| u.id), Some("u3".into()));
    assert_eq!(ctx.api().bearer().as_deref(), Some("tok-social"));
}

#[tokio::test]
async fn rejected_social_login_returns_false_with_reason() {
    let store = Arc::new(RecordingStore::default());
    let mut ctx = context(MockAuth::new(), &store);
    ctx.initialize().await;

    assert!(!ctx.social_login("octo@example.com", None, "myspace").await);
    assert_eq!(ctx.status(), AuthStatus::Unauthenticated);
    assert_eq!(ctx.last_error(), Some("Unsupported provider"));
    assert_eq!(store.writes(), 0);
}

// =============================================================================
// TOKEN HANDOFF
// =============================================================================

#[tokio::test]
async fn login_hands_in_memory_token_to_api_when_store_is_read_only() {
    let store = Arc::new(RecordingStore::read_only());
    let mut ctx = context(MockAuth::new(), &store);
    ctx.initialize().await;

    assert!(ctx.login("ada@example.com", "password").await);
    assert!(ctx.is_authenticated());
    assert_eq!(store.token().unwrap(), None);
    assert_eq!(ctx.api().bearer().as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn verification_uses_stored_token_and_logout_withdraws_it() {
    let store = Arc::new(RecordingStore::seeded("tok-1", &ada()));
    let mut ctx = context(MockAuth::new(), &store);

    ctx.initialize().await;
    assert_eq!(ctx.api().bearer().as_deref(), Some("tok-1"));

    ctx.logout();
    assert_eq!(ctx.api().bearer(), None);
}

#[tokio::test]
async fn rejected_verification_withdraws_token() {
    let store = Arc::new(RecordingStore::seeded("expired", &ada()));
    let mut ctx = context(MockAuth::with_profile(Err(rejected(401, "Token expired"))), &store);

    ctx.initialize().await;
    assert_eq!(ctx.api().bearer(), None);
}

// =============================================================================
// LOGOUT / USER UPDATES
// =============================================================================

#[tokio::test]
async fn logout_clears_memory_and_storage_idempotently() {
    let store = Arc::new(RecordingStore::default());
    let mut ctx = context(MockAuth::new(), &store);
    ctx.initialize().await;
    assert!(ctx.login("ada@example.com", "password").await);

    ctx.logout();
    let after_first = ctx.session().clone();
    assert_eq!(ctx.status(), AuthStatus::Unauthenticated);
    assert_eq!(after_first, Session::default());
    assert_eq!(store.token().unwrap(), None);
    assert_eq!(store.user().unwrap(), None);

    ctx.logout();
    assert_eq!(ctx.session(), &after_first);
    assert_eq!(ctx.status(), AuthStatus::Unauthenticated);
    assert_eq!(store.token().unwrap(), None);
}

#[test]
fn logout_from_fresh_context_is_unauthenticated() {
    let store = Arc::new(RecordingStore::seeded("tok-1", &ada()));
    let mut ctx = context(MockAuth::new(), &store);
    ctx.logout();
    assert_eq!(ctx.status(), AuthStatus::Unauthenticated);
    assert_eq!(store.token().unwrap(), None);
}

#[tokio::test]
async fn update_user_never_touches_token() {
    let store = Arc::new(RecordingStore::default());
    let mut ctx = context(MockAuth::new(), &store);
    ctx.initialize().await;
    assert!(ctx.login("ada@example.com", "password").await);

    let renamed = User { name: "Countess".into(), ..ada() };
    ctx.update_user(renamed.clone());

    assert_eq!(ctx.user(), Some(&renamed));
    assert_eq!(ctx.token(), Some("tok-1"));
    assert_eq!(store.user().unwrap(), Some(renamed));
    assert_eq!(store.token().unwrap().as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn update_profile_adopts_returned_user() {
    let store = Arc::new(RecordingStore::default());
    let mut ctx = context(MockAuth::new(), &store);
    ctx.initialize().await;
    assert!(ctx.login("ada@example.com", "password").await);

    let update = ProfileUpdate { phone: Some("555-0100".into()), ..ProfileUpdate::default() };
    let user = ctx.update_profile(&update).await.unwrap();
    assert_eq!(user.phone.as_deref(), Some("555-0100"));
    assert_eq!(ctx.user().and_then(|u| u.phone.as_deref()), Some("555-0100"));
    assert_eq!(store.token().unwrap().as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn failed_profile_update_leaves_user_alone() {
    let store = Arc::new(RecordingStore::default());
    let mut ctx = context(MockAuth::new(), &store);
    ctx.initialize().await;
    assert!(ctx.login("ada@example.com", "password").await);

    let update = ProfileUpdate { new_password: Some("n3wpass".into()), ..ProfileUpdate::default() };
    let err = ctx.update_profile(&update).await.unwrap_err();
    assert_eq!(err.to_string(), "Current password is required");
    assert_eq!(ctx.user(), Some(&ada()));
    assert_eq!(ctx.last_error(), Some("Current password is required"));
}
