//! Durable session storage.
//!
//! SYSTEM CONTEXT
//! ==============
//! Plays the role browser `localStorage` plays for a web client: the bearer
//! token and the last known user survive process restarts. The session
//! context is the only writer; the API client only reads the token.
//!
//! DESIGN
//! ======
//! Both keys live in one small JSON document so a single read sees a
//! consistent pair. A corrupt document reads as empty instead of failing,
//! which drops the user back to a logged-out state.
//!
//! The document holds a bearer token, so it is written owner-only (0600 on
//! Unix) through a temp file in the same directory that is then renamed over
//! the old one. A crash mid-write leaves the previous document intact.

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::net::types::{User, normalize_ids};

/// Document key holding the bearer token.
pub const TOKEN_KEY: &str = "authToken";

/// Document key holding the serialized current user.
pub const USER_KEY: &str = "currentUser";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session storage encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key/value persistence for the session token and cached user.
pub trait SessionStore: Send + Sync {
    fn token(&self) -> Result<Option<String>, StorageError>;
    fn user(&self) -> Result<Option<User>, StorageError>;
    fn set_token(&self, token: &str) -> Result<(), StorageError>;
    fn set_user(&self, user: &User) -> Result<(), StorageError>;
    /// Remove both keys.
    fn clear(&self) -> Result<(), StorageError>;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(rename = "authToken", default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(rename = "currentUser", default, skip_serializing_if = "Option::is_none")]
    user: Option<Value>,
}

impl Document {
    fn is_empty(&self) -> bool {
        self.token.is_none() && self.user.is_none()
    }

    fn decoded_user(&self) -> Option<User> {
        let mut raw = self.user.clone()?;
        normalize_ids(&mut raw);
        match serde_json::from_value(raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring undecodable cached user");
                None
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// FILE STORE
// =============================================================================

/// Session document persisted as a JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), guard: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Document, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Document::default()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "session file is corrupt; treating as empty");
                Ok(Document::default())
            }
        }
    }

    fn write_document(&self, doc: &Document) -> Result<(), StorageError> {
        if doc.is_empty() {
            return self.remove_file();
        }
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let rendered = serde_json::to_string_pretty(doc)?;
        // NamedTempFile is created 0600 on Unix; the rename keeps that mode.
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        staged.write_all(rendered.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove_file(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut Document)) -> Result<(), StorageError> {
        let _guard = lock(&self.guard);
        let mut doc = self.read_document()?;
        apply(&mut doc);
        self.write_document(&doc)
    }
}

impl SessionStore for FileStore {
    fn token(&self) -> Result<Option<String>, StorageError> {
        let _guard = lock(&self.guard);
        Ok(self.read_document()?.token)
    }

    fn user(&self) -> Result<Option<User>, StorageError> {
        let _guard = lock(&self.guard);
        Ok(self.read_document()?.decoded_user())
    }

    fn set_token(&self, token: &str) -> Result<(), StorageError> {
        self.update(|doc| doc.token = Some(token.to_owned()))
    }

    fn set_user(&self, user: &User) -> Result<(), StorageError> {
        let value = serde_json::to_value(user)?;
        self.update(|doc| doc.user = Some(value))
    }

    fn clear(&self) -> Result<(), StorageError> {
        let _guard = lock(&self.guard);
        self.remove_file()
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Process-local store for tests and embedders that manage persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: Mutex<Document>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a token and user, as if left by an earlier run.
    pub fn seeded(token: &str, user: &User) -> Result<Self, StorageError> {
        let doc = Document { token: Some(token.to_owned()), user: Some(serde_json::to_value(user)?) };
        Ok(Self { doc: Mutex::new(doc) })
    }
}

impl SessionStore for MemoryStore {
    fn token(&self) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.doc).token.clone())
    }

    fn user(&self) -> Result<Option<User>, StorageError> {
        Ok(lock(&self.doc).decoded_user())
    }

    fn set_token(&self, token: &str) -> Result<(), StorageError> {
        lock(&self.doc).token = Some(token.to_owned());
        Ok(())
    }

    fn set_user(&self, user: &User) -> Result<(), StorageError> {
        let value = serde_json::to_value(user)?;
        lock(&self.doc).user = Some(value);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *lock(&self.doc) = Document::default();
        Ok(())
    }
}
