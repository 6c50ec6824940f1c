//! Backend record types and request payloads.
//!
//! DESIGN
//! ======
//! Records are exchanged verbatim with the backend: known fields are typed,
//! everything else lands in `extra` so a record survives a save/load cycle
//! untouched. The backend has two id spellings (`_id` and `id`);
//! [`normalize_ids`] folds them into `id` before any record is decoded.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fold every `_id` key into a canonical `id`, recursively.
///
/// When an object carries both keys, `id` wins and `_id` is dropped.
pub fn normalize_ids(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(raw) = map.remove("_id") {
                if !map.contains_key("id") {
                    map.insert("id".to_owned(), raw);
                }
            }
            for child in map.values_mut() {
                normalize_ids(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                normalize_ids(item);
            }
        }
        _ => {}
    }
}

// =============================================================================
// RECORDS
// =============================================================================

const UNKNOWN_COLLEGE: &str = "Unknown college";

/// An application user as returned by the auth endpoints.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Backend fields this client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A college listing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct College {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub image: String,
    /// Institution kind (`University`, `College`, `Institute`, `Academy`).
    #[serde(default, rename = "type")]
    pub college_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub established: Option<i32>,
    #[serde(default)]
    pub affiliations: Vec<String>,
    #[serde(default)]
    pub courses: Vec<String>,
    #[serde(default)]
    pub facilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuition_fee: Option<f64>,
    #[serde(default)]
    pub gallery: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Reviews embedded by the detail endpoint, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The college a booking points at: either a bare id or the populated record.
///
/// `Missing` covers a `null` reference, which the backend sends once the
/// college has been deleted, and an absent key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollegeRef {
    Id(String),
    College(Box<College>),
    #[default]
    Missing,
}

impl CollegeRef {
    /// College id regardless of which shape the backend sent.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Id(id) => Some(id),
            Self::College(college) => college.id.as_deref(),
            Self::Missing => None,
        }
    }

    /// The embedded record, if the backend populated it.
    #[must_use]
    pub fn college(&self) -> Option<&College> {
        match self {
            Self::College(college) => Some(college),
            Self::Id(_) | Self::Missing => None,
        }
    }

    /// Display name for listings; falls back to the id when not populated.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Id(id) if !id.is_empty() => id,
            Self::College(college) if !college.name.is_empty() => &college.name,
            Self::College(college) => college.id.as_deref().unwrap_or(UNKNOWN_COLLEGE),
            Self::Id(_) | Self::Missing => UNKNOWN_COLLEGE,
        }
    }
}

/// Review state of an admission application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl BookingStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// An admission application submitted by a user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub college_id: CollegeRef,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub previous_education: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardian_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardian_phone: Option<String>,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A user review of a college.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub college_id: String,
    #[serde(default)]
    pub user_name: String,
    /// Star rating; whole numbers in practice, but the backend stores a plain
    /// JSON number.
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body returned by register and login.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub message: String,
    pub user: User,
    pub token: String,
}

/// `/api/auth/me` and `/api/auth/profile` answer with either shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ProfileEnvelope {
    Wrapped { user: User },
    Bare(User),
}

impl ProfileEnvelope {
    pub(crate) fn into_user(self) -> User {
        match self {
            Self::Wrapped { user } | Self::Bare(user) => user,
        }
    }
}

// =============================================================================
// REQUEST PAYLOADS
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Sign-in with an identity already verified by an external provider.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialLoginRequest {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Provider name as the backend knows it (`google`, `github`).
    pub auth_provider: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Reply to a reset request. The backend may hand the reset token back
/// directly instead of mailing it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ForgotPasswordResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Partial profile update; absent fields are left untouched server-side.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub college_id: String,
    pub student_name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub previous_education: String,
    pub grade: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardian_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardian_phone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub college_id: String,
    pub rating: u8,
    pub comment: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReviewUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Filters for the college listing. Unset fields are never sent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollegeFilter {
    pub search: Option<String>,
    pub college_type: Option<String>,
    pub min_rating: Option<f64>,
    pub sort_by: Option<String>,
}

impl CollegeFilter {
    /// Query pairs for the filters that are set, in a stable order.
    ///
    /// Empty strings and a zero minimum rating count as unset.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_owned()));
        }
        if let Some(kind) = self.college_type.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("type", kind.to_owned()));
        }
        if let Some(min_rating) = self.min_rating.filter(|r| r.abs() > f64::EPSILON) {
            pairs.push(("minRating", min_rating.to_string()));
        }
        if let Some(sort_by) = self.sort_by.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("sortBy", sort_by.to_owned()));
        }
        pairs
    }
}
