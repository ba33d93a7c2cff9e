use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Stored Documents ---

/// User
///
/// A user record from the `users` table. `email` is the natural key; `id` is what the
/// role patch endpoint addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    // Unset until an admin promotes the user. See [`Role`].
    pub role: Option<String>,
}

/// Role
///
/// The role tags the role-check endpoints look for. The patch endpoint stores any
/// string, so a user's role is kept as text and compared through [`Role::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Instructor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Instructor => "instructor",
        }
    }
}

impl User {
    /// Whether the stored role tag equals `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.role.as_deref() == Some(role.as_str())
    }
}

/// ClassListing
///
/// One row of the class catalog. Read-only through this API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ClassListing {
    pub id: Uuid,
    pub class_name: String,
    pub class_image: Option<String>,
    pub instructor_name: Option<String>,
    pub instructor_email: Option<String>,
    pub available_seats: i32,
    pub price: f64,
    // 'pending' | 'approved' | 'denied'
    pub status: String,
}

/// Instructor
///
/// Reference data shown on the instructors page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Instructor {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// CartItem
///
/// A user's pending selection. Apart from `id` and the owner `email`, every field the
/// client sent is kept verbatim in `details` and flattened back on the way out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CartItem {
    pub id: Uuid,
    // A non-string `email` stays in `details`, so it must not be shadowed by a null here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub details: HashMap<String, Value>,
}

// --- Request Payloads ---

/// NewUser
///
/// Body of `POST /users`, sent by the frontend on every sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewUser {
    pub email: String,
    #[serde(default, alias = "name")]
    pub display_name: Option<String>,
    #[serde(default, alias = "photo")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// NewCartItem
///
/// Body of `POST /carts`. Any JSON object is accepted: `email` becomes the owner only
/// when it is a string, otherwise it is stored with the rest of the fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(from = "HashMap<String, Value>")]
pub struct NewCartItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub details: HashMap<String, Value>,
}

impl From<HashMap<String, Value>> for NewCartItem {
    fn from(mut details: HashMap<String, Value>) -> Self {
        let email = take_string(&mut details, "email");
        Self { email, details }
    }
}

/// Removes `key` from `fields` if it holds a string. Any other value is left in place.
pub fn take_string(fields: &mut HashMap<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(value)) => Some(value),
        Some(other) => {
            fields.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

impl NewCartItem {
    /// Drops client-supplied identifiers; the store assigns the id.
    pub fn into_stored_details(mut self) -> (Option<String>, HashMap<String, Value>) {
        self.details.remove("id");
        self.details.remove("_id");
        (self.email, self.details)
    }
}

/// CartQuery
///
/// Query string of `GET /carts`.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CartQuery {
    /// Owner whose cart should be listed. Must match the bearer identity.
    pub email: Option<String>,
}

// --- Response Envelopes ---

/// TokenResponse
///
/// Result of `POST /jwt`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// InsertResponse
///
/// Acknowledgment for any successful insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InsertResponse {
    pub acknowledged: bool,
    pub inserted_id: Uuid,
}

impl InsertResponse {
    pub fn new(inserted_id: Uuid) -> Self {
        Self {
            acknowledged: true,
            inserted_id,
        }
    }
}

/// DeleteResponse
///
/// Acknowledgment for `DELETE /carts/{id}`. `deleted_count` is zero when nothing matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DeleteResponse {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

/// MessageResponse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// RegisterResponse
///
/// `POST /users` either inserts or reports that the email is already known.
/// Both outcomes are successes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum RegisterResponse {
    Inserted(InsertResponse),
    AlreadyExists(MessageResponse),
}

/// AdminStatus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AdminStatus {
    pub admin: bool,
}

/// InstructorStatus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct InstructorStatus {
    pub instructor: bool,
}

/// RoleStatus
///
/// Body of the role-check endpoint; which flag is present depends on the role asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum RoleStatus {
    Admin(AdminStatus),
    Instructor(InstructorStatus),
}

/// RoleUpdateResponse
///
/// Result of `PATCH /users/{role}/{id}`. `message` is only present on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RoleUpdateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub message: Option<String>,
}

impl RoleUpdateResponse {
    pub fn updated() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: &str) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
        }
    }
}
