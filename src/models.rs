use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, de};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::errors::AuthError;

/// Stable numeric handle for a registered user. The subject of every authorization check.
pub type UserId = i64;
pub type PostId = i64;
pub type CommentId = i64;

// --- Core Application Schemas (Mapped to Database) ---

/// Credential
///
/// The `users` row as the auth core sees it. Never serialized: the password hash must not
/// leave the server.
#[derive(Debug, Clone, FromRow)]
pub struct Credential {
    pub id: UserId,
    pub username: String,
    pub email: String,
    // PHC-formatted argon2 hash, salt embedded.
    pub password_hash: String,
    // The RBAC field. Only admins bypass ownership checks.
    pub is_admin: bool,
}

/// Gender
///
/// Closed set accepted by the profile, mirrored by a CHECK constraint on `user_profiles`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

/// ProfileFields
///
/// The public profile created alongside the credential at registration
/// (`user_profiles` table, one row per user).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProfileFields {
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub profile_image: String,
    pub gender: Gender,
    #[ts(type = "string")]
    #[serde(deserialize_with = "deserialize_birth_date")]
    pub birth_date: NaiveDate,
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp; a timestamp keeps only its date.
fn deserialize_birth_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(&raw).map(|ts| ts.date_naive()))
        .map_err(|_| de::Error::custom(format!("invalid birth_date {raw:?}: expected YYYY-MM-DD or RFC 3339")))
}

/// NewUser
///
/// Insert payload handed to the repository once the password has been hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub profile: ProfileFields,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for `POST /auth/register`. Profile fields sit at the top level of the JSON body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(flatten)]
    pub profile: ProfileFields,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ChangeEmailRequest {
    pub password: String,
    pub new_email: String,
}

// --- Response Schemas (Output) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterResponse {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ValidateResponse {
    pub id: UserId,
}

/// UserResponse
///
/// Account view returned by `GET /me` and `GET /admin/users/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<Credential> for UserResponse {
    fn from(c: Credential) -> Self {
        Self {
            id: c.id,
            username: c.username,
            email: c.email,
            is_admin: c.is_admin,
        }
    }
}

// --- Input Validation ---
//
// Field rules carried over from the registration form: required fields are non-empty,
// name/surname at most 20 characters, description/profile image at most 255.

const MAX_NAME_LEN: usize = 20;
const MAX_TEXT_LEN: usize = 255;

fn bad_request(message: &str) -> AuthError {
    AuthError::BadRequest {
        message: message.to_string(),
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(bad_request(&format!("{field} is required")));
    }
    Ok(())
}

/// Minimal shape check: one `@` with something on both sides and a dot in the domain.
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') =>
        {
            Ok(())
        }
        _ => Err(bad_request("invalid email")),
    }
}

impl ProfileFields {
    pub fn validate(&self) -> Result<(), AuthError> {
        require_non_empty(&self.name, "name")?;
        require_non_empty(&self.surname, "surname")?;
        if self.name.chars().count() > MAX_NAME_LEN || self.surname.chars().count() > MAX_NAME_LEN {
            return Err(bad_request("name and surname must be at most 20 characters"));
        }
        if self.description.chars().count() > MAX_TEXT_LEN
            || self.profile_image.chars().count() > MAX_TEXT_LEN
        {
            return Err(bad_request("description and profile image must be at most 255 characters"));
        }
        Ok(())
    }
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        require_non_empty(&self.username, "username")?;
        require_non_empty(&self.password, "password")?;
        validate_email(&self.email)?;
        self.profile.validate()
    }
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        require_non_empty(&self.username, "username")?;
        require_non_empty(&self.password, "password")
    }
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        require_non_empty(&self.old_password, "old_password")?;
        require_non_empty(&self.new_password, "new_password")
    }
}

impl ChangeEmailRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        require_non_empty(&self.password, "password")?;
        validate_email(&self.new_email)
    }
}
