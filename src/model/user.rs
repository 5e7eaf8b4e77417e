use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::model::validation::{is_valid_email, Violations};
use crate::model::{generate_id, now, timestamp, Collection, Id, Resource, Role};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Stored user. `password` holds the hash, never the plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_password_token: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::option"
    )]
    pub reset_password_expire: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Resource for User {
    const COLLECTION: Collection = Collection::Users;
    const LABEL: &'static str = "User";
    const HIDDEN_FIELDS: &'static [&'static str] =
        &["password", "resetPasswordToken", "resetPasswordExpire"];

    fn id(&self) -> &Id {
        &self.id
    }
}

impl User {
    pub fn new(name: String, email: String, role: Role, password_hash: String) -> Self {
        Self {
            id: generate_id(),
            name,
            email: email.to_lowercase(),
            role,
            password: password_hash,
            reset_password_token: None,
            reset_password_expire: None,
            created_at: now(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }
}

/// What the API returns for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Registration payload, also used by admins to create users.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl NewUser {
    /// Self-registration may not claim the admin role; admins creating users may.
    pub fn validate(&self, allow_admin: bool) -> Result<(), ApiError> {
        let mut violations = Violations::new();
        violations
            .require(self.name.as_deref(), "Please add a name")
            .require(self.email.as_deref(), "Please add an email");
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            violations.check(is_valid_email(email), "Please add a valid email");
        }
        match self.password.as_deref() {
            Some(password) if !password.is_empty() => {
                violations.check(
                    password.chars().count() >= MIN_PASSWORD_LEN,
                    "Password must be at least 6 characters",
                );
            }
            _ => {
                violations.check(false, "Please add a password");
            }
        }
        if self.role == Some(Role::Admin) && !allow_admin {
            violations.check(false, "Role must be either user or publisher");
        }
        violations.into_result()
    }
}

/// Fields a signed-in user may change about themselves.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl DetailsUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut violations = Violations::new();
        if let Some(name) = self.name.as_deref() {
            violations.check(!name.trim().is_empty(), "Please add a name");
        }
        if let Some(email) = self.email.as_deref() {
            violations.check(is_valid_email(email), "Please add a valid email");
        }
        violations.into_result()
    }
}

/// Admin-side user update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        DetailsUpdate {
            name: self.name.clone(),
            email: self.email.clone(),
        }
        .validate()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordReset {
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForgotPassword {
    pub email: Option<String>,
}

pub fn validate_new_password(password: Option<&str>) -> Result<&str, ApiError> {
    match password {
        Some(password) if password.chars().count() >= MIN_PASSWORD_LEN => Ok(password),
        Some(password) if !password.is_empty() => {
            Err(ApiError::invalid("Password must be at least 6 characters"))
        }
        _ => Err(ApiError::invalid("Please add a password")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{to_document, strip_fields};

    #[test]
    fn test_registration_rejects_admin_role() {
        let payload = NewUser {
            name: Some("Mallory".to_string()),
            email: Some("mallory@gmail.com".to_string()),
            password: Some("123456".to_string()),
            role: Some(Role::Admin),
        };
        let err = payload.validate(false).unwrap_err();
        assert_eq!(err.to_string(), "Role must be either user or publisher");
        assert!(payload.validate(true).is_ok());
    }

    #[test]
    fn test_registration_reports_all_missing_fields() {
        let err = NewUser::default().validate(false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please add a name, Please add an email, Please add a password"
        );
    }

    #[test]
    fn test_hidden_fields_cover_secrets() {
        let mut user = User::new(
            "John".to_string(),
            "John@Gmail.com".to_string(),
            Role::User,
            "hash".to_string(),
        );
        user.reset_password_token = Some("digest".to_string());
        user.reset_password_expire = Some(now());

        let mut doc = to_document(&user).unwrap();
        assert_eq!(doc.get("email").and_then(|v| v.as_str()), Some("john@gmail.com"));
        strip_fields(&mut doc, User::HIDDEN_FIELDS);
        assert!(!doc.contains_key("password"));
        assert!(!doc.contains_key("resetPasswordToken"));
        assert!(!doc.contains_key("resetPasswordExpire"));
    }
}
