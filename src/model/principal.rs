use serde::{Deserialize, Serialize};

use crate::model::{Id, Role, User};

/// The authenticated actor behind a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Id,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Digest of the bearer token that authenticated this request
    #[serde(skip)]
    pub session_id: Option<Id>,
}

impl Principal {
    pub fn new(user_id: Id, role: Role) -> Self {
        Self {
            user_id,
            name: String::new(),
            email: String::new(),
            role,
            session_id: None,
        }
    }

    pub fn from_user(user: &User, session_id: Option<Id>) -> Self {
        Self {
            user_id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            session_id,
        }
    }

    /// Administrators bypass ownership checks.
    pub fn is_elevated(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn owns(&self, owner_id: &str) -> bool {
        self.user_id == owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_from_user() {
        let user = User::new(
            "Publisher".to_string(),
            "pub@gmail.com".to_string(),
            Role::Publisher,
            "hash".to_string(),
        );
        let principal = Principal::from_user(&user, Some("digest".to_string()));

        assert_eq!(principal.user_id, user.id);
        assert!(principal.owns(&user.id));
        assert!(!principal.is_elevated());
        assert!(Principal::new("x".to_string(), Role::Admin).is_elevated());
    }
}
