use crate::error::ApiError;
use crate::model::{Principal, Role};

/// Role gate applied after authentication.
pub fn authorize(principal: &Principal, roles: &[Role]) -> Result<(), ApiError> {
    if roles.contains(&principal.role) {
        return Ok(());
    }
    Err(ApiError::Forbidden(format!(
        "User role {} is not authorized to access this route",
        principal.role
    )))
}

/// Owner-or-admin check. `action` completes "is not authorized to ...".
pub fn ensure_owner(principal: &Principal, owner_id: &str, action: &str) -> Result<(), ApiError> {
    if principal.owns(owner_id) || principal.is_elevated() {
        return Ok(());
    }
    log::info!(
        "User {} denied: not the owner ({}) and cannot {}",
        principal.user_id,
        owner_id,
        action
    );
    Err(ApiError::Unauthorized(format!(
        "User {} is not authorized to {}",
        principal.user_id, action
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_roles() {
        let user = Principal::new("u1".to_string(), Role::User);
        let publisher = Principal::new("p1".to_string(), Role::Publisher);

        assert!(authorize(&publisher, &[Role::Publisher, Role::Admin]).is_ok());
        let err = authorize(&user, &[Role::Publisher, Role::Admin]).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert_eq!(err.to_string(), "User role user is not authorized to access this route");
    }

    #[test]
    fn test_owner_or_admin() {
        let owner = Principal::new("owner".to_string(), Role::Publisher);
        let stranger = Principal::new("stranger".to_string(), Role::Publisher);
        let admin = Principal::new("admin".to_string(), Role::Admin);

        assert!(ensure_owner(&owner, "owner", "update this bootcamp").is_ok());
        assert!(ensure_owner(&admin, "owner", "update this bootcamp").is_ok());

        let err = ensure_owner(&stranger, "owner", "update this bootcamp").unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
        assert_eq!(err.to_string(), "User stranger is not authorized to update this bootcamp");
    }
}
