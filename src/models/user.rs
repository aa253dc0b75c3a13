//! Authenticated users and workflow actors

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::enums::Role;
use crate::error::AppError;

/// The person performing a workflow step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    pub user_id: i32,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn new(user_id: i32, roles: impl Into<Vec<Role>>) -> Self {
        Self {
            user_id,
            roles: roles.into(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::SystemAdmin)
    }

    pub fn has_any(&self, roles: &[Role]) -> bool {
        self.is_admin() || self.roles.iter().any(|r| roles.contains(r))
    }

    pub fn require_any(&self, roles: &[Role], what: &str) -> Result<(), AppError> {
        if self.has_any(roles) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(format!(
                "User {} may not {}",
                self.user_id, what
            )))
        }
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub roles: Vec<Role>,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(username: &str, user_id: i32, roles: Vec<Role>, valid_hours: u64) -> Self {
        let now = Utc::now();
        Self {
            sub: username.to_string(),
            user_id,
            roles,
            iat: now.timestamp(),
            exp: (now + Duration::hours(valid_hours as i64)).timestamp(),
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.roles.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let claims = UserClaims::new("wh.santos", 12, vec![Role::Warehouseman], 1);
        let token = claims.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.user_id, 12);
        assert_eq!(parsed.roles, vec![Role::Warehouseman]);
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn test_admin_has_every_role() {
        let admin = Actor::new(1, vec![Role::SystemAdmin]);
        assert!(admin.has_any(&[Role::FinanceDirector]));

        let clerk = Actor::new(2, vec![Role::SiteInventoryClerk]);
        assert!(!clerk.has_any(&[Role::FinanceDirector]));
        assert!(matches!(
            clerk.require_any(&[Role::FinanceDirector], "approve requests"),
            Err(AppError::PermissionDenied(_))
        ));
    }
}
