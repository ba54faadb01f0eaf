use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::Identity;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid mail format"))]
    pub mail: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub mail: String,
}

impl From<Identity> for RegisterResponse {
    fn from(identity: Identity) -> Self {
        Self {
            user_id: identity.user_id,
            mail: identity.mail,
        }
    }
}

/// Login does not apply format rules to `mail`; an unknown or malformed
/// address just fails as invalid credentials.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Mail is required"))]
    pub mail: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}
