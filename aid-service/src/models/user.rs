//! User model - credentials row and the authenticated identity built from it.

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::Group;

/// User row as stored. `mail` is the unique, case-sensitive identity key.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub mail: String,
    pub password_hash: String,
    pub enabled: bool,
}

impl User {
    /// Create a new, enabled user.
    pub fn new(mail: String, password_hash: String) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            mail,
            password_hash,
            enabled: true,
        }
    }
}

/// Authenticated user with every group it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub mail: String,
    pub enabled: bool,
    pub groups: Vec<Group>,
}

impl Identity {
    pub fn new(user: User, groups: Vec<Group>) -> Self {
        Self {
            user_id: user.user_id,
            mail: user.mail,
            enabled: user.enabled,
            groups,
        }
    }

    /// Session-store key for this identity.
    pub fn key(&self) -> &str {
        &self.mail
    }
}
