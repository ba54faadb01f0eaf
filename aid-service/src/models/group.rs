use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Access-right label carried by a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Permission {
    User,
    /// Region-scoped administration.
    Admin,
    /// Grants everything, in every region.
    Superadmin,
    Other(String),
}

impl Permission {
    pub fn as_str(&self) -> &str {
        match self {
            Permission::User => "user",
            Permission::Admin => "admin",
            Permission::Superadmin => "superadmin",
            Permission::Other(label) => label,
        }
    }
}

impl FromStr for Permission {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "user" => Permission::User,
            "admin" => Permission::Admin,
            "superadmin" => Permission::Superadmin,
            other => Permission::Other(other.to_string()),
        })
    }
}

impl From<&str> for Permission {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(permission) => permission,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A bundle of permissions, optionally scoped to one region.
///
/// `region_id = None` marks a global group.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub group_id: Uuid,
    pub region_id: Option<Uuid>,
    pub default_group: bool,
    pub permissions: HashSet<Permission>,
}

impl Group {
    pub fn new(region_id: Option<Uuid>, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            group_id: Uuid::new_v4(),
            region_id,
            default_group: false,
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn grants(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }
}
