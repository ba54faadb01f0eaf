//! Rows swept by the background reapers.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Entity classes that carry a validity period and an `expired` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeBoundedKind {
    Offer,
    Request,
}

impl TimeBoundedKind {
    pub fn table(&self) -> &'static str {
        match self {
            TimeBoundedKind::Offer => "offers",
            TimeBoundedKind::Request => "requests",
        }
    }
}

/// Offer or request row. Once `expired` is set it never goes back to false.
#[derive(Debug, Clone, FromRow)]
pub struct TimeBounded {
    pub id: Uuid,
    pub user_id: Uuid,
    pub validity_period: DateTime<Utc>,
    pub expired: bool,
}

impl TimeBounded {
    pub fn new(user_id: Uuid, validity_period: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            validity_period,
            expired: false,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    pub fn new(user_id: Uuid, created_at: DateTime<Utc>, read: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            created_at,
            read,
        }
    }
}
