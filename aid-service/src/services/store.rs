//! Persistent-store contracts consumed by the engine.

use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{Group, Notification, TimeBounded, TimeBoundedKind, User};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Exact, case-sensitive match on `mail`.
    async fn find_user_by_mail(&self, mail: &str) -> Result<Option<User>, AppError>;

    async fn find_groups_for_user(&self, user_id: Uuid) -> Result<Vec<Group>, AppError>;

    /// Insert the user and attach every group flagged `default_group`.
    async fn insert_user_with_default_groups(&self, user: &User) -> Result<(), AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

#[async_trait]
pub trait LifecycleStore: Send + Sync {
    /// Rows with `expired = false`, ascending by `validity_period`.
    async fn unexpired(&self, kind: TimeBoundedKind) -> Result<Vec<TimeBounded>, AppError>;

    /// One bulk statement setting `expired = true` for `ids`. Returns rows changed.
    async fn mark_expired(&self, kind: TimeBoundedKind, ids: &[Uuid]) -> Result<u64, AppError>;

    /// Rows with `read = true`, ascending by `created_at`.
    async fn read_notifications(&self) -> Result<Vec<Notification>, AppError>;

    /// One bulk delete of read notifications in `ids`. Returns rows removed.
    async fn delete_notifications(&self, ids: &[Uuid]) -> Result<u64, AppError>;
}
