//! In-process implementation of the store contracts.
//!
//! Used by the test suites and for running the engine without PostgreSQL.
//! Every bulk mutation is recorded so callers can assert on batching.

use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::store::{IdentityStore, LifecycleStore};
use crate::models::{Group, Notification, TimeBounded, TimeBoundedKind, User};

/// One bulk `UPDATE`/`DELETE` issued against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkCall {
    pub table: &'static str,
    pub size: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, User>>,
    memberships: Mutex<HashMap<Uuid, Vec<Group>>>,
    default_groups: Mutex<Vec<Group>>,
    offers: Mutex<Vec<TimeBounded>>,
    requests: Mutex<Vec<TimeBounded>>,
    notifications: Mutex<Vec<Notification>>,
    bulk_calls: Mutex<Vec<BulkCall>>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, AppError> {
    mutex
        .lock()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("{} mutex poisoned: {}", what, e)))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User, groups: Vec<Group>) -> Result<(), AppError> {
        lock(&self.memberships, "memberships")?.insert(user.user_id, groups);
        lock(&self.users, "users")?.insert(user.mail.clone(), user);
        Ok(())
    }

    pub fn add_default_group(&self, mut group: Group) -> Result<(), AppError> {
        group.default_group = true;
        lock(&self.default_groups, "default groups")?.push(group);
        Ok(())
    }

    pub fn add_time_bounded(&self, kind: TimeBoundedKind, row: TimeBounded) -> Result<(), AppError> {
        self.rows(kind)?.push(row);
        Ok(())
    }

    pub fn add_notification(&self, notification: Notification) -> Result<(), AppError> {
        lock(&self.notifications, "notifications")?.push(notification);
        Ok(())
    }

    pub fn time_bounded(&self, kind: TimeBoundedKind) -> Result<Vec<TimeBounded>, AppError> {
        Ok(self.rows(kind)?.clone())
    }

    pub fn notifications(&self) -> Result<Vec<Notification>, AppError> {
        Ok(lock(&self.notifications, "notifications")?.clone())
    }

    pub fn bulk_calls(&self) -> Result<Vec<BulkCall>, AppError> {
        Ok(lock(&self.bulk_calls, "bulk calls")?.clone())
    }

    pub fn clear_bulk_calls(&self) -> Result<(), AppError> {
        lock(&self.bulk_calls, "bulk calls")?.clear();
        Ok(())
    }

    fn rows(&self, kind: TimeBoundedKind) -> Result<MutexGuard<'_, Vec<TimeBounded>>, AppError> {
        match kind {
            TimeBoundedKind::Offer => lock(&self.offers, "offers"),
            TimeBoundedKind::Request => lock(&self.requests, "requests"),
        }
    }

    fn record(&self, table: &'static str, size: usize) -> Result<(), AppError> {
        lock(&self.bulk_calls, "bulk calls")?.push(BulkCall { table, size });
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_user_by_mail(&self, mail: &str) -> Result<Option<User>, AppError> {
        Ok(lock(&self.users, "users")?.get(mail).cloned())
    }

    async fn find_groups_for_user(&self, user_id: Uuid) -> Result<Vec<Group>, AppError> {
        Ok(lock(&self.memberships, "memberships")?
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_user_with_default_groups(&self, user: &User) -> Result<(), AppError> {
        let defaults = lock(&self.default_groups, "default groups")?.clone();
        let mut users = lock(&self.users, "users")?;
        if users.contains_key(&user.mail) {
            return Err(AppError::Conflict(anyhow::anyhow!("Mail already registered")));
        }
        users.insert(user.mail.clone(), user.clone());
        lock(&self.memberships, "memberships")?.insert(user.user_id, defaults);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl LifecycleStore for MemoryStore {
    async fn unexpired(&self, kind: TimeBoundedKind) -> Result<Vec<TimeBounded>, AppError> {
        let mut rows: Vec<TimeBounded> = self
            .rows(kind)?
            .iter()
            .filter(|row| !row.expired)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.validity_period);
        Ok(rows)
    }

    async fn mark_expired(&self, kind: TimeBoundedKind, ids: &[Uuid]) -> Result<u64, AppError> {
        self.record(kind.table(), ids.len())?;
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let mut changed = 0;
        for row in self.rows(kind)?.iter_mut() {
            if !row.expired && wanted.contains(&row.id) {
                row.expired = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn read_notifications(&self) -> Result<Vec<Notification>, AppError> {
        let mut rows: Vec<Notification> = lock(&self.notifications, "notifications")?
            .iter()
            .filter(|n| n.read)
            .cloned()
            .collect();
        rows.sort_by_key(|n| n.created_at);
        Ok(rows)
    }

    async fn delete_notifications(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        self.record("notifications", ids.len())?;
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let mut notifications = lock(&self.notifications, "notifications")?;
        let before = notifications.len();
        notifications.retain(|n| !(n.read && wanted.contains(&n.id)));
        Ok((before - notifications.len()) as u64)
    }
}
