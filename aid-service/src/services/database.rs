//! PostgreSQL store for aid-service.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use super::store::{IdentityStore, LifecycleStore};
use crate::models::{Group, Notification, Permission, TimeBounded, TimeBoundedKind, User};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct GroupRow {
    group_id: Uuid,
    region_id: Option<Uuid>,
    default_group: bool,
    access_rights: Vec<String>,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            group_id: row.group_id,
            region_id: row.region_id,
            default_group: row.default_group,
            permissions: row
                .access_rights
                .iter()
                .map(|label| Permission::from(label.as_str()))
                .collect(),
        }
    }
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error(e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!(e))
}

/// A concurrent registration that lost the race on `users.mail` is a
/// conflict, not a database failure.
fn insert_user_error(e: sqlx::Error) -> AppError {
    let unique_violation = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());

    if unique_violation {
        AppError::Conflict(anyhow::anyhow!("Mail already registered"))
    } else {
        db_error(e)
    }
}

#[async_trait]
impl IdentityStore for Database {
    async fn find_user_by_mail(&self, mail: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            "SELECT user_id, mail, password_hash, enabled FROM users WHERE mail = $1",
        )
        .bind(mail)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn find_groups_for_user(&self, user_id: Uuid) -> Result<Vec<Group>, AppError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT g.group_id, g.region_id, g.default_group,
                   COALESCE(
                       array_agg(p.access_right) FILTER (WHERE p.access_right IS NOT NULL),
                       '{}'
                   ) AS access_rights
            FROM user_groups ug
            JOIN groups g ON g.group_id = ug.group_id
            LEFT JOIN group_permissions gp ON gp.group_id = g.group_id
            LEFT JOIN permissions p ON p.permission_id = gp.permission_id
            WHERE ug.user_id = $1
            GROUP BY g.group_id, g.region_id, g.default_group
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(Group::from).collect())
    }

    async fn insert_user_with_default_groups(&self, user: &User) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(
            "INSERT INTO users (user_id, mail, password_hash, enabled) VALUES ($1, $2, $3, $4)",
        )
        .bind(user.user_id)
        .bind(&user.mail)
        .bind(&user.password_hash)
        .bind(user.enabled)
        .execute(&mut *tx)
        .await
        .map_err(insert_user_error)?;

        sqlx::query(
            r#"
            INSERT INTO user_groups (user_id, group_id)
            SELECT $1, group_id FROM groups WHERE default_group = true
            "#,
        )
        .bind(user.user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }
}

#[async_trait]
impl LifecycleStore for Database {
    async fn unexpired(&self, kind: TimeBoundedKind) -> Result<Vec<TimeBounded>, AppError> {
        let sql = format!(
            "SELECT id, user_id, validity_period, expired FROM {} \
             WHERE expired = false ORDER BY validity_period ASC",
            kind.table()
        );
        sqlx::query_as::<_, TimeBounded>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn mark_expired(&self, kind: TimeBoundedKind, ids: &[Uuid]) -> Result<u64, AppError> {
        let sql = format!(
            "UPDATE {} SET expired = true WHERE id = ANY($1) AND expired = false",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }

    async fn read_notifications(&self) -> Result<Vec<Notification>, AppError> {
        sqlx::query_as::<_, Notification>(
            "SELECT id, user_id, created_at, read FROM notifications \
             WHERE read = true ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn delete_notifications(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ANY($1) AND read = true")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct PgError(ErrorKind);

    impl fmt::Display for PgError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "pg error: {:?}", self.0)
        }
    }

    impl StdError for PgError {}

    impl DatabaseError for PgError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"users_mail_key\""
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.0 {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    #[test]
    fn unique_violation_on_user_insert_is_a_conflict() {
        let err = sqlx::Error::Database(Box::new(PgError(ErrorKind::UniqueViolation)));
        assert!(matches!(insert_user_error(err), AppError::Conflict(_)));
    }

    #[test]
    fn other_insert_failures_stay_database_errors() {
        let err = sqlx::Error::Database(Box::new(PgError(ErrorKind::Other)));
        assert!(matches!(insert_user_error(err), AppError::DatabaseError(_)));

        assert!(matches!(
            insert_user_error(sqlx::Error::PoolTimedOut),
            AppError::DatabaseError(_)
        ));
    }
}
