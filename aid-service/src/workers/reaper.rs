//! Batched background sweeps over time-bounded rows.
//!
//! A [`Reaper`] owns one [`ReapPolicy`] and runs it every `interval` until
//! its cancellation token fires. Each cycle buffers due ids and flushes
//! them in bulk statements of at most `batch_size` ids.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::TimeBoundedKind;
use crate::services::LifecycleStore;

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// A row the policy may act on, with the instant it becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: Uuid,
    pub due_at: DateTime<Utc>,
}

/// What a reaper sweeps and what it does to due rows.
///
/// `apply` must be idempotent: re-applying it to ids already handled is a
/// no-op on the store.
#[async_trait]
pub trait ReapPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Eligible rows, ascending by `due_at`.
    async fn candidates(&self) -> Result<Vec<Candidate>, AppError>;

    /// One bulk mutation over `ids`. Returns rows affected.
    async fn apply(&self, ids: &[Uuid]) -> Result<u64, AppError>;
}

/// Flags offers or requests whose validity period has passed.
pub struct ExpireTimeBounded {
    store: Arc<dyn LifecycleStore>,
    kind: TimeBoundedKind,
}

impl ExpireTimeBounded {
    pub fn new(store: Arc<dyn LifecycleStore>, kind: TimeBoundedKind) -> Self {
        Self { store, kind }
    }
}

#[async_trait]
impl ReapPolicy for ExpireTimeBounded {
    fn name(&self) -> &'static str {
        self.kind.table()
    }

    async fn candidates(&self) -> Result<Vec<Candidate>, AppError> {
        let rows = self.store.unexpired(self.kind).await?;
        Ok(rows
            .into_iter()
            .map(|row| Candidate {
                id: row.id,
                due_at: row.validity_period,
            })
            .collect())
    }

    async fn apply(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        self.store.mark_expired(self.kind, ids).await
    }
}

/// Deletes read notifications once they are older than `retention`.
pub struct PurgeReadNotifications {
    store: Arc<dyn LifecycleStore>,
    retention: ChronoDuration,
}

impl PurgeReadNotifications {
    pub fn new(store: Arc<dyn LifecycleStore>, retention: ChronoDuration) -> Self {
        Self { store, retention }
    }
}

#[async_trait]
impl ReapPolicy for PurgeReadNotifications {
    fn name(&self) -> &'static str {
        "notifications"
    }

    async fn candidates(&self) -> Result<Vec<Candidate>, AppError> {
        let rows = self.store.read_notifications().await?;
        Ok(rows
            .into_iter()
            .filter(|n| n.read)
            .filter_map(|n| {
                // A deadline past the representable range is never due.
                let due_at = n.created_at.checked_add_signed(self.retention);
                if due_at.is_none() {
                    tracing::debug!(notification_id = %n.id, "Retention deadline out of range");
                }
                due_at.map(|due_at| Candidate { id: n.id, due_at })
            })
            .collect())
    }

    async fn apply(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        self.store.delete_notifications(ids).await
    }
}

/// Outcome of a single sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub scanned: usize,
    pub due: usize,
    pub batches: usize,
    pub affected: u64,
}

pub struct Reaper {
    policy: Box<dyn ReapPolicy>,
    batch_size: usize,
    interval: Duration,
}

impl Reaper {
    pub fn new(policy: impl ReapPolicy + 'static, interval: Duration) -> Self {
        Self {
            policy: Box::new(policy),
            batch_size: DEFAULT_BATCH_SIZE,
            interval,
        }
    }

    /// A zero batch size is treated as 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn name(&self) -> &'static str {
        self.policy.name()
    }

    /// Run one sweep with `now` as the cut-off.
    ///
    /// A failed flush aborts the cycle; batches already flushed stay applied
    /// and the remaining rows are picked up again next cycle.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport, AppError> {
        let candidates = self.policy.candidates().await?;
        let mut report = CycleReport {
            scanned: candidates.len(),
            ..CycleReport::default()
        };

        let mut buffer: Vec<Uuid> = Vec::with_capacity(self.batch_size);
        for candidate in candidates {
            if candidate.due_at >= now {
                continue;
            }
            buffer.push(candidate.id);
            report.due += 1;

            if buffer.len() >= self.batch_size {
                report.affected += self.flush(&buffer).await?;
                report.batches += 1;
                buffer.clear();
            }
        }

        if !buffer.is_empty() {
            report.affected += self.flush(&buffer).await?;
            report.batches += 1;
        }

        Ok(report)
    }

    async fn flush(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let affected = self.policy.apply(ids).await?;
        metrics::counter!("reaper_rows_affected_total", "reaper" => self.policy.name())
            .increment(affected);
        tracing::debug!(
            reaper = self.policy.name(),
            batch = ids.len(),
            affected,
            "Flushed reaper batch"
        );
        Ok(affected)
    }

    /// Sweep, then sleep, until `shutdown` is cancelled.
    ///
    /// A cycle that has started is allowed to finish; cancellation is
    /// observed between cycles and while sleeping.
    pub async fn run(self, shutdown: CancellationToken) {
        let name = self.policy.name();
        tracing::info!(
            reaper = name,
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            "Reaper started"
        );

        while !shutdown.is_cancelled() {
            metrics::counter!("reaper_cycles_total", "reaper" => name).increment(1);

            match self.run_cycle(Utc::now()).await {
                Ok(report) if report.due > 0 => {
                    tracing::info!(
                        reaper = name,
                        scanned = report.scanned,
                        due = report.due,
                        batches = report.batches,
                        affected = report.affected,
                        "Reaper cycle completed"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    metrics::counter!("reaper_cycle_failures_total", "reaper" => name)
                        .increment(1);
                    tracing::error!(reaper = name, error = %e, "Reaper cycle failed");
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!(reaper = name, "Reaper stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Notification;
    use crate::services::MemoryStore;
    use std::sync::Mutex;

    struct Recording {
        candidates: Vec<Candidate>,
        applied: Mutex<Vec<Vec<Uuid>>>,
    }

    impl Recording {
        fn new(candidates: Vec<Candidate>) -> Arc<Self> {
            Arc::new(Self {
                candidates,
                applied: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ReapPolicy for Arc<Recording> {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn candidates(&self) -> Result<Vec<Candidate>, AppError> {
            Ok(self.candidates.clone())
        }

        async fn apply(&self, ids: &[Uuid]) -> Result<u64, AppError> {
            self.applied.lock().unwrap().push(ids.to_vec());
            Ok(ids.len() as u64)
        }
    }

    fn due_in(now: DateTime<Utc>, minutes: i64) -> Candidate {
        Candidate {
            id: Uuid::new_v4(),
            due_at: now + ChronoDuration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn due_rows_are_flushed_in_order() {
        let now = Utc::now();
        let first = due_in(now, -30);
        let second = due_in(now, -5);
        let policy = Recording::new(vec![first, second, due_in(now, 5)]);
        let reaper = Reaper::new(policy.clone(), Duration::from_secs(60));

        let report = reaper.run_cycle(now).await.unwrap();

        assert_eq!(report.scanned, 3);
        assert_eq!(report.due, 2);
        assert_eq!(report.batches, 1);
        assert_eq!(*policy.applied.lock().unwrap(), vec![vec![first.id, second.id]]);
    }

    #[tokio::test]
    async fn due_at_exactly_now_is_not_due() {
        let now = Utc::now();
        let policy = Recording::new(vec![due_in(now, 0)]);
        let reaper = Reaper::new(policy.clone(), Duration::from_secs(60));

        let report = reaper.run_cycle(now).await.unwrap();

        assert_eq!(report.due, 0);
        assert!(policy.applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exact_multiple_of_batch_size_has_no_trailing_flush() {
        let now = Utc::now();
        let policy = Recording::new((0..6).map(|_| due_in(now, -1)).collect());
        let reaper = Reaper::new(policy.clone(), Duration::from_secs(60)).with_batch_size(3);

        let report = reaper.run_cycle(now).await.unwrap();

        assert_eq!(report.batches, 2);
        let sizes: Vec<usize> = policy.applied.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3]);
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let reaper = Reaper::new(Recording::new(vec![]), Duration::from_secs(1)).with_batch_size(0);
        assert_eq!(reaper.batch_size, 1);
    }

    #[tokio::test]
    async fn out_of_range_retention_is_never_due() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store
            .add_notification(Notification::new(
                Uuid::new_v4(),
                now - ChronoDuration::days(30),
                true,
            ))
            .unwrap();

        let reaper = Reaper::new(
            PurgeReadNotifications::new(store.clone(), ChronoDuration::hours(100_000_000_000)),
            Duration::from_secs(60),
        );
        let report = reaper.run_cycle(now).await.unwrap();

        assert_eq!(report.scanned, 0);
        assert_eq!(report.due, 0);
        assert_eq!(store.notifications().unwrap().len(), 1);
    }
}
