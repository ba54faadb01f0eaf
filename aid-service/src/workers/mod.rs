//! Long-lived background tasks.

pub mod reaper;
pub mod sessions;

pub use reaper::{
    Candidate, CycleReport, ExpireTimeBounded, PurgeReadNotifications, ReapPolicy, Reaper,
};
pub use sessions::spawn_session_janitor;

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ReaperConfig;
use crate::models::TimeBoundedKind;
use crate::services::LifecycleStore;

/// Start one reaper per entity class: offers, requests and notifications.
///
/// The reapers share `store` but never coordinate with each other.
pub fn spawn_reapers(
    store: Arc<dyn LifecycleStore>,
    config: &ReaperConfig,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let reapers = [
        Reaper::new(
            ExpireTimeBounded::new(store.clone(), TimeBoundedKind::Offer),
            config.offer_interval(),
        ),
        Reaper::new(
            ExpireTimeBounded::new(store.clone(), TimeBoundedKind::Request),
            config.request_interval(),
        ),
        Reaper::new(
            PurgeReadNotifications::new(store, config.notification_retention()),
            config.notification_interval(),
        ),
    ];

    reapers
        .into_iter()
        .map(|reaper| {
            reaper
                .with_batch_size(config.batch_size)
                .spawn(shutdown.clone())
        })
        .collect()
}
