//! Scheduled removal of dead token records.

use crate::db::Database;
use chrono::Utc;
use std::time::Duration;
use tracing::{error, info};

/// Default interval between cleanup runs.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60); // 12 hours

/// Delete every token record that is expired or revoked.
///
/// Only rows that can never pass the gate again are touched, so a sweep
/// racing with a request never changes its outcome.
pub async fn run_cleanup(db: &Database) -> u64 {
    match db.tokens().delete_expired_or_revoked(Utc::now()).await {
        Ok(count) if count > 0 => {
            info!("Cleaned up {} expired or revoked tokens", count);
            count
        }
        Ok(_) => 0,
        Err(e) => {
            error!("Failed to clean up tokens: {}", e);
            0
        }
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately; startup already ran a sweep.
        interval.tick().await;

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}
