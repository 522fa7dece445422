//! Scheduled removal of expired refresh records and idle rate limiter
//! entries.

use crate::db::Database;
use crate::rate_limit::RateLimitConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub async fn run_cleanup(db: &Database, rate_limit: &RateLimitConfig) {
    match db.tokens().delete_expired().await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired refresh records", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up expired refresh records: {}", e),
    }

    let tracked = rate_limit.prune();
    debug!(tracked, "Pruned credential rate limiter");
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(
    db: Database,
    rate_limit: Arc<RateLimitConfig>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        // The first tick completes immediately; run_cleanup already ran at startup.
        interval.tick().await;

        loop {
            interval.tick().await;
            run_cleanup(&db, &rate_limit).await;
        }
    })
}
