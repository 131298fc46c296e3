use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use manafiles_db::{Database, DbError};
use tracing::{debug, error};

/// Background task that periodically drops expired sessions and password
/// reset codes. Expired rows are already rejected on use.
pub async fn run_reaper(db: Arc<dyn Database>, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        ticker.tick().await;
        if let Err(e) = purge_once(&*db).await {
            error!("reaper error: {e}");
        }
    }
}

pub async fn purge_once(db: &dyn Database) -> Result<u64, DbError> {
    let removed = db.purge_expired(Utc::now()).await?;
    if removed > 0 {
        debug!(removed, "reaper purged expired sessions and reset codes");
    }
    Ok(removed)
}
