//! Periodic removal of expired codes, tokens and stale users.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::errors::StorageError;
use crate::storage::traits::OAuthStorage;

/// Number of records removed by one cleaning pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub authorization_codes: usize,
    pub access_tokens: usize,
    pub refresh_tokens: usize,
    pub users: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.authorization_codes + self.access_tokens + self.refresh_tokens + self.users
    }
}

/// Remove every artifact that expired before `now` and users created before `user_cutoff`
pub async fn clean_expired(
    storage: &dyn OAuthStorage,
    now: DateTime<Utc>,
    user_cutoff: DateTime<Utc>,
) -> Result<CleanupReport, StorageError> {
    Ok(CleanupReport {
        authorization_codes: storage.delete_expired_codes(now).await?,
        access_tokens: storage.delete_expired_access_tokens(now).await?,
        refresh_tokens: storage.delete_expired_refresh_tokens(now).await?,
        users: storage.delete_users_created_before(user_cutoff).await?,
    })
}

/// Run [`clean_expired`] every `interval` until `token` is cancelled
pub async fn run_cleaner(
    storage: Arc<dyn OAuthStorage>,
    interval: std::time::Duration,
    user_retention: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            () = token.cancelled() => {
                tracing::info!("cleaner stopped");
                return;
            }
            _ = ticker.tick() => {
                let now = Utc::now();
                match clean_expired(storage.as_ref(), now, now - user_retention).await {
                    Ok(report) if report.total() > 0 => {
                        tracing::info!(
                            authorization_codes = report.authorization_codes,
                            access_tokens = report.access_tokens,
                            refresh_tokens = report.refresh_tokens,
                            users = report.users,
                            "removed expired records"
                        );
                    }
                    Ok(_) => {}
                    Err(err) => tracing::error!(error = ?err, "cleaning expired records failed"),
                }
            }
        }
    }
}
