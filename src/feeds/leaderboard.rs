use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use super::View;
use crate::{
    store::{ChangeEvent, Store},
    waitlist::repo_types::LeaderboardEntry,
};

/// Top referrers. Reloaded in full on every change.
pub struct Leaderboard {
    store: Arc<dyn Store>,
    limit: i64,
    entries: RwLock<Vec<LeaderboardEntry>>,
}

impl Leaderboard {
    pub fn new(store: Arc<dyn Store>, limit: i64) -> Self {
        Self {
            store,
            limit,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub async fn snapshot(&self) -> Vec<LeaderboardEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl View for Leaderboard {
    fn name(&self) -> &'static str {
        "leaderboard"
    }

    async fn refresh(&self) {
        match self.store.top_referrers(self.limit).await {
            Ok(rows) => *self.entries.write().await = rows,
            Err(e) => warn!(error = %e, "leaderboard refresh failed"),
        }
    }

    async fn on_change(&self, _event: &ChangeEvent) {
        self.refresh().await;
    }
}
