use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use super::View;
use crate::{
    store::{ChangeEvent, ChangeKind, Store},
    waitlist::repo_types::RecentSignup,
};

/// Newest signups first, at most `limit`.
pub struct RecentSignups {
    store: Arc<dyn Store>,
    limit: i64,
    items: RwLock<Vec<RecentSignup>>,
}

impl RecentSignups {
    pub fn new(store: Arc<dyn Store>, limit: i64) -> Self {
        Self {
            store,
            limit,
            items: RwLock::new(Vec::new()),
        }
    }

    pub async fn snapshot(&self) -> Vec<RecentSignup> {
        self.items.read().await.clone()
    }
}

/// Inserts `signup` keeping newest-first order, skips ids already present,
/// then truncates to `limit`.
fn merge(items: &mut Vec<RecentSignup>, signup: RecentSignup, limit: usize) {
    if items.iter().any(|s| s.id == signup.id) {
        return;
    }
    let at = items
        .iter()
        .position(|s| s.created_at < signup.created_at)
        .unwrap_or(items.len());
    items.insert(at, signup);
    items.truncate(limit);
}

#[async_trait]
impl View for RecentSignups {
    fn name(&self) -> &'static str {
        "recent_signups"
    }

    async fn refresh(&self) {
        match self.store.recent_signups(self.limit).await {
            Ok(rows) => *self.items.write().await = rows,
            Err(e) => warn!(error = %e, "recent signups refresh failed"),
        }
    }

    async fn on_change(&self, event: &ChangeEvent) {
        if event.op != ChangeKind::Insert {
            return;
        }
        if let Some(record) = &event.record {
            let mut items = self.items.write().await;
            merge(&mut items, RecentSignup::from(record), self.limit.max(0) as usize);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::waitlist::repo_types::NewSignup;
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    fn entry(secs: i64) -> RecentSignup {
        RecentSignup {
            id: Uuid::new_v4(),
            name: None,
            city: None,
            created_at: OffsetDateTime::UNIX_EPOCH + Duration::seconds(secs),
        }
    }

    #[test]
    fn merge_prepends_and_truncates() {
        let mut items = vec![entry(3), entry(2), entry(1)];
        let newest = entry(4);
        merge(&mut items, newest.clone(), 3);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], newest);
        assert_eq!(items[2].created_at, entry(2).created_at);
    }

    #[test]
    fn merge_is_idempotent_and_keeps_order() {
        let mut items = vec![entry(5), entry(1)];
        let late = entry(3);
        merge(&mut items, late.clone(), 5);
        merge(&mut items, late.clone(), 5);
        assert_eq!(items.len(), 3);
        assert_eq!(items[1], late);
        assert!(items.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn insert_events_update_without_refetch() {
        let store = Arc::new(MemoryStore::new());
        let view = RecentSignups::new(store.clone(), 2);
        let mut rx = store.subscribe();

        for i in 0..3 {
            store
                .insert_signup(NewSignup {
                    email: format!("u{i}@x.com"),
                    name: Some(format!("user {i}")),
                    city: None,
                    referral_code: format!("CODE{i:04}"),
                    referred_by: None,
                })
                .await
                .unwrap();
            let event = rx.recv().await.unwrap();
            view.on_change(&event).await;
        }

        let items = view.snapshot().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name.as_deref(), Some("user 2"));
        assert_eq!(items[1].name.as_deref(), Some("user 1"));

        view.refresh().await;
        assert_eq!(view.snapshot().await, items);
    }
}
