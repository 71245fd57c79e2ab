use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use super::View;
use crate::{
    store::{ChangeEvent, ChangeKind, Store},
    waitlist::dto::LiveCountResponse,
};

#[derive(Debug, Default)]
struct Counter {
    count: i64,
    growth: i64,
    growth_at: Option<Instant>,
}

impl Counter {
    /// Growth is only recorded against a previously non-zero count, so the
    /// first load never shows a jump.
    fn apply(&mut self, total: i64, now: Instant) {
        let growth = total - self.count;
        if growth > 0 && self.count > 0 {
            self.growth = growth;
            self.growth_at = Some(now);
        }
        self.count = total.max(0);
    }

    fn snapshot(&self, now: Instant, window: Duration) -> LiveCountResponse {
        let recent_growth = match self.growth_at {
            Some(at) if now.saturating_duration_since(at) < window => self.growth,
            _ => 0,
        };
        LiveCountResponse {
            count: self.count,
            recent_growth,
        }
    }
}

/// Total number of signups plus a short-lived growth delta.
pub struct LiveCount {
    store: Arc<dyn Store>,
    growth_window: Duration,
    state: RwLock<Counter>,
}

impl LiveCount {
    pub fn new(store: Arc<dyn Store>, growth_window: Duration) -> Self {
        Self {
            store,
            growth_window,
            state: RwLock::new(Counter::default()),
        }
    }

    pub async fn snapshot(&self) -> LiveCountResponse {
        self.state
            .read()
            .await
            .snapshot(Instant::now(), self.growth_window)
    }
}

#[async_trait]
impl View for LiveCount {
    fn name(&self) -> &'static str {
        "live_count"
    }

    async fn refresh(&self) {
        match self.store.count_signups().await {
            Ok(total) => self.state.write().await.apply(total, Instant::now()),
            Err(e) => warn!(error = %e, "live count refresh failed"),
        }
    }

    async fn on_change(&self, event: &ChangeEvent) {
        if event.op == ChangeKind::Insert {
            self.refresh().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::waitlist::repo_types::NewSignup;

    const WINDOW: Duration = Duration::from_secs(3);

    #[test]
    fn first_load_shows_no_growth() {
        let mut c = Counter::default();
        let now = Instant::now();
        c.apply(42, now);
        assert_eq!(
            c.snapshot(now, WINDOW),
            LiveCountResponse {
                count: 42,
                recent_growth: 0
            }
        );
    }

    #[test]
    fn growth_shows_then_clears_after_window() {
        let mut c = Counter::default();
        let t0 = Instant::now();
        c.apply(10, t0);
        c.apply(13, t0);
        assert_eq!(c.snapshot(t0 + Duration::from_secs(1), WINDOW).recent_growth, 3);
        assert_eq!(c.snapshot(t0 + WINDOW, WINDOW).recent_growth, 0);
        assert_eq!(c.snapshot(t0 + WINDOW, WINDOW).count, 13);
    }

    #[test]
    fn unchanged_or_smaller_totals_record_no_growth() {
        let mut c = Counter::default();
        let t0 = Instant::now();
        c.apply(10, t0);
        c.apply(10, t0);
        c.apply(9, t0);
        let snap = c.snapshot(t0, WINDOW);
        assert_eq!(snap.recent_growth, 0);
        assert_eq!(snap.count, 9);
    }

    #[tokio::test]
    async fn refresh_reflects_store_total() {
        let store = Arc::new(MemoryStore::new());
        let view = LiveCount::new(store.clone(), WINDOW);
        view.refresh().await;
        assert_eq!(view.snapshot().await.count, 0);

        for i in 0..3 {
            store
                .insert_signup(NewSignup {
                    email: format!("u{i}@x.com"),
                    name: None,
                    city: None,
                    referral_code: format!("CODE{i:04}"),
                    referred_by: None,
                })
                .await
                .unwrap();
        }
        view.on_change(&ChangeEvent {
            op: ChangeKind::Insert,
            record: None,
        })
        .await;
        assert_eq!(view.snapshot().await.count, 3);
    }
}
