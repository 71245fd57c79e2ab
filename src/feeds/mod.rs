//! Read models over `waitlist_signups` that stay fresh from mount, an
//! optional poll and the store's change feed.

pub mod leaderboard;
pub mod live_count;
pub mod recent;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::store::ChangeEvent;

pub use leaderboard::Leaderboard;
pub use live_count::LiveCount;
pub use recent::RecentSignups;

#[async_trait]
pub trait View: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    /// Full reload from the store. Failures keep the previous state.
    async fn refresh(&self);
    async fn on_change(&self, event: &ChangeEvent);
}

/// Keeps a view's refresh task alive. Dropping the handle stops it.
pub struct ViewHandle {
    name: &'static str,
    task: JoinHandle<()>,
}

impl ViewHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(self) {}
}

impl Drop for ViewHandle {
    fn drop(&mut self) {
        self.task.abort();
        debug!(view = self.name, "view stopped");
    }
}

/// Loads `view` once, then refreshes it on every `poll` tick and on every
/// change event. A zero `poll` period means no polling. When the change feed
/// closes the view keeps polling; with no poll it stays at its last state.
pub fn start<V: View>(
    view: Arc<V>,
    mut changes: broadcast::Receiver<ChangeEvent>,
    poll: Option<Duration>,
) -> ViewHandle {
    let name = view.name();
    let task = tokio::spawn(async move {
        view.refresh().await;
        info!(view = name, poll_secs = ?poll.map(|p| p.as_secs()), "view mounted");

        let mut ticker = poll.filter(|p| !p.is_zero()).map(|period| {
            let mut i = interval_at(Instant::now() + period, period);
            i.set_missed_tick_behavior(MissedTickBehavior::Skip);
            i
        });
        let mut feed_open = true;

        loop {
            tokio::select! {
                _ = tick(&mut ticker) => view.refresh().await,
                res = changes.recv(), if feed_open => match res {
                    Ok(event) => view.on_change(&event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(view = name, skipped, "change feed lagged; reloading");
                        view.refresh().await;
                    }
                    Err(RecvError::Closed) => {
                        warn!(view = name, "change feed closed; relying on polling");
                        feed_open = false;
                    }
                },
            }
            if !feed_open && ticker.is_none() {
                break;
            }
        }
    });
    ViewHandle { name, task }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(i) => {
            i.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::store::ChangeKind;

    #[derive(Default)]
    struct Recorder {
        refreshes: AtomicUsize,
        changes: AtomicUsize,
    }

    #[async_trait]
    impl View for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }
        async fn refresh(&self) {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_change(&self, _event: &ChangeEvent) {
            self.changes.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn mounts_then_reacts_to_changes() {
        let (tx, rx) = broadcast::channel(8);
        let recorder = Arc::new(Recorder::default());
        let handle = start(recorder.clone(), rx, None);
        settle().await;
        assert_eq!(recorder.refreshes.load(Ordering::SeqCst), 1);

        tx.send(ChangeEvent {
            op: ChangeKind::Delete,
            record: None,
        })
        .unwrap();
        settle().await;
        assert_eq!(recorder.changes.load(Ordering::SeqCst), 1);
        assert!(handle.is_running());
    }

    #[tokio::test]
    async fn closed_feed_without_poll_ends_the_task() {
        let (tx, rx) = broadcast::channel(8);
        let recorder = Arc::new(Recorder::default());
        let handle = start(recorder.clone(), rx, None);
        drop(tx);
        settle().await;
        assert!(!handle.is_running());
        assert_eq!(recorder.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closed_feed_keeps_polling() {
        let (tx, rx) = broadcast::channel(8);
        drop(tx);
        let recorder = Arc::new(Recorder::default());
        let handle = start(recorder.clone(), rx, Some(Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(handle.is_running());
        assert!(recorder.refreshes.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn zero_poll_period_mounts_without_polling() {
        let (_tx, rx) = broadcast::channel(8);
        let recorder = Arc::new(Recorder::default());
        let handle = start(recorder.clone(), rx, Some(Duration::ZERO));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_running());
        assert_eq!(recorder.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_refreshes() {
        let (_tx, rx) = broadcast::channel(8);
        let recorder = Arc::new(Recorder::default());
        let handle = start(recorder.clone(), rx, Some(Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(35)).await;
        handle.stop();
        settle().await;
        let after_stop = recorder.refreshes.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.refreshes.load(Ordering::SeqCst), after_stop);
    }
}
