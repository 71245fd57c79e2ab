use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::cities::repo_types::LAUNCH_CITIES;
use crate::config::{AppConfig, WaitlistConfig};
use crate::feeds::{self, Leaderboard, LiveCount, RecentSignups, ViewHandle};
use crate::store::{MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub live_count: Arc<LiveCount>,
    pub recent: Arc<RecentSignups>,
    pub leaderboard: Arc<Leaderboard>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                let pg = PgStore::connect(url).await?;
                // Migrations are optional when the schema is managed elsewhere
                if let Err(e) = pg.migrate().await {
                    warn!(error = %e, "migration failed; continuing");
                }
                if let Err(e) = pg.start_change_feed().await {
                    warn!(error = %e, "change feed unavailable; views will poll");
                }
                Arc::new(pg)
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        if let Err(e) = store.seed_cities(LAUNCH_CITIES).await {
            warn!(error = %e, "seeding launch cities failed");
        }

        Ok(Self::from_parts(config, store))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn Store>) -> Self {
        let w = &config.waitlist;
        Self {
            live_count: Arc::new(LiveCount::new(
                store.clone(),
                Duration::from_secs(w.growth_window_secs),
            )),
            recent: Arc::new(RecentSignups::new(store.clone(), w.recent_limit)),
            leaderboard: Arc::new(Leaderboard::new(store.clone(), w.leaderboard_limit)),
            config,
            store,
        }
    }

    /// Mounts the read models. They run until the handles are dropped.
    pub fn start_views(&self) -> Vec<ViewHandle> {
        let poll = Duration::from_secs(self.config.waitlist.poll_interval_secs);
        let handles = vec![
            feeds::start(self.live_count.clone(), self.store.subscribe(), Some(poll)),
            feeds::start(self.recent.clone(), self.store.subscribe(), None),
            feeds::start(self.leaderboard.clone(), self.store.subscribe(), None),
        ];
        info!(views = handles.len(), "read models started");
        handles
    }

    /// In-memory state with default settings, for tests.
    pub fn fake() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn Store>) -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            waitlist: WaitlistConfig::default(),
        });
        Self::from_parts(config, store)
    }
}
