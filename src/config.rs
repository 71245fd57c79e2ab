use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct WaitlistConfig {
    pub recent_limit: i64,
    pub leaderboard_limit: i64,
    pub poll_interval_secs: u64,
    pub growth_window_secs: u64,
    pub fallback_code_len: usize,
}

impl Default for WaitlistConfig {
    fn default() -> Self {
        Self {
            recent_limit: 5,
            leaderboard_limit: 10,
            poll_interval_secs: 30,
            growth_window_secs: 3,
            fallback_code_len: 8,
        }
    }
}

impl WaitlistConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.recent_limit > 0, "WAITLIST_RECENT_LIMIT must be positive");
        anyhow::ensure!(
            self.leaderboard_limit > 0,
            "WAITLIST_LEADERBOARD_LIMIT must be positive"
        );
        anyhow::ensure!(self.poll_interval_secs > 0, "WAITLIST_POLL_SECS must be positive");
        anyhow::ensure!(self.fallback_code_len > 0, "WAITLIST_FALLBACK_CODE_LEN must be positive");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub waitlist: WaitlistConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let defaults = WaitlistConfig::default();
        let waitlist = WaitlistConfig {
            recent_limit: env_parse("WAITLIST_RECENT_LIMIT").unwrap_or(defaults.recent_limit),
            leaderboard_limit: env_parse("WAITLIST_LEADERBOARD_LIMIT")
                .unwrap_or(defaults.leaderboard_limit),
            poll_interval_secs: env_parse("WAITLIST_POLL_SECS")
                .unwrap_or(defaults.poll_interval_secs),
            growth_window_secs: env_parse("WAITLIST_GROWTH_WINDOW_SECS")
                .unwrap_or(defaults.growth_window_secs),
            fallback_code_len: env_parse("WAITLIST_FALLBACK_CODE_LEN")
                .unwrap_or(defaults.fallback_code_len),
        };
        waitlist.validate()?;
        Ok(Self {
            database_url,
            waitlist,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
