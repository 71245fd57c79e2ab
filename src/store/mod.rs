//! Query interface over the hosted tables (`waitlist_signups`, `city_votes`,
//! `contact_submissions`). Postgres in production, in-memory for local runs
//! and tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::cities::repo_types::CityVote;
use crate::contact::dto::ContactMessage;
use crate::waitlist::repo_types::{LeaderboardEntry, NewSignup, RecentSignup, Signup};

/// Capacity of the change-event fan-out channel.
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// Unique constraint that rejected a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniqueKey {
    Email,
    ReferralCode,
    CityName,
    Other(String),
}

impl UniqueKey {
    pub fn from_constraint(name: Option<&str>) -> Self {
        match name {
            Some("waitlist_signups_email_key") => UniqueKey::Email,
            Some("waitlist_signups_referral_code_key") => UniqueKey::ReferralCode,
            Some("city_votes_city_name_key") => UniqueKey::CityName,
            other => UniqueKey::Other(other.unwrap_or("unknown").to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0:?}")]
    UniqueViolation(UniqueKey),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::UniqueViolation(UniqueKey::from_constraint(db.constraint()));
            }
        }
        StoreError::Other(anyhow::Error::new(e))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

/// Row-level change on `waitlist_signups`. `record` is absent for deletes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeEvent {
    pub op: ChangeKind,
    pub record: Option<Signup>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_signup(&self, new: NewSignup) -> Result<Signup, StoreError>;
    /// Id of the signup owning `code`, if any.
    async fn find_referrer(&self, code: &str) -> Result<Option<Uuid>, StoreError>;
    async fn referral_count(&self, id: Uuid) -> Result<Option<i32>, StoreError>;
    async fn set_referral_count(&self, id: Uuid, count: i32) -> Result<(), StoreError>;
    async fn count_signups(&self) -> Result<i64, StoreError>;
    /// Signups created at or before `at`.
    async fn count_signups_up_to(&self, at: OffsetDateTime) -> Result<i64, StoreError>;
    async fn recent_signups(&self, limit: i64) -> Result<Vec<RecentSignup>, StoreError>;
    async fn top_referrers(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, StoreError>;
    /// Server-side generator; the returned code is not assigned to any signup.
    async fn generate_referral_code(&self) -> Result<String, StoreError>;
    /// Push notifications for `waitlist_signups`. Events may be dropped or
    /// never arrive; consumers treat them as refresh hints.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    async fn insert_contact(&self, msg: &ContactMessage) -> Result<(), StoreError>;

    /// Insert-if-absent by city name.
    async fn seed_cities(&self, cities: &[(&str, &str)]) -> Result<(), StoreError>;
    async fn list_cities(&self) -> Result<Vec<CityVote>, StoreError>;
    async fn find_city(&self, city_name: &str) -> Result<Option<CityVote>, StoreError>;
    async fn set_city_vote_count(&self, id: Uuid, count: i32) -> Result<(), StoreError>;
}
