use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// One participant on the waitlist.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Signup {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub city: Option<String>,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    pub referral_count: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Insert payload; id and created_at are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewSignup {
    pub email: String,
    pub name: Option<String>,
    pub city: Option<String>,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
}

/// Public projection used by the recent signups feed. No email.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct RecentSignup {
    pub id: Uuid,
    pub name: Option<String>,
    pub city: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Signup> for RecentSignup {
    fn from(s: &Signup) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            city: s.city.clone(),
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub name: Option<String>,
    pub city: Option<String>,
    pub referral_count: i32,
}
