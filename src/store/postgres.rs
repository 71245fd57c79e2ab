use anyhow::Context;
use async_trait::async_trait;
use sqlx::{
    postgres::{PgListener, PgPoolOptions},
    PgPool,
};
use time::OffsetDateTime;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ChangeEvent, Store, StoreError, CHANGE_FEED_CAPACITY};
use crate::cities::repo_types::CityVote;
use crate::contact::dto::ContactMessage;
use crate::waitlist::repo_types::{LeaderboardEntry, NewSignup, RecentSignup, Signup};

/// NOTIFY channel written by the `waitlist_signups_notify` trigger.
const CHANGE_CHANNEL: &str = "waitlist_changes";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
    changes: broadcast::Sender<ChangeEvent>,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self { db, changes })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }

    /// Relays trigger notifications into the broadcast channel until the
    /// listener connection gives up.
    pub async fn start_change_feed(&self) -> anyhow::Result<JoinHandle<()>> {
        let mut listener = PgListener::connect_with(&self.db)
            .await
            .context("connect change listener")?;
        listener
            .listen(CHANGE_CHANNEL)
            .await
            .context("LISTEN waitlist_changes")?;
        info!(channel = CHANGE_CHANNEL, "change feed listening");

        let tx = self.changes.clone();
        Ok(tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        match serde_json::from_str::<ChangeEvent>(notification.payload()) {
                            Ok(event) => {
                                debug!(op = event.op.as_str(), "change event");
                                // no receivers is fine
                                let _ = tx.send(event);
                            }
                            Err(e) => warn!(error = %e, "undecodable change notification"),
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "change feed lost; views fall back to polling");
                        break;
                    }
                }
            }
        }))
    }
}

const SIGNUP_COLUMNS: &str =
    "id, email, name, city, referral_code, referred_by, referral_count, created_at";

#[async_trait]
impl Store for PgStore {
    async fn insert_signup(&self, new: NewSignup) -> Result<Signup, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO waitlist_signups (email, name, city, referral_code, referred_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SIGNUP_COLUMNS}
            "#
        );
        let signup = sqlx::query_as::<_, Signup>(&sql)
            .bind(&new.email)
            .bind(&new.name)
            .bind(&new.city)
            .bind(&new.referral_code)
            .bind(new.referred_by)
            .fetch_one(&self.db)
            .await?;
        Ok(signup)
    }

    async fn find_referrer(&self, code: &str) -> Result<Option<Uuid>, StoreError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"SELECT id FROM waitlist_signups WHERE referral_code = $1"#,
        )
        .bind(code)
        .fetch_optional(&self.db)
        .await?;
        Ok(id)
    }

    async fn referral_count(&self, id: Uuid) -> Result<Option<i32>, StoreError> {
        let count = sqlx::query_scalar::<_, i32>(
            r#"SELECT referral_count FROM waitlist_signups WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(count)
    }

    async fn set_referral_count(&self, id: Uuid, count: i32) -> Result<(), StoreError> {
        sqlx::query(r#"UPDATE waitlist_signups SET referral_count = $2 WHERE id = $1"#)
            .bind(id)
            .bind(count)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn count_signups(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM waitlist_signups"#)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn count_signups_up_to(&self, at: OffsetDateTime) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM waitlist_signups WHERE created_at <= $1"#,
        )
        .bind(at)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    async fn recent_signups(&self, limit: i64) -> Result<Vec<RecentSignup>, StoreError> {
        let rows = sqlx::query_as::<_, RecentSignup>(
            r#"
            SELECT id, name, city, created_at
            FROM waitlist_signups
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn top_referrers(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let rows = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT id, name, city, referral_count
            FROM waitlist_signups
            WHERE referral_count > 0
            ORDER BY referral_count DESC, created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn generate_referral_code(&self) -> Result<String, StoreError> {
        let code = sqlx::query_scalar::<_, String>(r#"SELECT generate_referral_code()"#)
            .fetch_one(&self.db)
            .await?;
        Ok(code)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    async fn insert_contact(&self, msg: &ContactMessage) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO contact_submissions (name, email, subject, message)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&msg.name)
        .bind(&msg.email)
        .bind(&msg.subject)
        .bind(&msg.message)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn seed_cities(&self, cities: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;
        for &(name, country) in cities {
            sqlx::query(
                r#"
                INSERT INTO city_votes (city_name, country, vote_count)
                VALUES ($1, $2, 0)
                ON CONFLICT (city_name) DO NOTHING
                "#,
            )
            .bind(name)
            .bind(country)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_cities(&self) -> Result<Vec<CityVote>, StoreError> {
        let rows = sqlx::query_as::<_, CityVote>(
            r#"
            SELECT id, city_name, country, vote_count
            FROM city_votes
            ORDER BY vote_count DESC, city_name ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_city(&self, city_name: &str) -> Result<Option<CityVote>, StoreError> {
        let row = sqlx::query_as::<_, CityVote>(
            r#"SELECT id, city_name, country, vote_count FROM city_votes WHERE city_name = $1"#,
        )
        .bind(city_name)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn set_city_vote_count(&self, id: Uuid, count: i32) -> Result<(), StoreError> {
        sqlx::query(r#"UPDATE city_votes SET vote_count = $2 WHERE id = $1"#)
            .bind(id)
            .bind(count)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
