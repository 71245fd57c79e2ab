use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use time::{Duration, OffsetDateTime};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{ChangeEvent, ChangeKind, Store, StoreError, UniqueKey, CHANGE_FEED_CAPACITY};
use crate::cities::repo_types::CityVote;
use crate::contact::dto::ContactMessage;
use crate::waitlist::repo_types::{LeaderboardEntry, NewSignup, RecentSignup, Signup};

#[derive(Default)]
struct Tables {
    signups: Vec<Signup>,
    cities: Vec<CityVote>,
    contacts: Vec<ContactMessage>,
    last_created_at: Option<OffsetDateTime>,
}

/// Process-local store with the same constraints as the Postgres schema.
///
/// Timestamps are strictly increasing so insertion order is the total order
/// used for positions and recency.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    changes: broadcast::Sender<ChangeEvent>,
    calls: AtomicUsize,
    code_generator_down: bool,
    referral_updates_down: bool,
    lookups_down: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            tables: Mutex::new(Tables::default()),
            changes,
            calls: AtomicUsize::new(0),
            code_generator_down: false,
            referral_updates_down: false,
            lookups_down: false,
        }
    }

    /// `generate_referral_code` always errors.
    #[cfg(test)]
    pub fn without_code_generator(mut self) -> Self {
        self.code_generator_down = true;
        self
    }

    /// Referral count reads and writes always error.
    #[cfg(test)]
    pub fn with_failing_referral_updates(mut self) -> Self {
        self.referral_updates_down = true;
        self
    }

    /// Position counts and referrer lookups always error.
    #[cfg(test)]
    pub fn with_failing_lookups(mut self) -> Self {
        self.lookups_down = true;
        self
    }

    /// Number of store operations served so far.
    #[cfg(test)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn signup_by_email(&self, email: &str) -> Option<Signup> {
        self.lock()
            .ok()?
            .signups
            .iter()
            .find(|s| s.email == email)
            .cloned()
    }

    #[cfg(test)]
    pub fn contacts(&self) -> Vec<ContactMessage> {
        self.lock().map(|t| t.contacts.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tables
            .lock()
            .map_err(|_| StoreError::Other(anyhow::anyhow!("memory store poisoned")))
    }

    fn publish(&self, op: ChangeKind, record: Option<Signup>) {
        let _ = self.changes.send(ChangeEvent { op, record });
    }
}

fn unavailable(what: &str) -> StoreError {
    StoreError::Other(anyhow::anyhow!("{what} unavailable"))
}

fn random_code(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_signup(&self, new: NewSignup) -> Result<Signup, StoreError> {
        let signup = {
            let mut t = self.lock()?;
            if t.signups.iter().any(|s| s.email == new.email) {
                return Err(StoreError::UniqueViolation(UniqueKey::Email));
            }
            if t.signups.iter().any(|s| s.referral_code == new.referral_code) {
                return Err(StoreError::UniqueViolation(UniqueKey::ReferralCode));
            }
            if let Some(referrer) = new.referred_by {
                if !t.signups.iter().any(|s| s.id == referrer) {
                    return Err(StoreError::Other(anyhow::anyhow!(
                        "referred_by {referrer} does not exist"
                    )));
                }
            }

            let now = OffsetDateTime::now_utc();
            let created_at = match t.last_created_at {
                Some(last) if now <= last => last + Duration::microseconds(1),
                _ => now,
            };
            t.last_created_at = Some(created_at);

            let signup = Signup {
                id: Uuid::new_v4(),
                email: new.email,
                name: new.name,
                city: new.city,
                referral_code: new.referral_code,
                referred_by: new.referred_by,
                referral_count: 0,
                created_at,
            };
            t.signups.push(signup.clone());
            signup
        };
        self.publish(ChangeKind::Insert, Some(signup.clone()));
        Ok(signup)
    }

    async fn find_referrer(&self, code: &str) -> Result<Option<Uuid>, StoreError> {
        let t = self.lock()?;
        if self.lookups_down {
            return Err(unavailable("referrer lookup"));
        }
        Ok(t.signups
            .iter()
            .find(|s| s.referral_code == code)
            .map(|s| s.id))
    }

    async fn referral_count(&self, id: Uuid) -> Result<Option<i32>, StoreError> {
        let t = self.lock()?;
        if self.referral_updates_down {
            return Err(unavailable("referral count"));
        }
        Ok(t.signups
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.referral_count))
    }

    async fn set_referral_count(&self, id: Uuid, count: i32) -> Result<(), StoreError> {
        let updated = {
            let mut t = self.lock()?;
            if self.referral_updates_down {
                return Err(unavailable("referral count"));
            }
            t.signups.iter_mut().find(|s| s.id == id).map(|s| {
                s.referral_count = count;
                s.clone()
            })
        };
        if let Some(signup) = updated {
            self.publish(ChangeKind::Update, Some(signup));
        }
        Ok(())
    }

    async fn count_signups(&self) -> Result<i64, StoreError> {
        Ok(self.lock()?.signups.len() as i64)
    }

    async fn count_signups_up_to(&self, at: OffsetDateTime) -> Result<i64, StoreError> {
        let t = self.lock()?;
        if self.lookups_down {
            return Err(unavailable("signup count"));
        }
        Ok(t.signups.iter().filter(|s| s.created_at <= at).count() as i64)
    }

    async fn recent_signups(&self, limit: i64) -> Result<Vec<RecentSignup>, StoreError> {
        let t = self.lock()?;
        let mut rows: Vec<RecentSignup> = t.signups.iter().map(RecentSignup::from).collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn top_referrers(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let t = self.lock()?;
        let mut rows: Vec<&Signup> = t.signups.iter().filter(|s| s.referral_count > 0).collect();
        rows.sort_by(|a, b| {
            b.referral_count
                .cmp(&a.referral_count)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(rows
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|s| LeaderboardEntry {
                id: s.id,
                name: s.name.clone(),
                city: s.city.clone(),
                referral_count: s.referral_count,
            })
            .collect())
    }

    async fn generate_referral_code(&self) -> Result<String, StoreError> {
        let t = self.lock()?;
        if self.code_generator_down {
            return Err(unavailable("generate_referral_code"));
        }
        let taken: HashSet<&str> = t.signups.iter().map(|s| s.referral_code.as_str()).collect();
        loop {
            let code = random_code(8);
            if !taken.contains(code.as_str()) {
                return Ok(code);
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    async fn insert_contact(&self, msg: &ContactMessage) -> Result<(), StoreError> {
        self.lock()?.contacts.push(msg.clone());
        Ok(())
    }

    async fn seed_cities(&self, cities: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        for &(name, country) in cities {
            if t.cities.iter().any(|c| c.city_name == name) {
                continue;
            }
            t.cities.push(CityVote {
                id: Uuid::new_v4(),
                city_name: name.to_string(),
                country: country.to_string(),
                vote_count: 0,
            });
        }
        Ok(())
    }

    async fn list_cities(&self) -> Result<Vec<CityVote>, StoreError> {
        let mut rows = self.lock()?.cities.clone();
        rows.sort_by(|a, b| {
            b.vote_count
                .cmp(&a.vote_count)
                .then_with(|| a.city_name.cmp(&b.city_name))
        });
        Ok(rows)
    }

    async fn find_city(&self, city_name: &str) -> Result<Option<CityVote>, StoreError> {
        Ok(self
            .lock()?
            .cities
            .iter()
            .find(|c| c.city_name == city_name)
            .cloned())
    }

    async fn set_city_vote_count(&self, id: Uuid, count: i32) -> Result<(), StoreError> {
        if let Some(city) = self.lock()?.cities.iter_mut().find(|c| c.id == id) {
            city.vote_count = count;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_signup(email: &str, code: &str) -> NewSignup {
        NewSignup {
            email: email.into(),
            name: None,
            city: None,
            referral_code: code.into(),
            referred_by: None,
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email_and_code() {
        let store = MemoryStore::new();
        store.insert_signup(new_signup("a@x.com", "AAAA1111")).await.unwrap();

        let err = store
            .insert_signup(new_signup("a@x.com", "BBBB2222"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(UniqueKey::Email)));

        let err = store
            .insert_signup(new_signup("b@x.com", "AAAA1111"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(UniqueKey::ReferralCode)));

        assert_eq!(store.count_signups().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn timestamps_strictly_increase() {
        let store = MemoryStore::new();
        let mut last = None;
        for i in 0..20 {
            let s = store
                .insert_signup(new_signup(&format!("u{i}@x.com"), &format!("CODE{i:04}")))
                .await
                .unwrap();
            if let Some(prev) = last {
                assert!(s.created_at > prev);
            }
            last = Some(s.created_at);
        }
    }

    #[tokio::test]
    async fn insert_publishes_change_event() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();
        let s = store.insert_signup(new_signup("a@x.com", "AAAA1111")).await.unwrap();
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.op, ChangeKind::Insert);
        assert_eq!(ev.record.unwrap().id, s.id);
    }

    #[tokio::test]
    async fn generated_codes_are_uppercase_alphanumeric() {
        let store = MemoryStore::new();
        let code = store.generate_referral_code().await.unwrap();
        assert_eq!(code.len(), 8);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn seed_cities_is_insert_if_absent() {
        let store = MemoryStore::new();
        store.seed_cities(&[("Paris", "France")]).await.unwrap();
        let paris = store.find_city("Paris").await.unwrap().unwrap();
        store.set_city_vote_count(paris.id, 4).await.unwrap();

        store
            .seed_cities(&[("Paris", "France"), ("Tokyo", "Japan")])
            .await
            .unwrap();
        let cities = store.list_cities().await.unwrap();
        assert_eq!(cities.len(), 2);
        assert_eq!(cities[0].city_name, "Paris");
        assert_eq!(cities[0].vote_count, 4);
    }
}
