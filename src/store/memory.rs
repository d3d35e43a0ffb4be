use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use super::{GameStore, Standing, StoreError, seed};
use crate::ai::LocationEnhancement;
use crate::models::{CheckIn, Location, NewUser, User};

#[derive(Default)]
struct Inner {
    // 保持插入顺序
    locations: Vec<Location>,
    users: HashMap<String, User>,
    check_ins: Vec<CheckIn>,
    claims: HashSet<(String, String)>,
    badges: HashMap<String, Vec<(String, DateTime<Utc>)>>,
}

/// 进程内存储，一次签到的所有写入在同一把写锁内完成
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locations(locations: Vec<Location>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                locations,
                ..Inner::default()
            }),
        }
    }

    pub fn seeded() -> Self {
        Self::with_locations(seed::locations())
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        Ok(self.inner.read().await.locations.clone())
    }

    async fn find_location(&self, location_id: &str) -> Result<Option<Location>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.locations.iter().find(|l| l.id == location_id).cloned())
    }

    async fn save_enhancement(
        &self,
        location_id: &str,
        enhancement: &LocationEnhancement,
        at: DateTime<Utc>,
    ) -> Result<Option<Location>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(location) = inner.locations.iter_mut().find(|l| l.id == location_id) else {
            return Ok(None);
        };
        enhancement.apply_to(location, at);
        Ok(Some(location.clone()))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        let email_taken = inner
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email));
        if email_taken || inner.users.contains_key(&user.user_id) {
            return Err(StoreError::Conflict);
        }

        let created = User {
            user_id: user.user_id,
            email: user.email,
            display_name: user.display_name,
            photo_url: user.photo_url,
            points: 0,
            created_at: Utc::now(),
            password_hash: user.password_hash,
        };
        inner.users.insert(created.user_id.clone(), created.clone());
        Ok(created)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn record_check_in(&self, check_in: &CheckIn) -> Result<i64, StoreError> {
        let mut inner = self.inner.write().await;
        let key = (check_in.user_id.clone(), check_in.location_id.clone());
        if inner.claims.contains(&key) {
            return Err(StoreError::AlreadyClaimed);
        }
        if !inner.users.contains_key(&check_in.user_id) {
            return Err(StoreError::NotFound("user"));
        }

        let location = inner
            .locations
            .iter_mut()
            .find(|l| l.id == check_in.location_id)
            .ok_or(StoreError::NotFound("location"))?;
        location.checkin_count += 1;

        let user = inner
            .users
            .get_mut(&check_in.user_id)
            .ok_or(StoreError::NotFound("user"))?;
        user.points += check_in.points;
        let points = user.points;

        inner.claims.insert(key);
        inner.check_ins.push(check_in.clone());
        Ok(points)
    }

    async fn check_ins_for_user(&self, user_id: &str) -> Result<Vec<CheckIn>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .check_ins
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn unlocked_badges(
        &self,
        user_id: &str,
    ) -> Result<Vec<(String, DateTime<Utc>)>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.badges.get(user_id).cloned().unwrap_or_default())
    }

    async fn unlock_badges(
        &self,
        user_id: &str,
        badge_ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let unlocked = inner.badges.entry(user_id.to_string()).or_default();
        for id in badge_ids {
            if !unlocked.iter().any(|(existing, _)| existing == id) {
                unlocked.push((id.clone(), at));
            }
        }
        Ok(())
    }

    async fn standings(&self, limit: usize) -> Result<Vec<Standing>, StoreError> {
        let inner = self.inner.read().await;
        let mut users: Vec<&User> = inner.users.values().collect();
        users.sort_by(|a, b| {
            b.points
                .cmp(&a.points)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.user_id.cmp(&b.user_id))
        });

        Ok(users
            .into_iter()
            .take(limit)
            .map(|u| Standing {
                user_id: u.user_id.clone(),
                display_name: u.display_name.clone(),
                photo_url: u.photo_url.clone(),
                points: u.points,
                total_check_ins: inner
                    .check_ins
                    .iter()
                    .filter(|c| c.user_id == u.user_id)
                    .count() as i64,
            })
            .collect())
    }

    async fn rank_of(&self, user_id: &str) -> Result<Option<u32>, StoreError> {
        let inner = self.inner.read().await;
        let Some(user) = inner.users.get(user_id) else {
            return Ok(None);
        };
        let ahead = inner.users.values().filter(|u| u.points > user.points).count();
        Ok(Some(ahead as u32 + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;

    fn new_user(id: &str, email: &str) -> NewUser {
        NewUser {
            user_id: id.to_string(),
            email: email.to_string(),
            display_name: id.to_string(),
            photo_url: None,
            password_hash: None,
        }
    }

    fn check_in(user_id: &str, location_id: &str, points: i64) -> CheckIn {
        CheckIn {
            id: format!("{user_id}-{location_id}"),
            location_id: location_id.to_string(),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            points,
            coordinates: Coordinate::new(-14.0642, -41.3025),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let store = MemoryStore::seeded();
        store.create_user(new_user("u1", "ana@example.com")).await.unwrap();
        let err = store
            .create_user(new_user("u2", "ANA@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn claims_are_recorded_once() {
        let store = MemoryStore::seeded();
        store.create_user(new_user("u1", "a@example.com")).await.unwrap();

        let total = store.record_check_in(&check_in("u1", "loc-001", 50)).await.unwrap();
        assert_eq!(total, 50);

        let err = store
            .record_check_in(&check_in("u1", "loc-001", 50))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyClaimed));

        let location = store.find_location("loc-001").await.unwrap().unwrap();
        assert_eq!(location.checkin_count, 1);
        assert_eq!(store.check_ins_for_user("u1").await.unwrap().len(), 1);
        assert_eq!(store.find_user("u1").await.unwrap().unwrap().points, 50);
    }

    #[tokio::test]
    async fn unknown_location_leaves_no_trace() {
        let store = MemoryStore::seeded();
        store.create_user(new_user("u1", "a@example.com")).await.unwrap();
        let err = store
            .record_check_in(&check_in("u1", "nowhere", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("location")));
        assert_eq!(store.find_user("u1").await.unwrap().unwrap().points, 0);
        // 失败后仍可正常签到
        assert!(store.record_check_in(&check_in("u1", "loc-002", 100)).await.is_ok());
    }

    #[tokio::test]
    async fn standings_and_rank() {
        let store = MemoryStore::seeded();
        for (id, email) in [("u1", "1@x.io"), ("u2", "2@x.io"), ("u3", "3@x.io")] {
            store.create_user(new_user(id, email)).await.unwrap();
        }
        store.record_check_in(&check_in("u2", "loc-002", 100)).await.unwrap();
        store.record_check_in(&check_in("u3", "loc-001", 50)).await.unwrap();
        store.record_check_in(&check_in("u3", "loc-003", 75)).await.unwrap();

        let standings = store.standings(10).await.unwrap();
        let ids: Vec<_> = standings.iter().map(|s| s.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u3", "u2", "u1"]);
        assert_eq!(standings[0].total_check_ins, 2);

        assert_eq!(store.rank_of("u3").await.unwrap(), Some(1));
        assert_eq!(store.rank_of("u1").await.unwrap(), Some(3));
        assert_eq!(store.rank_of("ghost").await.unwrap(), None);
        assert_eq!(store.standings(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn badge_unlocks_are_idempotent() {
        let store = MemoryStore::new();
        let at = Utc::now();
        let ids = vec!["badge-001".to_string()];
        store.unlock_badges("u1", &ids, at).await.unwrap();
        store.unlock_badges("u1", &ids, at).await.unwrap();
        assert_eq!(store.unlocked_badges("u1").await.unwrap().len(), 1);
    }
}
