//! 基于 [`GameStore`] 的签到事务和玩家进度。

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::geo::{self, Coordinate, Eligibility};
use crate::models::{
    Category, CheckIn, CheckInAttempt, CheckInResult, LeaderboardEntry, Location, LocationView,
    Rejection, UserProgress,
};
use crate::progress::{self, Badge, BadgeContext};
use crate::store::{GameStore, StoreError};

type ClaimKey = (String, String);

/// 在释放前标记 (用户, 地点) 有请求正在处理
pub struct InFlight<'a> {
    set: &'a Mutex<HashSet<ClaimKey>>,
    key: ClaimKey,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.key);
    }
}

pub struct GameService {
    store: Arc<dyn GameStore>,
    in_flight: Mutex<HashSet<ClaimKey>>,
}

impl GameService {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self {
            store,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn GameStore> {
        &self.store
    }

    pub(crate) fn try_begin(&self, user_id: &str, location_id: &str) -> Option<InFlight<'_>> {
        let key = (user_id.to_string(), location_id.to_string());
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(key.clone()) {
            return None;
        }
        Some(InFlight {
            set: &self.in_flight,
            key,
        })
    }

    /// 所有地点，附带当前用户的签到状态和（可选）距离
    pub async fn locations_for(
        &self,
        user_id: &str,
        position: Option<Coordinate>,
    ) -> Result<Vec<LocationView>, StoreError> {
        let claimed: HashSet<String> = self
            .store
            .check_ins_for_user(user_id)
            .await?
            .into_iter()
            .map(|c| c.location_id)
            .collect();

        let locations = self.store.list_locations().await?;
        Ok(locations
            .into_iter()
            .map(|mut location| {
                location.checked_in = claimed.contains(&location.id);
                let eligibility = geo::eligibility(position, location.coordinates, location.radius);
                let distance = eligibility.distance();
                LocationView {
                    can_check_in: eligibility.is_eligible() && !location.checked_in,
                    distance_label: distance.map(geo::format_distance),
                    distance,
                    location,
                }
            })
            .collect())
    }

    pub async fn location_for(
        &self,
        user_id: &str,
        location_id: &str,
    ) -> Result<Option<Location>, StoreError> {
        let Some(mut location) = self.store.find_location(location_id).await? else {
            return Ok(None);
        };
        location.checked_in = self
            .store
            .check_ins_for_user(user_id)
            .await?
            .iter()
            .any(|c| c.location_id == location_id);
        Ok(Some(location))
    }

    pub async fn check_in(&self, attempt: CheckInAttempt) -> Result<CheckInResult, StoreError> {
        // 没有定位时不计算距离
        let Some(coordinates) = attempt.coordinates else {
            return Ok(CheckInResult::position_unavailable());
        };
        if let Err(e) = coordinates.validate() {
            return Ok(CheckInResult::rejected(
                Rejection::InvalidCoordinates,
                format!("Invalid coordinates: {e}"),
            ));
        }

        let Some(location) = self.store.find_location(&attempt.location_id).await? else {
            return Ok(CheckInResult::rejected(
                Rejection::LocationNotFound,
                "Location not found",
            ));
        };

        let Some(_in_flight) = self.try_begin(&attempt.user_id, &location.id) else {
            return Ok(CheckInResult::rejected(
                Rejection::InProgress,
                "A check-in for this location is already in progress",
            ));
        };

        let distance = match geo::eligibility(Some(coordinates), location.coordinates, location.radius) {
            Eligibility::InRange { distance } => distance,
            Eligibility::OutOfRange { distance } => {
                tracing::debug!(
                    "User {} is {:.1}m from {} (radius {}m)",
                    attempt.user_id,
                    distance,
                    location.id,
                    location.radius
                );
                return Ok(CheckInResult::too_far(&location, distance));
            }
            Eligibility::PositionUnavailable => {
                return Ok(CheckInResult::position_unavailable());
            }
        };

        let check_in = CheckIn {
            id: format!("checkin-{}", Uuid::new_v4()),
            location_id: location.id.clone(),
            user_id: attempt.user_id.clone(),
            timestamp: attempt.timestamp,
            points: location.points,
            coordinates,
        };

        // 账本唯一约束是最终裁决
        let total_points = match self.store.record_check_in(&check_in).await {
            Ok(points) => points,
            Err(StoreError::AlreadyClaimed) => {
                return Ok(CheckInResult::already_claimed(&location).with_distance(distance));
            }
            Err(e) => return Err(e),
        };

        let previous_level = progress::level(total_points - location.points);
        let current_level = progress::level(total_points);
        // 积分已入账，徽章失败不影响本次签到；下次签到会补发
        let new_badges = match self.unlock_new_badges(&attempt.user_id, attempt.timestamp).await {
            Ok(badges) => badges,
            Err(e) => {
                tracing::error!(
                    "Failed to unlock badges for user {} after check-in at {}: {}",
                    attempt.user_id,
                    location.id,
                    e
                );
                Vec::new()
            }
        };

        tracing::info!(
            "User {} checked in at {} for {} points",
            attempt.user_id,
            location.id,
            location.points
        );

        Ok(CheckInResult {
            success: true,
            check_in: Some(check_in),
            points: location.points,
            new_level: (current_level > previous_level).then_some(current_level),
            new_badges,
            message: format!(
                "Check-in at {} complete! +{} points",
                location.name, location.points
            ),
            rejection: None,
            distance: Some(distance),
        })
    }

    async fn badge_context(
        &self,
        check_ins: &[CheckIn],
        now: DateTime<Utc>,
    ) -> Result<(BadgeContext, progress::Streaks), StoreError> {
        let locations = self.store.list_locations().await?;
        let visited: HashSet<&str> = check_ins.iter().map(|c| c.location_id.as_str()).collect();
        let nature: Vec<&Location> = locations
            .iter()
            .filter(|l| l.category == Category::Nature)
            .collect();
        let streaks = progress::streaks(check_ins.iter().map(|c| c.timestamp), now);

        let ctx = BadgeContext {
            total_check_ins: check_ins.len(),
            unique_locations: visited.len(),
            total_locations: locations.len(),
            longest_streak: streaks.longest,
            nature_visited: nature
                .iter()
                .filter(|l| visited.contains(l.id.as_str()))
                .count(),
            nature_total: nature.len(),
        };
        Ok((ctx, streaks))
    }

    async fn unlock_new_badges(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<Badge>, StoreError> {
        let check_ins = self.store.check_ins_for_user(user_id).await?;
        let (ctx, _) = self.badge_context(&check_ins, at).await?;
        let already: Vec<String> = self
            .store
            .unlocked_badges(user_id)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let badges = progress::newly_unlocked(&ctx, &already, at);
        if !badges.is_empty() {
            let ids: Vec<String> = badges.iter().map(|b| b.id.clone()).collect();
            self.store.unlock_badges(user_id, &ids, at).await?;
            tracing::info!("User {} unlocked badges {:?}", user_id, ids);
        }
        Ok(badges)
    }

    pub async fn progress(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserProgress>, StoreError> {
        let Some(user) = self.store.find_user(user_id).await? else {
            return Ok(None);
        };
        let check_ins = self.store.check_ins_for_user(user_id).await?;
        let (ctx, streaks) = self.badge_context(&check_ins, now).await?;
        let unlocked = self.store.unlocked_badges(user_id).await?;
        let level = progress::level(user.points);

        Ok(Some(UserProgress {
            user_id: user.user_id,
            points: user.points,
            level,
            next_level_points: progress::points_for_next_level(level),
            total_check_ins: ctx.total_check_ins,
            unique_locations: ctx.unique_locations,
            badges: progress::with_unlocks(&unlocked)
                .into_iter()
                .filter(|b| b.unlocked)
                .collect(),
            current_streak: streaks.current,
            longest_streak: streaks.longest,
            rank: self.store.rank_of(user_id).await?,
        }))
    }

    /// 同分同名次
    pub async fn leaderboard(
        &self,
        limit: usize,
        current_user: Option<&str>,
    ) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let standings = self.store.standings(limit).await?;
        let mut entries = Vec::with_capacity(standings.len());
        let mut rank = 0;
        let mut previous_points = None;
        for (index, standing) in standings.into_iter().enumerate() {
            if previous_points != Some(standing.points) {
                rank = index as u32 + 1;
                previous_points = Some(standing.points);
            }
            entries.push(LeaderboardEntry {
                is_current_user: current_user == Some(standing.user_id.as_str()),
                level: progress::level(standing.points),
                user_id: standing.user_id,
                display_name: standing.display_name,
                photo_url: standing.photo_url,
                points: standing.points,
                rank,
                total_check_ins: standing.total_check_ins,
            });
        }
        Ok(entries)
    }

    pub async fn badges_for(&self, user_id: &str) -> Result<Vec<Badge>, StoreError> {
        let unlocked = self.store.unlocked_badges(user_id).await?;
        Ok(progress::with_unlocks(&unlocked))
    }

    pub async fn check_ins(&self, user_id: &str) -> Result<Vec<CheckIn>, StoreError> {
        self.store.check_ins_for_user(user_id).await
    }
}
