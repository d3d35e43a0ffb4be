use std::sync::Arc;

use super::{ClientError, GameApi, Observable, SubscriptionId};
use crate::geo::{self, Eligibility, PositionState};
use crate::models::{CheckIn, CheckInResult, LocationView, Rejection, UserProgress};

pub const CHECK_IN_FAILED: &str = "Could not complete the check-in. Please try again.";
const LOAD_LOCATIONS_FAILED: &str = "Could not load locations. Please try again.";
const LOAD_STATS_FAILED: &str = "Could not load your progress. Please try again.";

#[derive(Debug, Clone, Default)]
pub struct QuestState {
    pub locations: Vec<LocationView>,
    pub check_ins: Vec<CheckIn>,
    pub progress: Option<UserProgress>,
    pub loading: bool,
    pub error: Option<String>,
    pub check_in_loading: bool,
    pub check_in_error: Option<String>,
    pub last_response: Option<CheckInResult>,
}

/// 提交中的签到；被丢弃时清除 `check_in_loading`
struct Submission<'a> {
    state: &'a Observable<QuestState>,
    finished: bool,
}

impl<'a> Submission<'a> {
    fn begin(state: &'a Observable<QuestState>) -> Option<Self> {
        let started = state.update(|s| {
            if s.check_in_loading {
                return false;
            }
            s.check_in_loading = true;
            s.check_in_error = None;
            s.last_response = None;
            true
        });
        started.then_some(Self {
            state,
            finished: false,
        })
    }

    fn finish(mut self, f: impl FnOnce(&mut QuestState)) {
        self.finished = true;
        self.state.update(|s| {
            f(s);
            s.check_in_loading = false;
        });
    }
}

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.update(|s| s.check_in_loading = false);
        }
    }
}

/// 当前玩家的地点、签到记录和进度
pub struct QuestStore {
    api: Arc<dyn GameApi>,
    state: Observable<QuestState>,
}

fn user_message(e: &ClientError, fallback: &str) -> String {
    match e {
        ClientError::Api { msg, .. } => msg.clone(),
        _ => fallback.to_string(),
    }
}

impl QuestStore {
    pub fn new(api: Arc<dyn GameApi>) -> Self {
        Self {
            api,
            state: Observable::default(),
        }
    }

    pub fn snapshot(&self) -> QuestState {
        self.state.get()
    }

    pub fn subscribe(&self, listener: impl Fn(&QuestState) + Send + Sync + 'static) -> SubscriptionId {
        self.state.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.unsubscribe(id)
    }

    pub async fn fetch_locations(&self, position: &PositionState) {
        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });
        match self.api.fetch_locations(position.coordinates()).await {
            Ok(locations) => self.state.update(|s| {
                s.locations = locations;
                s.loading = false;
            }),
            Err(e) => {
                tracing::warn!("Failed to load locations: {}", e);
                self.state.update(|s| {
                    s.error = Some(user_message(&e, LOAD_LOCATIONS_FAILED));
                    s.loading = false;
                });
            }
        }
    }

    pub async fn fetch_user_stats(&self, user_id: &str) {
        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });
        match self.api.fetch_user_stats(user_id).await {
            Ok(progress) => self.state.update(|s| {
                s.progress = Some(progress);
                s.loading = false;
            }),
            Err(e) => {
                tracing::warn!("Failed to load stats for {}: {}", user_id, e);
                self.state.update(|s| {
                    s.error = Some(user_message(&e, LOAD_STATS_FAILED));
                    s.loading = false;
                });
            }
        }
    }

    /// 根据设备定位在某地点签到。
    ///
    /// 没有定位、已知地点超出范围或已签到、或另一次签到仍在提交时，
    /// 直接在本地拒绝，不请求服务端。
    pub async fn check_in(&self, location_id: &str, position: &PositionState) -> CheckInResult {
        let Some(coordinates) = position.coordinates() else {
            let result = match position {
                PositionState::Error(e) => {
                    CheckInResult::rejected(Rejection::PositionUnavailable, e.to_string())
                }
                _ => CheckInResult::position_unavailable(),
            };
            return self.finish_local(result);
        };

        let local = self.state.read(|s| -> Option<CheckInResult> {
            let view = s.locations.iter().find(|v| v.location.id == location_id)?;
            let location = &view.location;
            if location.checked_in {
                return Some(CheckInResult::already_claimed(location));
            }
            match geo::eligibility(Some(coordinates), location.coordinates, location.radius) {
                Eligibility::OutOfRange { distance } => {
                    Some(CheckInResult::too_far(location, distance))
                }
                _ => None,
            }
        });
        if let Some(result) = local {
            return self.finish_local(result);
        }

        let Some(submission) = Submission::begin(&self.state) else {
            return CheckInResult::rejected(
                Rejection::InProgress,
                "A check-in is already in progress",
            );
        };

        match self.api.check_in(location_id, coordinates).await {
            Ok(result) => {
                submission.finish(|s| {
                    if result.success {
                        apply_success(s, location_id, &result);
                    }
                    s.last_response = Some(result.clone());
                });
                result
            }
            Err(e) => {
                tracing::warn!("Check-in at {} failed: {}", location_id, e);
                submission.finish(|s| s.check_in_error = Some(CHECK_IN_FAILED.to_string()));
                CheckInResult {
                    success: false,
                    check_in: None,
                    points: 0,
                    new_level: None,
                    new_badges: Vec::new(),
                    message: CHECK_IN_FAILED.to_string(),
                    rejection: None,
                    distance: None,
                }
            }
        }
    }

    fn finish_local(&self, result: CheckInResult) -> CheckInResult {
        self.state.update(|s| s.last_response = Some(result.clone()));
        result
    }

    pub fn clear_error(&self) {
        self.state.update(|s| {
            s.error = None;
            s.check_in_error = None;
        });
    }

    pub fn clear_check_in_response(&self) {
        self.state.update(|s| s.last_response = None);
    }

    pub fn reset(&self) {
        self.state.set(QuestState::default());
    }
}

fn mark_checked_in(state: &mut QuestState, location_id: &str) {
    for view in state.locations.iter_mut() {
        if view.location.id == location_id && !view.location.checked_in {
            view.location.checked_in = true;
            view.location.checkin_count += 1;
            view.can_check_in = false;
        }
    }
}

fn apply_success(state: &mut QuestState, location_id: &str, result: &CheckInResult) {
    if let Some(check_in) = &result.check_in {
        state.check_ins.push(check_in.clone());
    }
    mark_checked_in(state, location_id);

    if let Some(progress) = state.progress.as_mut() {
        progress.points += result.points;
        if let Some(level) = result.new_level {
            progress.level = level;
            progress.next_level_points = crate::progress::points_for_next_level(level);
        }
        progress.total_check_ins += 1;
        progress.unique_locations += 1;
        for badge in &result.new_badges {
            if !progress.badges.iter().any(|b| b.id == badge.id) {
                progress.badges.push(badge.clone());
            }
        }
    }
}
