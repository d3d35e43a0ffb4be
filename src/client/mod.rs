//! 客户端访问游戏 API，并为前端提供可订阅的状态：
//! [`SessionStore`] 保存登录用户，[`QuestStore`] 保存地点、签到和进度。

mod http;
mod observable;
mod quest;
mod session;

use async_trait::async_trait;
use thiserror::Error;

use crate::geo::Coordinate;
use crate::models::{AuthResponse, CheckInResult, LeaderboardEntry, LocationView, User, UserProgress};
use crate::progress::Badge;

pub use http::HttpGameApi;
pub use observable::{Observable, SubscriptionId};
pub use quest::{CHECK_IN_FAILED, QuestState, QuestStore};
pub use session::{SessionState, SessionStore};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error {code}: {msg}")]
    Api { code: i32, msg: String },
    #[error("response carried no data")]
    EmptyResponse,
}

#[async_trait]
pub trait GameApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError>;

    async fn me(&self) -> Result<User, ClientError>;

    async fn fetch_locations(
        &self,
        position: Option<Coordinate>,
    ) -> Result<Vec<LocationView>, ClientError>;

    async fn check_in(
        &self,
        location_id: &str,
        coordinates: Coordinate,
    ) -> Result<CheckInResult, ClientError>;

    async fn fetch_user_stats(&self, user_id: &str) -> Result<UserProgress, ClientError>;

    async fn fetch_leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, ClientError>;

    async fn fetch_badges(&self) -> Result<Vec<Badge>, ClientError>;
}
