//! 地点、玩家和签到账本的数据访问。
//!
//! [`GameStore`] 有两个实现：[`MemoryStore`]（内置演示数据，未配置数据库时
//! 和测试中使用）以及 [`PgStore`]。

mod memory;
mod postgres;
pub mod seed;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ai::LocationEnhancement;
use crate::models::{CheckIn, Location, NewUser, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("location already claimed by this user")]
    AlreadyClaimed,
    #[error("email already registered")]
    Conflict,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// 排行榜原始数据，按积分降序
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub user_id: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub points: i64,
    pub total_check_ins: i64,
}

#[async_trait]
pub trait GameStore: Send + Sync {
    async fn list_locations(&self) -> Result<Vec<Location>, StoreError>;

    async fn find_location(&self, location_id: &str) -> Result<Option<Location>, StoreError>;

    /// 写入地点的 AI 字段并返回更新后的记录
    async fn save_enhancement(
        &self,
        location_id: &str,
        enhancement: &LocationEnhancement,
        at: DateTime<Utc>,
    ) -> Result<Option<Location>, StoreError>;

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// 原子地记录一次签到：账本、地点计数和用户积分。
    /// (用户, 地点) 已存在时返回 [`StoreError::AlreadyClaimed`]，否则返回用户新的总积分。
    async fn record_check_in(&self, check_in: &CheckIn) -> Result<i64, StoreError>;

    async fn check_ins_for_user(&self, user_id: &str) -> Result<Vec<CheckIn>, StoreError>;

    async fn unlocked_badges(
        &self,
        user_id: &str,
    ) -> Result<Vec<(String, DateTime<Utc>)>, StoreError>;

    async fn unlock_badges(
        &self,
        user_id: &str,
        badge_ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn standings(&self, limit: usize) -> Result<Vec<Standing>, StoreError>;

    /// 名次 = 积分严格更高的玩家数 + 1
    async fn rank_of(&self, user_id: &str) -> Result<Option<u32>, StoreError>;
}
