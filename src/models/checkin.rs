use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{self, Coordinate};
use crate::models::Location;
use crate::progress::Badge;

/// 签到账本中的一条记录，(user_id, location_id) 唯一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: String,
    pub location_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub points: i64,
    pub coordinates: Coordinate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckInAttempt {
    pub user_id: String,
    pub location_id: String,
    /// None 表示设备尚未定位
    pub coordinates: Option<Coordinate>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    PositionUnavailable,
    InvalidCoordinates,
    LocationNotFound,
    InProgress,
    TooFar,
    AlreadyClaimed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<CheckIn>,
    pub points: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_level: Option<u32>,
    #[serde(default)]
    pub new_badges: Vec<Badge>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    /// 用户到地点的距离（米）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl CheckInResult {
    pub fn rejected(rejection: Rejection, message: impl Into<String>) -> Self {
        Self {
            success: false,
            check_in: None,
            points: 0,
            new_level: None,
            new_badges: Vec::new(),
            message: message.into(),
            rejection: Some(rejection),
            distance: None,
        }
    }

    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }

    pub fn position_unavailable() -> Self {
        Self::rejected(
            Rejection::PositionUnavailable,
            "Your position is unavailable. Enable location services to check in.",
        )
    }

    pub fn too_far(location: &Location, distance: f64) -> Self {
        Self::rejected(
            Rejection::TooFar,
            format!(
                "Too far: you need to be within {}m of {} (you are {} away)",
                location.radius,
                location.name,
                geo::format_distance(distance)
            ),
        )
        .with_distance(distance)
    }

    pub fn already_claimed(location: &Location) -> Self {
        Self::rejected(
            Rejection::AlreadyClaimed,
            format!("You have already checked in at {}", location.name),
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckInRequest {
    pub location_id: String,
    #[serde(default)]
    pub coordinates: Option<Coordinate>,
}
