use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::geo::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Historical,
    Nature,
    Cultural,
    Hidden,
    Religious,
    Museum,
    Viewpoint,
    Market,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Historical => "historical",
            Category::Nature => "nature",
            Category::Cultural => "cultural",
            Category::Hidden => "hidden",
            Category::Religious => "religious",
            Category::Museum => "museum",
            Category::Viewpoint => "viewpoint",
            Category::Market => "market",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "historical" => Ok(Category::Historical),
            "nature" => Ok(Category::Nature),
            "cultural" => Ok(Category::Cultural),
            "hidden" => Ok(Category::Hidden),
            "religious" => Ok(Category::Religious),
            "museum" => Ok(Category::Museum),
            "viewpoint" => Ok(Category::Viewpoint),
            "market" => Ok(Category::Market),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub description: String,
    pub coordinates: Coordinate,
    pub points: i64,
    /// 签到半径（米）
    pub radius: f64,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// 针对当前请求用户
    #[serde(default)]
    pub checked_in: bool,
    #[serde(default)]
    pub checkin_count: i64,

    // AI 增强字段
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_refined_coordinates: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultural_context: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub historical_facts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visitor_tips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_enhanced_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_suggested_radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ai_update: Option<DateTime<Utc>>,
}

impl Location {
    /// 没有 AI 数据和签到记录的地点
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        coordinates: Coordinate,
        points: i64,
        radius: f64,
        category: Category,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            coordinates,
            points,
            radius,
            category,
            address: None,
            image_url: None,
            checked_in: false,
            checkin_count: 0,
            ai_refined_coordinates: None,
            confidence_score: None,
            cultural_context: None,
            historical_facts: Vec::new(),
            visitor_tips: Vec::new(),
            ai_enhanced_description: None,
            ai_suggested_radius: None,
            last_ai_update: None,
        }
    }

    pub fn needs_enhancement(&self, threshold: f64) -> bool {
        self.confidence_score.is_none_or(|score| score < threshold)
    }
}

/// 列表接口附带的距离
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationView {
    #[serde(flatten)]
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_label: Option<String>,
    #[serde(default)]
    pub can_check_in: bool,
}
