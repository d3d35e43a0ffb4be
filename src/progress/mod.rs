use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 等级曲线：floor(sqrt(points / 100)) + 1
pub fn level(points: i64) -> u32 {
    let hundreds = points.max(0) as u64 / 100;
    hundreds.isqrt() as u32 + 1
}

/// 升到下一级所需的累计积分
pub fn points_for_next_level(current_level: u32) -> i64 {
    let level = current_level as i64;
    level * level * 100
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCategory {
    Explorer,
    Master,
    Collector,
    Streak,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub requirement: String,
    pub category: BadgeCategory,
    pub unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// 徽章规则需要的统计数据
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BadgeContext {
    pub total_check_ins: usize,
    pub unique_locations: usize,
    pub total_locations: usize,
    pub longest_streak: u32,
    pub nature_visited: usize,
    pub nature_total: usize,
}

#[derive(Debug, Clone, Copy)]
enum BadgeRule {
    CheckIns(usize),
    UniqueLocations(usize),
    AllLocations,
    Streak(u32),
    AllNature,
}

impl BadgeRule {
    fn satisfied(self, ctx: &BadgeContext) -> bool {
        match self {
            BadgeRule::CheckIns(n) => ctx.total_check_ins >= n,
            BadgeRule::UniqueLocations(n) => ctx.unique_locations >= n,
            BadgeRule::AllLocations => {
                ctx.total_locations > 0 && ctx.unique_locations >= ctx.total_locations
            }
            BadgeRule::Streak(days) => ctx.longest_streak >= days,
            BadgeRule::AllNature => ctx.nature_total > 0 && ctx.nature_visited >= ctx.nature_total,
        }
    }
}

struct BadgeDef {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    requirement: &'static str,
    category: BadgeCategory,
    rule: BadgeRule,
}

const CATALOG: [BadgeDef; 6] = [
    BadgeDef {
        id: "badge-001",
        name: "First Step",
        description: "Made your first check-in",
        icon: "👣",
        requirement: "1 check-in",
        category: BadgeCategory::Explorer,
        rule: BadgeRule::CheckIns(1),
    },
    BadgeDef {
        id: "badge-002",
        name: "Explorer",
        description: "Visited 5 different places",
        icon: "🧭",
        requirement: "5 unique locations",
        category: BadgeCategory::Explorer,
        rule: BadgeRule::UniqueLocations(5),
    },
    BadgeDef {
        id: "badge-003",
        name: "Collector",
        description: "Visited 10 different places",
        icon: "🎯",
        requirement: "10 unique locations",
        category: BadgeCategory::Collector,
        rule: BadgeRule::UniqueLocations(10),
    },
    BadgeDef {
        id: "badge-004",
        name: "Treasure Master",
        description: "Visited every available place",
        icon: "👑",
        requirement: "All locations",
        category: BadgeCategory::Master,
        rule: BadgeRule::AllLocations,
    },
    BadgeDef {
        id: "badge-005",
        name: "Seven Day Streak",
        description: "Checked in on 7 consecutive days",
        icon: "🔥",
        requirement: "7 day streak",
        category: BadgeCategory::Streak,
        rule: BadgeRule::Streak(7),
    },
    BadgeDef {
        id: "badge-006",
        name: "Nature Lover",
        description: "Visited every nature spot",
        icon: "🌿",
        requirement: "All nature locations",
        category: BadgeCategory::Collector,
        rule: BadgeRule::AllNature,
    },
];

impl BadgeDef {
    fn to_badge(&self, unlocked_at: Option<DateTime<Utc>>) -> Badge {
        Badge {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            icon: self.icon.to_string(),
            requirement: self.requirement.to_string(),
            category: self.category,
            unlocked: unlocked_at.is_some(),
            unlocked_at,
        }
    }
}

/// 全部徽章（未解锁状态）
pub fn catalog() -> Vec<Badge> {
    CATALOG.iter().map(|def| def.to_badge(None)).collect()
}

pub fn badge(id: &str) -> Option<Badge> {
    CATALOG
        .iter()
        .find(|def| def.id == id)
        .map(|def| def.to_badge(None))
}

/// 满足 `ctx` 条件的所有徽章 id
pub fn earned_badge_ids(ctx: &BadgeContext) -> Vec<&'static str> {
    CATALOG
        .iter()
        .filter(|def| def.rule.satisfied(ctx))
        .map(|def| def.id)
        .collect()
}

/// 本次新解锁的徽章：满足条件且此前未解锁
pub fn newly_unlocked(
    ctx: &BadgeContext,
    already: &[String],
    at: DateTime<Utc>,
) -> Vec<Badge> {
    CATALOG
        .iter()
        .filter(|def| def.rule.satisfied(ctx) && !already.iter().any(|id| id == def.id))
        .map(|def| def.to_badge(Some(at)))
        .collect()
}

/// 徽章目录合并用户的解锁记录
pub fn with_unlocks(unlocks: &[(String, DateTime<Utc>)]) -> Vec<Badge> {
    CATALOG
        .iter()
        .map(|def| {
            let at = unlocks
                .iter()
                .find(|(id, _)| id == def.id)
                .map(|(_, at)| *at);
            def.to_badge(at)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streaks {
    pub current: u32,
    pub longest: u32,
}

/// 按 UTC 自然日统计连续签到天数
pub fn streaks<I>(timestamps: I, now: DateTime<Utc>) -> Streaks
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let days: BTreeSet<NaiveDate> = timestamps.into_iter().map(|t| t.date_naive()).collect();
    let Some(&last_day) = days.iter().next_back() else {
        return Streaks::default();
    };

    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in &days {
        run = match previous {
            Some(prev) if *day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }

    // 最后一天是今天或昨天时 run 仍然有效
    let today = now.date_naive();
    let current = if today - last_day <= Duration::days(1) {
        run
    } else {
        0
    };

    Streaks { current, longest }
}
