use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, FromRow, PgPool};

use super::{GameStore, Standing, StoreError, seed};
use crate::ai::LocationEnhancement;
use crate::geo::Coordinate;
use crate::models::{Category, CheckIn, Location, NewUser, User};

const LOCATION_COLUMNS: &str = r#"
    location_id, name, description, latitude, longitude, points, radius, category,
    address, image_url, checkin_count, ai_latitude, ai_longitude, confidence_score,
    cultural_context, historical_facts, visitor_tips, ai_enhanced_description,
    ai_suggested_radius, last_ai_update
"#;

const USER_COLUMNS: &str =
    "user_id, email, display_name, photo_url, points, password_hash, created_at";

#[derive(FromRow)]
struct LocationRow {
    location_id: String,
    name: String,
    description: String,
    latitude: f64,
    longitude: f64,
    points: i64,
    radius: f64,
    category: String,
    address: Option<String>,
    image_url: Option<String>,
    checkin_count: i64,
    ai_latitude: Option<f64>,
    ai_longitude: Option<f64>,
    confidence_score: Option<f64>,
    cultural_context: Option<String>,
    historical_facts: Vec<String>,
    visitor_tips: Vec<String>,
    ai_enhanced_description: Option<String>,
    ai_suggested_radius: Option<f64>,
    last_ai_update: Option<DateTime<Utc>>,
}

impl TryFrom<LocationRow> for Location {
    type Error = StoreError;

    fn try_from(row: LocationRow) -> Result<Self, Self::Error> {
        let category = row.category.parse::<Category>().map_err(StoreError::Corrupt)?;
        let ai_refined_coordinates = match (row.ai_latitude, row.ai_longitude) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
            _ => None,
        };
        Ok(Location {
            id: row.location_id,
            name: row.name,
            description: row.description,
            coordinates: Coordinate::new(row.latitude, row.longitude),
            points: row.points,
            radius: row.radius,
            category,
            address: row.address,
            image_url: row.image_url,
            checked_in: false,
            checkin_count: row.checkin_count,
            ai_refined_coordinates,
            confidence_score: row.confidence_score,
            cultural_context: row.cultural_context,
            historical_facts: row.historical_facts,
            visitor_tips: row.visitor_tips,
            ai_enhanced_description: row.ai_enhanced_description,
            ai_suggested_radius: row.ai_suggested_radius,
            last_ai_update: row.last_ai_update,
        })
    }
}

#[derive(FromRow)]
struct UserRow {
    user_id: String,
    email: String,
    display_name: String,
    photo_url: Option<String>,
    points: i64,
    password_hash: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            user_id: row.user_id,
            email: row.email,
            display_name: row.display_name,
            photo_url: row.photo_url,
            points: row.points,
            created_at: row.created_at,
            password_hash: row.password_hash,
        }
    }
}

#[derive(FromRow)]
struct CheckInRow {
    check_in_id: String,
    user_id: String,
    location_id: String,
    points: i64,
    latitude: f64,
    longitude: f64,
    created_at: DateTime<Utc>,
}

impl From<CheckInRow> for CheckIn {
    fn from(row: CheckInRow) -> Self {
        CheckIn {
            id: row.check_in_id,
            location_id: row.location_id,
            user_id: row.user_id,
            timestamp: row.created_at,
            points: row.points,
            coordinates: Coordinate::new(row.latitude, row.longitude),
        }
    }
}

#[derive(FromRow)]
struct StandingRow {
    user_id: String,
    display_name: String,
    photo_url: Option<String>,
    points: i64,
    total_check_ins: i64,
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 连接数据库、执行迁移并写入初始地点
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET application_name = 'capao_quest';").await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let store = Self::new(pool);
        store.seed_locations().await?;
        Ok(store)
    }

    async fn seed_locations(&self) -> Result<(), StoreError> {
        for location in seed::locations() {
            let inserted = sqlx::query(
                r#"
                INSERT INTO locations
                    (location_id, name, description, latitude, longitude, points, radius, category, address, image_url)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (location_id) DO NOTHING
                "#,
            )
            .bind(&location.id)
            .bind(&location.name)
            .bind(&location.description)
            .bind(location.coordinates.lat)
            .bind(location.coordinates.lng)
            .bind(location.points)
            .bind(location.radius)
            .bind(location.category.as_str())
            .bind(&location.address)
            .bind(&location.image_url)
            .execute(&self.pool)
            .await?;

            if inserted.rows_affected() > 0 {
                tracing::info!("Seeded location {}", location.id);
            }
        }
        Ok(())
    }

    async fn write_ai_fields(&self, location: &Location) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE locations
            SET ai_latitude = $2,
                ai_longitude = $3,
                confidence_score = $4,
                cultural_context = $5,
                historical_facts = $6,
                visitor_tips = $7,
                ai_enhanced_description = $8,
                ai_suggested_radius = $9,
                last_ai_update = $10,
                address = $11
            WHERE location_id = $1
            "#,
        )
        .bind(&location.id)
        .bind(location.ai_refined_coordinates.map(|c| c.lat))
        .bind(location.ai_refined_coordinates.map(|c| c.lng))
        .bind(location.confidence_score)
        .bind(&location.cultural_context)
        .bind(&location.historical_facts)
        .bind(&location.visitor_tips)
        .bind(&location.ai_enhanced_description)
        .bind(location.ai_suggested_radius)
        .bind(location.last_ai_update)
        .bind(&location.address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl GameStore for PgStore {
    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        let rows = sqlx::query_as::<_, LocationRow>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations ORDER BY created_at, location_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Location::try_from).collect()
    }

    async fn find_location(&self, location_id: &str) -> Result<Option<Location>, StoreError> {
        let row = sqlx::query_as::<_, LocationRow>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE location_id = $1"
        ))
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Location::try_from).transpose()
    }

    async fn save_enhancement(
        &self,
        location_id: &str,
        enhancement: &LocationEnhancement,
        at: DateTime<Utc>,
    ) -> Result<Option<Location>, StoreError> {
        let Some(mut location) = self.find_location(location_id).await? else {
            return Ok(None);
        };
        enhancement.apply_to(&mut location, at);
        self.write_ai_fields(&location).await?;
        Ok(Some(location))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let result = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (user_id, email, display_name, photo_url, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.user_id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.photo_url)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn record_check_in(&self, check_in: &CheckIn) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        // 唯一约束 (user_id, location_id) 保证每个地点只奖励一次
        let inserted = sqlx::query(
            r#"
            INSERT INTO check_ins
                (check_in_id, user_id, location_id, points, latitude, longitude, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, location_id) DO NOTHING
            "#,
        )
        .bind(&check_in.id)
        .bind(&check_in.user_id)
        .bind(&check_in.location_id)
        .bind(check_in.points)
        .bind(check_in.coordinates.lat)
        .bind(check_in.coordinates.lng)
        .bind(check_in.timestamp)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::AlreadyClaimed);
        }

        let updated = sqlx::query(
            "UPDATE locations SET checkin_count = checkin_count + 1 WHERE location_id = $1",
        )
        .bind(&check_in.location_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound("location"));
        }

        let points: Option<i64> = sqlx::query_scalar(
            "UPDATE users SET points = points + $1 WHERE user_id = $2 RETURNING points",
        )
        .bind(check_in.points)
        .bind(&check_in.user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let points = points.ok_or(StoreError::NotFound("user"))?;

        tx.commit().await?;
        Ok(points)
    }

    async fn check_ins_for_user(&self, user_id: &str) -> Result<Vec<CheckIn>, StoreError> {
        let rows = sqlx::query_as::<_, CheckInRow>(
            r#"
            SELECT check_in_id, user_id, location_id, points, latitude, longitude, created_at
            FROM check_ins
            WHERE user_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CheckIn::from).collect())
    }

    async fn unlocked_badges(
        &self,
        user_id: &str,
    ) -> Result<Vec<(String, DateTime<Utc>)>, StoreError> {
        let rows: Vec<(String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT badge_id, unlocked_at FROM user_badges WHERE user_id = $1 ORDER BY unlocked_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn unlock_badges(
        &self,
        user_id: &str,
        badge_ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if badge_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO user_badges (user_id, badge_id, unlocked_at)
            SELECT $1, badge_id, $3 FROM UNNEST($2::text[]) AS badge_id
            ON CONFLICT (user_id, badge_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(badge_ids)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn standings(&self, limit: usize) -> Result<Vec<Standing>, StoreError> {
        let rows = sqlx::query_as::<_, StandingRow>(
            r#"
            SELECT u.user_id, u.display_name, u.photo_url, u.points,
                   COUNT(c.check_in_id) AS total_check_ins
            FROM users u
            LEFT JOIN check_ins c ON c.user_id = u.user_id
            GROUP BY u.user_id
            ORDER BY u.points DESC, u.created_at ASC, u.user_id ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Standing {
                user_id: r.user_id,
                display_name: r.display_name,
                photo_url: r.photo_url,
                points: r.points,
                total_check_ins: r.total_check_ins,
            })
            .collect())
    }

    async fn rank_of(&self, user_id: &str) -> Result<Option<u32>, StoreError> {
        let points: Option<i64> = sqlx::query_scalar("SELECT points FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(points) = points else {
            return Ok(None);
        };

        let ahead: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE points > $1")
            .bind(points)
            .fetch_one(&self.pool)
            .await?;
        Ok(Some(ahead as u32 + 1))
    }
}
