//! SQLite activity store
//!
//! Persists day and week activities in the tables created by
//! `DatabaseManager::migrate`. Identifiers, dates and timezones are stored as
//! text; the activities of a day and the days of a week as JSON.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use sqlx::query;
use std::time::Instant;
use tracing::{Instrument, Span};
use uuid::Uuid;

use super::connection::DatabaseManager;
use super::{ActivityStore, StoreError, StoreResult};
use crate::db_span;
use crate::logging::log_store_operation;
use crate::models::{Activity, DayActivity, WeekActivity};
use crate::services::timezone_service::TimezoneService;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, sqlx::FromRow)]
struct DayActivityRow {
    id: String,
    user_anonymized_id: String,
    goal_id: String,
    date: String,
    time_zone: String,
    activities: String,
}

#[derive(Debug, sqlx::FromRow)]
struct WeekActivityRow {
    id: String,
    user_anonymized_id: String,
    goal_id: String,
    week_start: String,
    time_zone: String,
    days: String,
}

fn parse_uuid(raw: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| StoreError::CorruptRecord(format!("invalid id {raw}: {e}")))
}

fn parse_date(raw: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| StoreError::CorruptRecord(format!("invalid date {raw}: {e}")))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn record_operation(span: &Span, operation: &str, table: &str, started: Instant, rows: u64) {
    span.record("rows_affected", rows);
    span.in_scope(|| {
        log_store_operation(operation, table, started.elapsed().as_millis() as u64, Some(rows));
    });
}

/// Activity store backed by SQLite
#[derive(Debug, Clone)]
pub struct SqliteActivityStore {
    database: DatabaseManager,
    timezone_service: TimezoneService,
}

impl SqliteActivityStore {
    pub fn new(database: DatabaseManager) -> Self {
        Self {
            database,
            timezone_service: TimezoneService::new(),
        }
    }

    fn parse_time_zone(&self, raw: &str) -> StoreResult<Tz> {
        self.timezone_service
            .parse_timezone(raw)
            .map_err(|e| StoreError::CorruptRecord(e.to_string()))
    }

    fn day_from_row(&self, row: DayActivityRow) -> StoreResult<DayActivity> {
        let activities: Vec<Activity> = serde_json::from_str(&row.activities)?;
        DayActivity::from_parts(
            parse_uuid(&row.id)?,
            parse_uuid(&row.user_anonymized_id)?,
            parse_uuid(&row.goal_id)?,
            parse_date(&row.date)?,
            self.parse_time_zone(&row.time_zone)?,
            &self.timezone_service,
            activities,
        )
        .map_err(|e| StoreError::CorruptRecord(e.to_string()))
    }

    fn week_from_row(&self, row: WeekActivityRow) -> StoreResult<WeekActivity> {
        let days: Vec<(NaiveDate, Uuid)> = serde_json::from_str(&row.days)?;
        Ok(WeekActivity::from_parts(
            parse_uuid(&row.id)?,
            parse_uuid(&row.user_anonymized_id)?,
            parse_uuid(&row.goal_id)?,
            parse_date(&row.week_start)?,
            self.parse_time_zone(&row.time_zone)?,
            days.into_iter().collect(),
        ))
    }
}

#[async_trait]
impl ActivityStore for SqliteActivityStore {
    async fn find_last_day_activity(
        &self,
        user_anonymized_id: Uuid,
        goal_id: Uuid,
    ) -> StoreResult<Option<DayActivity>> {
        let started = Instant::now();
        let span = db_span!("SELECT_LAST", "day_activities");
        let row = sqlx::query_as::<_, DayActivityRow>(
            r#"
            SELECT id, user_anonymized_id, goal_id, date, time_zone, activities
            FROM day_activities
            WHERE user_anonymized_id = ? AND goal_id = ?
            ORDER BY date DESC
            LIMIT 1
            "#,
        )
        .bind(user_anonymized_id.to_string())
        .bind(goal_id.to_string())
        .fetch_optional(&self.database.pool)
        .instrument(span.clone())
        .await?;

        record_operation(&span, "SELECT_LAST", "day_activities", started, u64::from(row.is_some()));
        row.map(|row| self.day_from_row(row)).transpose()
    }

    async fn find_day_activity(
        &self,
        user_anonymized_id: Uuid,
        goal_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Option<DayActivity>> {
        let started = Instant::now();
        let span = db_span!("SELECT", "day_activities");
        let row = sqlx::query_as::<_, DayActivityRow>(
            r#"
            SELECT id, user_anonymized_id, goal_id, date, time_zone, activities
            FROM day_activities
            WHERE user_anonymized_id = ? AND goal_id = ? AND date = ?
            "#,
        )
        .bind(user_anonymized_id.to_string())
        .bind(goal_id.to_string())
        .bind(format_date(date))
        .fetch_optional(&self.database.pool)
        .instrument(span.clone())
        .await?;

        record_operation(&span, "SELECT", "day_activities", started, u64::from(row.is_some()));
        row.map(|row| self.day_from_row(row)).transpose()
    }

    async fn save_day_activity(&self, day: &DayActivity) -> StoreResult<()> {
        let started = Instant::now();
        let span = db_span!("UPSERT", "day_activities");
        let activities = serde_json::to_string(day.activities())?;

        let result = query(
            r#"
            INSERT INTO day_activities
                (id, user_anonymized_id, goal_id, date, time_zone, activities, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_anonymized_id, goal_id, date)
            DO UPDATE SET
                id = excluded.id,
                activities = excluded.activities,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(day.id.to_string())
        .bind(day.user_anonymized_id.to_string())
        .bind(day.goal_id.to_string())
        .bind(format_date(day.date))
        .bind(day.time_zone.name())
        .bind(activities)
        .bind(Utc::now().timestamp())
        .execute(&self.database.pool)
        .instrument(span.clone())
        .await?;

        record_operation(&span, "UPSERT", "day_activities", started, result.rows_affected());
        Ok(())
    }

    async fn find_week_activity(
        &self,
        user_anonymized_id: Uuid,
        goal_id: Uuid,
        week_start: NaiveDate,
    ) -> StoreResult<Option<WeekActivity>> {
        let started = Instant::now();
        let span = db_span!("SELECT", "week_activities");
        let row = sqlx::query_as::<_, WeekActivityRow>(
            r#"
            SELECT id, user_anonymized_id, goal_id, week_start, time_zone, days
            FROM week_activities
            WHERE user_anonymized_id = ? AND goal_id = ? AND week_start = ?
            "#,
        )
        .bind(user_anonymized_id.to_string())
        .bind(goal_id.to_string())
        .bind(format_date(week_start))
        .fetch_optional(&self.database.pool)
        .instrument(span.clone())
        .await?;

        record_operation(&span, "SELECT", "week_activities", started, u64::from(row.is_some()));
        row.map(|row| self.week_from_row(row)).transpose()
    }

    async fn save_week_activity(&self, week: &WeekActivity) -> StoreResult<()> {
        let started = Instant::now();
        let span = db_span!("UPSERT", "week_activities");
        let days: Vec<(NaiveDate, Uuid)> =
            week.days().iter().map(|(date, id)| (*date, *id)).collect();
        let days = serde_json::to_string(&days)?;

        let result = query(
            r#"
            INSERT INTO week_activities
                (id, user_anonymized_id, goal_id, week_start, time_zone, days, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_anonymized_id, goal_id, week_start)
            DO UPDATE SET id = excluded.id, days = excluded.days, updated_at = excluded.updated_at
            "#,
        )
        .bind(week.id.to_string())
        .bind(week.user_anonymized_id.to_string())
        .bind(week.goal_id.to_string())
        .bind(format_date(week.week_start))
        .bind(week.time_zone.name())
        .bind(days)
        .bind(Utc::now().timestamp())
        .execute(&self.database.pool)
        .instrument(span.clone())
        .await?;

        record_operation(&span, "UPSERT", "week_activities", started, result.rows_affected());
        Ok(())
    }
}
