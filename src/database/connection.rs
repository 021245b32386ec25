//! SQLite pool and schema
//!
//! Owns the connection pool shared by [`super::SqliteActivityStore`] and
//! creates the two aggregate tables on demand.

use anyhow::{Context, Result};
use sqlx::query;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA: [(&str, &str); 2] = [
    (
        "day_activities",
        r#"
        CREATE TABLE IF NOT EXISTS day_activities (
            id TEXT PRIMARY KEY,
            user_anonymized_id TEXT NOT NULL,
            goal_id TEXT NOT NULL,
            date TEXT NOT NULL,
            time_zone TEXT NOT NULL,
            activities TEXT NOT NULL DEFAULT '[]',
            updated_at INTEGER NOT NULL,
            UNIQUE (user_anonymized_id, goal_id, date)
        )
        "#,
    ),
    (
        "week_activities",
        r#"
        CREATE TABLE IF NOT EXISTS week_activities (
            id TEXT PRIMARY KEY,
            user_anonymized_id TEXT NOT NULL,
            goal_id TEXT NOT NULL,
            week_start TEXT NOT NULL,
            time_zone TEXT NOT NULL,
            days TEXT NOT NULL DEFAULT '[]',
            updated_at INTEGER NOT NULL,
            UNIQUE (user_anonymized_id, goal_id, week_start)
        )
        "#,
    ),
];

#[derive(Debug, Clone)]
pub struct DatabaseManager {
    pub pool: SqlitePool,
}

impl DatabaseManager {
    /// Opens (creating if needed) the database at `database_url`
    pub async fn new(database_url: &str) -> Result<Self> {
        info!(url = %database_url, "Opening activity database");

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL {database_url}"))?
            .create_if_missing(true);

        // every connection to :memory: would see its own empty database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Could not open database {database_url}"))?;

        Ok(Self { pool })
    }

    /// Private in-memory database with the schema in place
    pub async fn in_memory() -> Result<Self> {
        let manager = Self::new("sqlite::memory:").await?;
        manager.migrate().await?;
        Ok(manager)
    }

    /// Creates any missing aggregate tables; safe to run repeatedly
    pub async fn migrate(&self) -> Result<()> {
        for (table, ddl) in SCHEMA {
            query(ddl)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Creating table {table}"))?;
            debug!(table, "Table ready");
        }
        info!(tables = SCHEMA.len(), "Activity schema ready");
        Ok(())
    }

    pub fn pool_size(&self) -> u32 {
        self.pool.size()
    }

    /// Round trip to the database
    pub async fn ping(&self) -> Result<()> {
        query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }
}
