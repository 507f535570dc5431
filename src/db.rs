use crate::config::Config;
use crate::error::{Result, ScraperError};
use crate::storage::{Storage, UpsertOutcome};
use crate::types::{CrashRecord, Source};
use async_trait::async_trait;
use chrono::NaiveDate;
use libsql::{Builder, Connection, Database};
use tracing::info;

/// Turso/libSQL-backed crash store. The natural dedup key is the table's
/// primary key, so the upsert contract is enforced by the store itself.
pub struct LibsqlStorage {
    db: Database,
}

impl LibsqlStorage {
    /// Connect using the environment-derived configuration
    pub async fn from_env() -> Result<Self> {
        let url = Config::database_url().ok_or_else(|| ScraperError::Connection(
            "LIBSQL_URL environment variable not set".to_string(),
        ))?;
        Self::connect(url, Config::database_auth_token()).await
    }

    pub async fn connect(url: String, auth_token: String) -> Result<Self> {
        info!("Connecting to crash database at {}", url);

        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(|e| ScraperError::Connection(format!("Failed to connect to database: {e}")))?;

        Ok(Self { db })
    }

    async fn get_connection(&self) -> Result<Connection> {
        self.db
            .connect()
            .map_err(|e| ScraperError::Connection(format!("Failed to get database connection: {e}")))
    }

    /// Create the airplane_crashes table and its indexes
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        let conn = self.get_connection().await?;
        let migration_sql = include_str!("../migrations/001_create_airplane_crashes.sql");

        conn.execute_batch(migration_sql)
            .await
            .map_err(|e| ScraperError::Connection(format!("Failed to run migrations: {e}")))?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    fn record_from_row(row: &libsql::Row) -> Result<CrashRecord> {
        let get_text = |idx: i32| -> Result<String> {
            row.get::<String>(idx)
                .map_err(|e| ScraperError::Persistence(format!("Failed to read column {idx}: {e}")))
        };
        // NULL columns read as errors in libsql's typed getter; .ok() maps them to None
        let get_optional = |idx: i32| -> Option<String> { row.get::<String>(idx).ok() };

        let event_date =
            get_optional(0).and_then(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok());
        let fatalities = row
            .get::<i64>(7)
            .map_err(|e| ScraperError::Persistence(format!("Failed to read fatalities: {e}")))?;
        let source_label = get_text(10)?;
        let source = Source::from_label(&source_label).ok_or_else(|| {
            ScraperError::Persistence(format!("Unknown source label '{source_label}'"))
        })?;

        Ok(CrashRecord {
            event_date,
            location: get_text(1)?,
            operator: get_text(2)?,
            aircraft_type: get_optional(3),
            registration: get_optional(4),
            flight_number: get_optional(5),
            route: get_text(6)?,
            fatalities: fatalities.max(0) as u32,
            description: get_optional(8),
            source_url: get_text(9)?,
            source,
        })
    }
}

const RECORD_COLUMNS: &str = "event_date, location, operator, aircraft_type, registration, \
     flight_number, route, fatalities, description, source_url, source";

#[async_trait]
impl Storage for LibsqlStorage {
    async fn upsert_crash(&self, record: &CrashRecord) -> Result<UpsertOutcome> {
        let conn = self.get_connection().await?;

        // INSERT OR IGNORE against the dedup_key primary key; the affected row
        // count tells inserted apart from duplicate.
        let affected = conn
            .execute(
                "INSERT OR IGNORE INTO airplane_crashes (dedup_key, event_date, location, \
                 operator, aircraft_type, registration, flight_number, route, fatalities, \
                 description, source_url, source) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                libsql::params![
                    record.dedup_key(),
                    record
                        .event_date
                        .map(|d| d.format("%Y-%m-%d").to_string()),
                    record.location.clone(),
                    record.operator.clone(),
                    record.aircraft_type.clone(),
                    record.registration.clone(),
                    record.flight_number.clone(),
                    record.route.clone(),
                    record.fatalities as i64,
                    record.description.clone(),
                    record.source_url.clone(),
                    record.source.label(),
                ],
            )
            .await
            .map_err(|e| ScraperError::Persistence(format!("Failed to upsert crash: {e}")))?;

        if affected > 0 {
            Ok(UpsertOutcome::Inserted)
        } else {
            Ok(UpsertOutcome::DuplicateSkipped)
        }
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<CrashRecord>> {
        let conn = self.get_connection().await?;

        let mut rows = conn
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM airplane_crashes WHERE dedup_key = ?"),
                libsql::params![key],
            )
            .await
            .map_err(|e| ScraperError::Persistence(format!("Failed to query crash: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| ScraperError::Persistence(format!("Failed to read row: {e}")))?
        {
            Some(row) => Ok(Some(Self::record_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn count_crashes(&self) -> Result<usize> {
        let conn = self.get_connection().await?;

        let mut rows = conn
            .query("SELECT COUNT(*) FROM airplane_crashes", libsql::params![])
            .await
            .map_err(|e| ScraperError::Persistence(format!("Failed to count crashes: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| ScraperError::Persistence(format!("Failed to read row: {e}")))?
            .ok_or_else(|| ScraperError::Persistence("COUNT returned no row".to_string()))?;

        let count: i64 = row
            .get(0)
            .map_err(|e| ScraperError::Persistence(format!("Failed to read count: {e}")))?;
        Ok(count.max(0) as usize)
    }
}
