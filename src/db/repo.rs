use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement, Value};
use tracing::{debug, info};

use super::record::SubmissionRecord;
use crate::report::{AnswerPolicy, InsertOutcome, SightingStore};
use crate::utils::time::relative_time;

const TIMESTAMP: &str = "timestamp";

/// Table and column names come from validated configuration and are the only
/// text spliced into statements; every value is bound.
fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

fn now_ts() -> i64 {
    Utc::now().timestamp()
}

pub struct Repo {
    db: DatabaseConnection,
    table: String,
    fields: Vec<String>,
    policy: AnswerPolicy,
    recent_window_sec: i64,
}

impl Repo {
    pub fn new(
        db: DatabaseConnection,
        table: impl Into<String>,
        fields: Vec<String>,
        policy: AnswerPolicy,
        recent_window_sec: i64,
    ) -> Self {
        Self {
            db,
            table: table.into(),
            fields,
            policy,
            recent_window_sec,
        }
    }

    pub async fn ping(&self) -> Result<()> {
        self.db.ping().await.context("Database ping failed")
    }

    fn statement(&self, sql: String, values: Vec<Value>) -> Statement {
        Statement::from_sql_and_values(self.db.get_database_backend(), sql, values)
    }

    fn column_list(&self) -> String {
        std::iter::once(TIMESTAMP)
            .chain(self.fields.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ==================== Schema ====================

    /// Create the table and its timestamp index if they do not exist yet
    pub async fn create_table(&self) -> Result<()> {
        let columns = std::iter::once(format!("{} INTEGER NOT NULL", quote(TIMESTAMP)))
            .chain(
                self.fields
                    .iter()
                    .map(|field| format!("{} TEXT NOT NULL", quote(field))),
            )
            .collect::<Vec<_>>()
            .join(", ");

        let create_table = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(&self.table),
            columns
        );
        self.db
            .execute(Statement::from_string(
                self.db.get_database_backend(),
                create_table,
            ))
            .await
            .with_context(|| format!("Failed to create table {}", self.table))?;

        let create_index = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote(&format!("idx_{}_{}", self.table, TIMESTAMP)),
            quote(&self.table),
            quote(TIMESTAMP)
        );
        self.db
            .execute(Statement::from_string(
                self.db.get_database_backend(),
                create_index,
            ))
            .await
            .context("Failed to create timestamp index")?;

        info!(
            "Table {} ready with fields: {}",
            self.table,
            self.fields.join(", ")
        );
        Ok(())
    }

    // ==================== Records ====================

    /// Validate and store a record stamped with the current time
    pub async fn insert(&self, fields: &[String]) -> Result<InsertOutcome> {
        self.insert_at(fields, now_ts()).await
    }

    /// Validate and store a record with an explicit timestamp
    pub async fn insert_at(&self, fields: &[String], timestamp: i64) -> Result<InsertOutcome> {
        let violations = self.policy.validate_record(&self.fields, fields);
        if !violations.is_empty() {
            debug!("Refusing to store record: {:?}", violations);
            return Ok(InsertOutcome::Rejected(violations));
        }

        let placeholders = vec!["?"; self.fields.len() + 1].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(&self.table),
            self.column_list(),
            placeholders
        );

        let mut values: Vec<Value> = Vec::with_capacity(fields.len() + 1);
        values.push(timestamp.into());
        values.extend(fields.iter().map(|field| Value::from(field.clone())));

        self.db
            .execute(self.statement(sql, values))
            .await
            .context("Failed to insert record")?;

        Ok(InsertOutcome::Accepted)
    }

    /// Records from the last `window_sec` seconds, newest first
    #[cfg(test)]
    pub async fn select_recent(&self, window_sec: i64) -> Result<Vec<SubmissionRecord>> {
        self.select_recent_at(window_sec, now_ts()).await
    }

    pub async fn select_recent_at(
        &self,
        window_sec: i64,
        now: i64,
    ) -> Result<Vec<SubmissionRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} >= ? ORDER BY {} DESC, rowid DESC",
            self.column_list(),
            quote(&self.table),
            quote(TIMESTAMP),
            quote(TIMESTAMP)
        );

        let rows = self
            .db
            .query_all(self.statement(sql, vec![(now - window_sec).into()]))
            .await
            .context("Failed to select recent records")?;

        rows.iter()
            .map(|row| {
                let timestamp: i64 = row
                    .try_get("", TIMESTAMP)
                    .context("Failed to read timestamp column")?;
                let fields = self
                    .fields
                    .iter()
                    .map(|field| {
                        row.try_get::<String>("", field)
                            .with_context(|| format!("Failed to read column {}", field))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(SubmissionRecord { timestamp, fields })
            })
            .collect()
    }

    /// Delete records at least `retention_sec` seconds old; returns rows removed
    pub async fn delete_old(&self, retention_sec: i64) -> Result<u64> {
        self.delete_old_at(retention_sec, now_ts()).await
    }

    pub async fn delete_old_at(&self, retention_sec: i64, now: i64) -> Result<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE {} <= ?",
            quote(&self.table),
            quote(TIMESTAMP)
        );

        let result = self
            .db
            .execute(self.statement(sql, vec![(now - retention_sec).into()]))
            .await
            .context("Failed to delete old records")?;

        Ok(result.rows_affected())
    }

    pub async fn count(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) AS \"count\" FROM {}", quote(&self.table));
        let row = self
            .db
            .query_one(self.statement(sql, Vec::new()))
            .await
            .context("Failed to count records")?;

        let count: i64 = match row {
            Some(row) => row.try_get("", "count").context("Failed to read count")?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    /// Recent records as text blocks: a relative time line, then one line per
    /// field, blocks separated by a blank line
    pub async fn render_recent(&self) -> Result<String> {
        self.render_recent_at(now_ts()).await
    }

    pub async fn render_recent_at(&self, now: i64) -> Result<String> {
        let records = self.select_recent_at(self.recent_window_sec, now).await?;
        Ok(render_records(&records, now))
    }
}

fn render_records(records: &[SubmissionRecord], now: i64) -> String {
    records
        .iter()
        .map(|record| {
            std::iter::once(relative_time(record.timestamp, now))
                .chain(record.fields.iter().cloned())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl SightingStore for Repo {
    async fn insert(&self, fields: &[String]) -> Result<InsertOutcome> {
        Repo::insert(self, fields).await
    }

    async fn render_recent(&self) -> Result<String> {
        Repo::render_recent(self).await
    }
}
