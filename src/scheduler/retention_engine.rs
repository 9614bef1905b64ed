use crate::db::repo::Repo;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

/// Engine responsible for the daily pruning of old sightings
pub struct RetentionEngine {
    repo: Arc<Repo>,
    retention_sec: i64,
    execution_time: NaiveTime,
}

impl RetentionEngine {
    pub fn new(repo: Arc<Repo>, retention_sec: i64, execution_time: NaiveTime) -> Self {
        Self {
            repo,
            retention_sec,
            execution_time,
        }
    }

    /// Prune once right away, then every day at the configured time
    pub async fn run(&self) {
        info!(
            "🚀 Retention engine started (execution time: {})",
            self.execution_time.format("%H:%M")
        );

        self.prune().await;

        loop {
            let next_execution = match self.calculate_next_execution_time() {
                Ok(time) => time,
                Err(e) => {
                    error!("Failed to calculate next execution time: {:#}", e);
                    // Wait for an hour and try again
                    sleep(Duration::from_secs(3600)).await;
                    continue;
                }
            };
            let now = Local::now();
            let duration_until_execution = (next_execution - now).to_std().unwrap_or_default();

            info!(
                "⏰ Next retention run at: {} (in {} seconds)",
                next_execution.format("%Y-%m-%d %H:%M:%S"),
                duration_until_execution.as_secs()
            );

            sleep(duration_until_execution).await;
            self.prune().await;

            // Sleep a bit to avoid executing twice in the same minute
            sleep(Duration::from_secs(60)).await;
        }
    }

    async fn prune(&self) {
        match self.repo.delete_old(self.retention_sec).await {
            Ok(0) => info!("Retention run: nothing to delete"),
            Ok(count) => info!("✅ Retention run: {} old records deleted", count),
            Err(e) => error!("❌ Retention run failed: {:#}", e),
        }
    }

    fn calculate_next_execution_time(&self) -> Result<DateTime<Local>> {
        let target = next_execution_after(Local::now().naive_local(), self.execution_time);
        Local
            .from_local_datetime(&target)
            .single()
            .context("Ambiguous or invalid local time (e.g. skipped by DST)")
    }
}

/// The first occurrence of `at` strictly after `now`
fn next_execution_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let target_date = if now.time() < at {
        now.date()
    } else {
        now.date() + chrono::Duration::days(1)
    };
    target_date.and_time(at)
}
