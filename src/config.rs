use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_url: Option<String>,
    /// Long-poll timeout passed to getUpdates (default: 60 seconds)
    #[serde(default = "default_poll_timeout_sec")]
    pub poll_timeout_sec: u32,
    /// Upper bound for a single outbound sendMessage (default: 10 seconds)
    #[serde(default = "default_send_timeout_sec")]
    pub send_timeout_sec: u64,
    /// Pause between two poll rounds (default: 1000 ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_timeout_sec() -> u32 {
    60
}

fn default_send_timeout_sec() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            table: default_table(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite:data/sightings.db?mode=rwc".to_string()
}

fn default_table() -> String {
    "sightings".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "data/logs".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Shortest accepted answer, in characters (default: 10)
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    /// Longest accepted answer, in characters (default: 70)
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Reject answers containing non-ASCII characters (default: false)
    #[serde(default)]
    pub ascii_only: bool,
    /// Seconds a sender must wait after a successful report (default: 1 hour)
    #[serde(default = "default_cooldown_sec")]
    pub cooldown_sec: i64,
    /// Column names of the persisted answers, one per question
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,
    /// Window shown by /recent (default: 7 days)
    #[serde(default = "default_recent_window_days")]
    pub recent_window_days: i64,
    /// Records older than this are pruned (default: 365 days)
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Daily prune time in HH:MM format (default: "03:00")
    #[serde(default = "default_retention_time")]
    pub retention_time: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            ascii_only: false,
            cooldown_sec: default_cooldown_sec(),
            fields: default_fields(),
            recent_window_days: default_recent_window_days(),
            retention_days: default_retention_days(),
            retention_time: default_retention_time(),
        }
    }
}

fn default_min_length() -> usize {
    10
}

fn default_max_length() -> usize {
    70
}

fn default_cooldown_sec() -> i64 {
    60 * 60 // 1 hour
}

fn default_fields() -> Vec<String> {
    vec![
        "name".to_string(),
        "location".to_string(),
        "description".to_string(),
    ]
}

fn default_recent_window_days() -> i64 {
    7
}

fn default_retention_days() -> i64 {
    365
}

/// Largest accepted day count (about a century)
const MAX_DAYS: i64 = 36_500;

fn default_retention_time() -> String {
    "03:00".to_string()
}

impl ReportConfig {
    pub fn recent_window_sec(&self) -> i64 {
        self.recent_window_days * 24 * 60 * 60
    }

    pub fn retention_sec(&self) -> i64 {
        self.retention_days * 24 * 60 * 60
    }

    /// Parse `retention_time` into a wall-clock time
    pub fn retention_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.retention_time, "%H:%M").with_context(|| {
            format!(
                "Invalid retention_time '{}', expected HH:MM",
                self.retention_time
            )
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_replies_path")]
    pub replies_path: String,
    #[serde(default = "default_blacklist_path")]
    pub blacklist_path: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            replies_path: default_replies_path(),
            blacklist_path: default_blacklist_path(),
        }
    }
}

fn default_replies_path() -> String {
    "data/replies.txt".to_string()
}

fn default_blacklist_path() -> String {
    "data/blacklist.txt".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config.toml").required(false))
            .add_source(config::Environment::with_prefix("SIGHTING").separator("__"));

        let config: Config = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the questionnaire or the schema unusable
    pub fn validate(&self) -> Result<()> {
        let report = &self.report;
        if report.min_length == 0 {
            bail!("report.min_length must be at least 1");
        }
        if report.min_length > report.max_length {
            bail!(
                "report.min_length ({}) exceeds report.max_length ({})",
                report.min_length,
                report.max_length
            );
        }
        if report.cooldown_sec < 0 {
            bail!("report.cooldown_sec must not be negative");
        }
        if report.fields.is_empty() {
            bail!("report.fields must name at least one column");
        }
        for (name, days) in [
            ("recent_window_days", report.recent_window_days),
            ("retention_days", report.retention_days),
        ] {
            if !(1..=MAX_DAYS).contains(&days) {
                bail!("report.{} must be between 1 and {}, got {}", name, MAX_DAYS, days);
            }
        }

        let identifier = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")?;
        for name in report.fields.iter().chain(std::iter::once(&self.database.table)) {
            if !identifier.is_match(name) {
                bail!("'{}' is not a valid column or table name", name);
            }
        }
        if report
            .fields
            .iter()
            .any(|f| f.eq_ignore_ascii_case("timestamp"))
        {
            bail!("'timestamp' is reserved and cannot be used as a report field");
        }

        report.retention_time()?;
        Ok(())
    }

    pub fn log_level(&self) -> tracing::Level {
        match self.logging.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "info" => tracing::Level::INFO,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}
