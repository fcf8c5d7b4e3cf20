use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::import::ImportSettings;

/// Football match predictions and statistics import
#[derive(Parser, Debug, Clone)]
#[command(name = "matchday-insights", version, about)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "matchday.db", global = true)]
    pub database_path: String,

    /// API-Football base URL
    #[arg(
        long,
        env = "API_FOOTBALL_URL",
        default_value = "https://v3.football.api-sports.io",
        global = true
    )]
    pub api_football_url: String,

    /// API-Football key (required for commands that call API-Football)
    #[arg(long, env = "API_FOOTBALL_KEY", global = true)]
    pub api_football_key: Option<String>,

    /// Base URL of the openfootball season files
    #[arg(
        long,
        env = "OPENFOOTBALL_URL",
        default_value = "https://raw.githubusercontent.com/openfootball/football.json/master",
        global = true
    )]
    pub openfootball_url: String,

    /// Timeout for every outbound HTTP request, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "10", global = true)]
    pub http_timeout_secs: u64,

    /// API-Football requests allowed per minute
    #[arg(long, env = "REQUESTS_PER_MINUTE", default_value = "30", global = true)]
    pub requests_per_minute: u32,

    /// Season the player import pages through
    #[arg(long, env = "PLAYERS_SEASON", default_value = "2023", global = true)]
    pub players_season: i32,

    /// Players per upstream page
    #[arg(long, env = "IMPORT_BATCH_SIZE", default_value = "200", global = true)]
    pub import_batch_size: u32,

    /// Retries after a failed fetch or upsert
    #[arg(long, env = "IMPORT_RETRY_ATTEMPTS", default_value = "3", global = true)]
    pub import_retry_attempts: u32,

    /// Flat delay between retries, in milliseconds
    #[arg(long, env = "IMPORT_RETRY_DELAY_MS", default_value = "5000", global = true)]
    pub import_retry_delay_ms: u64,

    /// Pause between batches, in milliseconds
    #[arg(long, env = "IMPORT_BATCH_DELAY_MS", default_value = "1000", global = true)]
    pub import_batch_delay_ms: u64,

    /// Wait after a rate-limit response, in seconds
    #[arg(long, env = "IMPORT_RATE_LIMIT_DELAY_SECS", default_value = "60", global = true)]
    pub import_rate_limit_delay_secs: u64,

    /// Rate-limit waits per batch before it is skipped
    #[arg(long, env = "IMPORT_MAX_RATE_LIMIT_WAITS", default_value = "3", global = true)]
    pub import_max_rate_limit_waits: u32,

    /// Consecutive skipped batches after which an import stops
    #[arg(long, env = "IMPORT_MAX_CONSECUTIVE_SKIPS", default_value = "5", global = true)]
    pub import_max_consecutive_skips: u32,

    /// Dashboard listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080", global = true)]
    pub dashboard_addr: String,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the dashboard API
    Serve,
    /// Import all players, page by page
    ImportPlayers {
        /// First batch to fetch
        #[arg(long, default_value = "0")]
        start_batch: u32,
    },
    /// Continue the player import after its last checkpoint
    ResumePlayers,
    /// Load a league and its teams from API-Football
    SyncReference {
        #[arg(long)]
        league: i64,
        #[arg(long)]
        season: i32,
    },
    /// Stage a historical season file
    ImportLeague {
        /// Season directory, e.g. 2023-24
        #[arg(long)]
        season: String,
        /// File name under the season, e.g. en.1.json
        #[arg(long, conflicts_with = "local_file", required_unless_present = "local_file")]
        league_file: Option<String>,
        /// Read the season file from disk instead
        #[arg(long)]
        local_file: Option<PathBuf>,
    },
    /// Promote a staged historical league to validated
    ValidateLeague { id: i64 },
    /// List staged historical leagues
    Staged,
    /// Predict a fixture
    Predict {
        #[arg(long)]
        home_team: i64,
        #[arg(long)]
        away_team: i64,
        #[arg(long)]
        league: i64,
        #[arg(long)]
        season: i32,
    },
}

impl Command {
    fn needs_api_football(&self) -> bool {
        matches!(
            self,
            Command::Serve
                | Command::ImportPlayers { .. }
                | Command::ResumePlayers
                | Command::SyncReference { .. }
                | Command::Predict { .. }
        )
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.command.needs_api_football()
            && self.api_football_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            anyhow::bail!("API_FOOTBALL_KEY is required for this command");
        }
        if self.import_batch_size == 0 {
            anyhow::bail!("import_batch_size must be positive");
        }
        if self.requests_per_minute == 0 {
            anyhow::bail!("requests_per_minute must be positive");
        }
        if self.import_max_consecutive_skips == 0 {
            anyhow::bail!("import_max_consecutive_skips must be positive");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("http_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn import_settings(&self) -> ImportSettings {
        ImportSettings {
            batch_size: self.import_batch_size,
            retry_attempts: self.import_retry_attempts,
            retry_delay: Duration::from_millis(self.import_retry_delay_ms),
            batch_delay: Duration::from_millis(self.import_batch_delay_ms),
            rate_limit_delay: Duration::from_secs(self.import_rate_limit_delay_secs),
            max_rate_limit_waits: self.import_max_rate_limit_waits,
            max_consecutive_skips: self.import_max_consecutive_skips,
        }
    }
}
