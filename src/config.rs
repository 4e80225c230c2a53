use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uuid::Uuid;

use crate::auth::{FileCredentialStore, DEFAULT_REFRESH_PATH};

/// Command-line client for the cooperative backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Backend base URL (e.g. https://coop.example.org/api)
    #[arg(short = 'a', long, env = "COOP_API_BASE")]
    pub api_base: Option<String>,

    /// Where the session tokens are persisted
    #[arg(short = 'c', long, env = "COOP_CREDENTIALS_FILE")]
    pub credentials_file: Option<String>,

    /// Path of the token refresh endpoint
    #[arg(long, env = "REFRESH_PATH", default_value = DEFAULT_REFRESH_PATH)]
    pub refresh_path: String,

    /// Seconds to wait for a token refresh before giving up
    #[arg(long, env = "REFRESH_TIMEOUT", default_value = "10")]
    pub refresh_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Sign in and store the session
    Login {
        email: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Me,
    /// List members (admin)
    Users {
        #[arg(long, default_value = "0")]
        skip: u32,
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Show one member (admin)
    User { id: Uuid },
    /// Show one deposit
    Deposit { id: Uuid },
    /// List notifications
    Notifications,
    /// Mark every notification read
    ReadAll,
    /// List deposit and loan policies
    Policies,
    /// Authenticated GET of any backend path
    Get { path: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Backend
    pub api_base: String,
    pub refresh_path: String,

    // Session
    pub credentials_file: PathBuf,
    pub refresh_timeout: u64,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let command = args.command.clone();
        Ok((Self::from_args(args)?, command))
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let credentials_file = match args.credentials_file {
            Some(path) => expand_tilde(&path),
            None => FileCredentialStore::default_path()
                .context("No config directory found; set COOP_CREDENTIALS_FILE")?,
        };

        let config = Config {
            api_base: args
                .api_base
                .context("COOP_API_BASE is required (use -a or set COOP_API_BASE env var)")?,
            refresh_path: args.refresh_path,

            credentials_file,
            refresh_timeout: args.refresh_timeout,

            http_max_connections: std::env::var("HTTP_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8),

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),

            http_request_timeout: args.http_timeout,

            log_level: args.log_level,
            log_format: args.log_format,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            anyhow::bail!(
                "COOP_API_BASE must be an http(s) URL, got '{}'",
                self.api_base
            );
        }

        if !self.refresh_path.starts_with('/') {
            anyhow::bail!("REFRESH_PATH must start with '/', got '{}'", self.refresh_path);
        }

        if self.refresh_timeout == 0 {
            anyhow::bail!("REFRESH_TIMEOUT must be at least 1 second");
        }

        if self.http_request_timeout == 0 || self.http_connect_timeout == 0 {
            anyhow::bail!("HTTP timeouts must be at least 1 second");
        }

        Ok(())
    }
}

/// Expand tilde in path
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
