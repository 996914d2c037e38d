//! Command definitions and structures for the CLI

use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use trumpet::config::{Options, TransportKind};

/// Main CLI structure
#[derive(Parser)]
#[command(name = "trumpet")]
#[command(about = "Receive server notifications over polling, SSE or sockets and show each one once")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Project path for project-level configuration
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Listen for notifications (default mode when no subcommand)
    Listen(ListenArgs),

    /// Initialize configuration
    Init {
        /// Initialize global configuration (default is project-level)
        #[arg(short, long)]
        global: bool,

        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Validate the effective configuration and report every problem
    Check(ListenArgs),

    /// Inspect or reset the record of delivered notifications
    Seen {
        #[command(subcommand)]
        action: SeenAction,

        /// Dedup store file (defaults to the configured store)
        #[arg(long, global = true)]
        store: Option<PathBuf>,
    },
}

/// Overrides applied on top of the configuration file
#[derive(Args, Debug, Default, Clone)]
pub struct ListenArgs {
    /// Server base URL the endpoint is appended to
    #[arg(long, env = "TRUMPET_BASE_URL")]
    pub base_url: Option<String>,

    /// Notifications endpoint, relative to the base URL or absolute
    #[arg(short, long, env = "TRUMPET_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Transport: http_poll (0), sse (1) or socket (2)
    #[arg(short = 't', long)]
    pub api_type: Option<TransportKind>,

    /// Delay between polls in milliseconds
    #[arg(short, long, allow_negative_numbers = true)]
    pub interval_ms: Option<i64>,

    /// Extra request header, repeatable
    #[arg(short = 'H', long = "header", value_name = "KEY=VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Show notifications as ntfy toasts instead of terminal lines
    #[arg(long)]
    pub toast: bool,

    /// POST every batch of new notifications to this URL
    #[arg(long)]
    pub callback_url: Option<String>,

    /// Dedup store file (defaults to the configured store)
    #[arg(long)]
    pub store: Option<PathBuf>,
}

impl ListenArgs {
    /// Only flags actually given become options
    pub fn to_options(&self) -> Options {
        Options {
            server_base_url: self.base_url.clone(),
            notifications_endpoint: self.endpoint.clone(),
            poll_interval_ms: self.interval_ms,
            api_type: self.api_type,
            use_toast: self.toast.then_some(true),
            callback_url: self.callback_url.clone(),
            endpoint_headers: (!self.headers.is_empty())
                .then(|| self.headers.iter().cloned().collect::<BTreeMap<_, _>>()),
            ..Default::default()
        }
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("header name missing in '{raw}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Configuration management actions
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the configuration file in effect
    Show,

    /// Print the path of the configuration file in use
    Path,
}

/// Dedup store actions
#[derive(Subcommand)]
pub enum SeenAction {
    /// List the ids already delivered
    List,

    /// Forget every delivered id
    Clear,
}
