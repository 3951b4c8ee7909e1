//! CLI options.

use std::path::PathBuf;
use std::time::Duration as StdDuration;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Opts {
    /// Increases log verbosity (`-v` for debug, `-vv` for everything)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    Serve(ServeOpts),
    Watch(WatchOpts),
}

/// Runs the tracking server
#[derive(Args)]
pub struct ServeOpts {
    /// Bind host
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// PostgreSQL URI for the position log, disabled when absent
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Redis REST endpoint of the shared position cache
    #[arg(long, env = "UPSTASH_REDIS_REST_URL", requires = "redis_rest_token")]
    pub redis_rest_url: Option<String>,

    /// Redis REST bearer token
    #[arg(long, env = "UPSTASH_REDIS_REST_TOKEN", hide_env_values = true)]
    pub redis_rest_token: Option<String>,

    /// CSV file with the header `line,name,latitude,longitude`, built-in lines when absent
    #[arg(long, env = "STOPS_FILE")]
    pub stops: Option<PathBuf>,

    /// Directory with static files served on every other path
    #[arg(long, env = "PUBLIC_DIR")]
    pub public_dir: Option<PathBuf>,

    /// Drop vehicles that have not reported for this long, for example `10m`
    #[arg(long, env = "STALE_AFTER", value_parser = humantime::parse_duration)]
    pub stale_after: Option<StdDuration>,
}

impl ServeOpts {
    /// The cache is enabled only when both the URL and the token are present.
    pub fn cache_credentials(&self) -> Option<(&str, &str)> {
        Some((self.redis_rest_url.as_deref()?, self.redis_rest_token.as_deref()?))
    }
}

/// Follows a server like a browser viewer would, logging every change
#[derive(Args)]
pub struct WatchOpts {
    /// Server base URL
    #[arg(long, env = "TRACKER_SERVER", default_value = "http://localhost:5000")]
    pub server: String,

    /// CSV stop file used to name the nearest stop when the server does not
    #[arg(long, env = "STOPS_FILE")]
    pub stops: Option<PathBuf>,
}
