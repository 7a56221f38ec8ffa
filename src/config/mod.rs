//! Configuration module - command-line flags and environment variables

pub mod loader;

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Command-line flags.
#[derive(Debug, Clone, Parser)]
#[command(name = "dogpark-server", version, about = "Authoritative dog-walking game server")]
pub struct Args {
    /// Path to the JSON game config (maps, roads, loot types)
    #[arg(short = 'c', long = "config-file")]
    pub config_file: PathBuf,

    /// Server tick period in milliseconds; 0 enables manual ticking via the API
    #[arg(short = 't', long = "tick-period", default_value_t = 0)]
    pub tick_period: u64,

    /// Document root for static files
    #[arg(short = 'w', long = "www-root", default_value = "static")]
    pub www_root: PathBuf,

    /// Spawn dogs at random road positions instead of the first road's start
    #[arg(long = "randomize-spawn-points")]
    pub randomize_spawn_points: bool,

    /// Path of the state snapshot file; omit to disable persistence
    #[arg(long = "state-file")]
    pub state_file: Option<PathBuf>,

    /// Auto-save period in milliseconds; 0 saves only on shutdown
    #[arg(long = "save-state-period", default_value_t = 0)]
    pub save_state_period: u64,
}

/// Full application configuration: flags plus environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Record-store connection string
    pub db_url: String,

    pub config_file: PathBuf,
    pub tick_period: u64,
    pub www_root: PathBuf,
    pub randomize_spawn_points: bool,
    pub state_file: Option<PathBuf>,
    pub save_state_period: u64,
}

impl Config {
    /// Combine parsed flags with environment variables.
    pub fn from_args_and_env(args: Args) -> Result<Self, ConfigError> {
        // Deployment platforms provide PORT; fall back to SERVER_ADDR or default.
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{port}")
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            db_url: env::var("GAME_DB_URL").map_err(|_| ConfigError::Missing("GAME_DB_URL"))?,

            config_file: args.config_file,
            tick_period: args.tick_period,
            www_root: args.www_root,
            randomize_spawn_points: args.randomize_spawn_points,
            state_file: args.state_file,
            save_state_period: args.save_state_period,
        })
    }

    /// Manual ticking is available only when no server tick loop runs.
    pub fn manual_tick_enabled(&self) -> bool {
        self.tick_period == 0
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_all_flags() {
        let args = Args::parse_from([
            "dogpark-server",
            "-c",
            "data/config.json",
            "-t",
            "50",
            "-w",
            "public",
            "--randomize-spawn-points",
            "--state-file",
            "state.json",
            "--save-state-period",
            "5000",
        ]);
        assert_eq!(args.config_file, PathBuf::from("data/config.json"));
        assert_eq!(args.tick_period, 50);
        assert_eq!(args.www_root, PathBuf::from("public"));
        assert!(args.randomize_spawn_points);
        assert_eq!(args.state_file, Some(PathBuf::from("state.json")));
        assert_eq!(args.save_state_period, 5000);
    }

    #[test]
    fn config_file_is_required() {
        let result = Args::try_parse_from(["dogpark-server"]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let result = Args::try_parse_from(["dogpark-server", "-c", "x.json", "--frobnicate"]);
        assert!(result.is_err());
    }

    #[test]
    fn tick_defaults_to_manual_mode() {
        let args = Args::parse_from(["dogpark-server", "-c", "x.json"]);
        assert_eq!(args.tick_period, 0);
        assert_eq!(args.www_root, PathBuf::from("static"));
        assert!(args.state_file.is_none());
    }
}
