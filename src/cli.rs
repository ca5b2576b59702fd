//! Command-line interface for voxloop
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Real-time voice turn-taking engine
#[derive(Parser, Debug)]
#[command(name = "voxloop", version, about = "Real-time voice turn-taking engine")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,

    /// Live input level meter for tuning the VAD threshold
    Meter {
        /// Audio input device (default: best available)
        #[arg(long, value_name = "DEVICE")]
        device: Option<String>,

        /// Speech threshold override (0.0 to 1.0)
        #[arg(long, value_name = "LEVEL")]
        threshold: Option<f32>,

        /// How long to run (default: until Ctrl-C). Examples: 30s, 2m
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        duration: Option<Duration>,
    },

    /// Manage the configuration file
    Config {
        /// Action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration file actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write a configuration file with default values
    Init,
    /// Print the configuration file path
    Path,
}

/// Parse a duration string.
///
/// Supports any format accepted by `humantime`: bare numbers (seconds),
/// single-unit (`30s`, `5m`), and compound (`1m30s`).
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Default configuration file path: `$XDG_CONFIG_HOME/voxloop/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("voxloop")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_bare_seconds() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("not a duration").is_err());
    }

    #[test]
    fn test_default_config_path_ends_with_crate_dir() {
        let path = default_config_path();
        assert!(path.ends_with("voxloop/config.toml"));
    }

    #[test]
    fn test_cli_parses_meter_flags() {
        let cli = Cli::try_parse_from([
            "voxloop", "meter", "--device", "pipewire", "--threshold", "0.05",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Meter {
                device, threshold, ..
            }) => {
                assert_eq!(device.as_deref(), Some("pipewire"));
                assert_eq!(threshold, Some(0.05));
            }
            other => panic!("expected meter command, got {:?}", other),
        }
    }
}
