// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `preview-live`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "preview-live",
    version,
    about = "Watch preview sources, rebuild the preview index and push reload events.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `preview-live.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "preview-live.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PREVIEW_LIVE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate the config, print the sources, then exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Build the index once, write it to the registry file, then exit.
    #[arg(long, conflicts_with = "dry_run")]
    pub preparse: bool,

    /// Don't print events to stdout.
    #[arg(long)]
    pub quiet_events: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::parse_from(["preview-live"]);
        assert_eq!(args.config, "preview-live.toml");
        assert!(!args.dry_run && !args.preparse && !args.quiet_events);
        assert!(args.log_level.is_none());
    }

    #[test]
    fn preparse_and_dry_run_conflict() {
        let res = CliArgs::try_parse_from(["preview-live", "--preparse", "--dry-run"]);
        assert!(res.is_err());
    }
}
