//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// FormPulse - live survey analytics over long-poll
///
/// Serve the forms API, watch a form's distributions update as answers
/// arrive, or summarize a stored data file offline.
///
/// Examples:
///   formpulse serve --bind 0.0.0.0:8080 --data-file forms.json
///   formpulse watch --form 3f2c... --server http://localhost:8080
///   formpulse summarize --data-file forms.json --form 3f2c... --format csv
///   formpulse init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .formpulse.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API server
    Serve {
        /// Address to bind (overrides config)
        #[arg(long, value_name = "ADDR", env = "FORMPULSE_BIND")]
        bind: Option<String>,

        /// JSON file to persist forms and responses to
        #[arg(long, value_name = "FILE")]
        data_file: Option<PathBuf>,

        /// Long-poll wait ceiling in seconds
        #[arg(long, value_name = "SECS")]
        ceiling: Option<u64>,
    },

    /// Follow a form's analytics as responses arrive
    Watch {
        /// Form id to watch
        #[arg(long, value_name = "ID")]
        form: String,

        /// Server base URL (overrides config)
        #[arg(long, value_name = "URL", env = "FORMPULSE_SERVER")]
        server: Option<String>,

        /// Freshness baseline in epoch milliseconds
        #[arg(long, default_value = "0", value_name = "MS")]
        since: i64,

        /// Stop after this many snapshots
        #[arg(long, value_name = "N")]
        max_updates: Option<usize>,
    },

    /// Aggregate a stored data file and write a report
    Summarize {
        /// Store data file written by `serve --data-file`
        #[arg(long, value_name = "FILE")]
        data_file: PathBuf,

        /// Form id to summarize
        #[arg(long, value_name = "ID")]
        form: String,

        /// Output format
        #[arg(long, default_value = "markdown", value_name = "FORMAT")]
        format: OutputFormat,

        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Generate a default .formpulse.toml configuration file
    InitConfig,
}

/// Output format for offline summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown breakdown (default)
    #[default]
    Markdown,
    /// JSON snapshot
    Json,
    /// CSV of raw responses
    Csv,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Serve { ceiling, .. } => {
                if *ceiling == Some(0) {
                    return Err("Ceiling must be at least 1 second".to_string());
                }
            }
            Command::Watch {
                form,
                server,
                since,
                max_updates,
            } => {
                if form.trim().is_empty() {
                    return Err("Form id must not be empty".to_string());
                }
                if let Some(url) = server {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        return Err("Server URL must start with 'http://' or 'https://'".to_string());
                    }
                }
                if *since < 0 {
                    return Err("Baseline must not be negative".to_string());
                }
                if *max_updates == Some(0) {
                    return Err("Max updates must be at least 1".to_string());
                }
            }
            Command::Summarize { data_file, .. } => {
                if !data_file.is_file() {
                    return Err(format!("Data file does not exist: {}", data_file.display()));
                }
            }
            Command::InitConfig => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watch_args() -> Args {
        Args {
            config: None,
            verbose: false,
            quiet: false,
            command: Command::Watch {
                form: "form-1".to_string(),
                server: Some("http://localhost:8080".to_string()),
                since: 0,
                max_updates: None,
            },
        }
    }

    #[test]
    fn test_parse_serve() {
        let args = Args::try_parse_from(["formpulse", "-v", "serve", "--ceiling", "10"]).unwrap();
        assert!(args.verbose);
        match args.command {
            Command::Serve { ceiling, .. } => assert_eq!(ceiling, Some(10)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_summarize_format() {
        let args = Args::try_parse_from([
            "formpulse",
            "summarize",
            "--data-file",
            "forms.json",
            "--form",
            "f",
            "--format",
            "csv",
        ])
        .unwrap();
        match args.command {
            Command::Summarize { format, .. } => assert_eq!(format, OutputFormat::Csv),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = watch_args();
        if let Command::Watch { server, .. } = &mut args.command {
            *server = Some("localhost:8080".to_string());
        }
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = watch_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_ceiling() {
        let args = Args {
            config: None,
            verbose: false,
            quiet: false,
            command: Command::Serve {
                bind: None,
                data_file: None,
                ceiling: Some(0),
            },
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = watch_args();
        assert!(args.validate().is_ok());
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
