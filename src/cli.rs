//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. The global flags are merged over the configuration from the
//! `doughwatch.toml` file and environment variables.

use clap::{Args, Parser, Subcommand};
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Validates shop monitoring settings and sends alerts to Slack or email.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: ConfigArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags that override values from the configuration file.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (e.g. "debug"), used when RUST_LOG is not set.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Timeout for a single alert delivery attempt, in seconds.
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a settings file and report errors and warnings.
    Validate {
        /// JSON file holding the settings draft.
        settings: PathBuf,

        /// The shop's own domain; product URLs must be hosted on it.
        #[arg(long)]
        shop_domain: Option<String>,
    },
    /// Validate a settings file, then send a test alert through its channels.
    TestAlert {
        /// JSON file holding the settings draft.
        settings: PathBuf,

        /// The shop's own domain, e.g. "bakery.myshopify.com".
        #[arg(long)]
        shop_domain: String,
    },
}

impl Provider for ConfigArgs {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(timeout) = self.timeout_seconds {
            let mut alerts = Dict::new();
            alerts.insert("timeout_seconds".into(), Value::from(timeout));
            dict.insert("alerts".into(), Value::from(alerts));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
