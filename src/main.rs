//! DoughWatch - stock monitoring alerts for Shopify merchants
//!
//! Operator entry point: validates settings files and sends test alerts
//! through the same code paths the admin UI uses.

use anyhow::Result;
use clap::Parser;
use doughwatch::{
    cli::{Cli, Command},
    config::Config,
    notification::{AlertDispatcher, ReqwestTransport},
    settings::{SettingsDraft, ShopSettings},
    validation::{check_draft_alert_channels, validate},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli.global).unwrap_or_else(|err| {
        tracing_subscriber::fmt().with_writer(std::io::stderr).init();
        error!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Alert Timeout: {}s", config.alerts.timeout_seconds);
    info!("Slack Sender: {}", config.alerts.slack.username);
    info!(
        "Email Alerts: {}",
        if config.alerts.email.token().is_some() {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    info!("-------------------------------------------------------");

    let succeeded = match cli.command {
        Command::Validate {
            settings,
            shop_domain,
        } => {
            let draft = SettingsDraft::from_json_file(&settings)?;
            let result = validate(&draft, shop_domain.as_deref());
            println!("{}", serde_json::to_string_pretty(&result)?);

            if let Some(warning) = check_draft_alert_channels(&draft) {
                warn!("{}", warning);
            }
            result.ok
        }
        Command::TestAlert {
            settings,
            shop_domain,
        } => {
            let draft = SettingsDraft::from_json_file(&settings)?;
            match ShopSettings::from_draft(&draft, Some(shop_domain.as_str())) {
                Ok(typed) => {
                    let dispatcher =
                        AlertDispatcher::from_config(&config.alerts, Arc::new(ReqwestTransport::new()));
                    let result = dispatcher.send_test_alert(&typed, &shop_domain).await;
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    result.success
                }
                Err(e) => {
                    error!("Refusing to send a test alert: {}", e);
                    false
                }
            }
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
