//! One publisher run: publish the next queued post and exit.
//!
//! Meant to be started by an external scheduler (cron, systemd timer).

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use dotmoe::config::Config;
use dotmoe::db::Database;
use dotmoe::logging::init_tracing;
use dotmoe::publisher::{MastodonClient, PublishSettings, Publisher, RunOutcome};
use dotmoe::web::build_http_client;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    let token = config
        .access_token
        .clone()
        .context("TOKEN is required to publish")?;

    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let http = build_http_client(&config)?;
    let social = MastodonClient::new(http.clone(), &config.instance_url, &token);
    let publisher = Publisher::new(
        db,
        http,
        Arc::new(social),
        PublishSettings::from_config(&config),
    );

    match publisher.run().await? {
        RunOutcome::Drained { abandoned } => {
            info!(abandoned, "Nothing left to publish");
        }
        RunOutcome::Published {
            kind,
            post_id,
            status_id,
            abandoned,
        } => {
            info!(
                queue = kind.as_str(),
                post_id = %post_id,
                status_id = %status_id,
                abandoned,
                "Publish run complete"
            );
        }
        RunOutcome::GaveUp { post_id, failures } => {
            error!(
                post_id = %post_id,
                failures,
                "Retry bound reached; leaving post queued for the next run"
            );
        }
    }

    Ok(())
}
