//! Stargaze application binary - composition root.
//!
//! 1. Load configuration from TOML and apply CLI/env overrides
//! 2. Read the completion credential (fatal if missing)
//! 3. Build the completion client, archives and query router
//! 4. Serve the HTTP API, or run the `check-key` probe

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use stargaze_api::{start_server, AppState};
use stargaze_archive::{ExoplanetArchive, GaiaArchive, NasaImageSearch};
use stargaze_chat::{
    ApiKey, Archives, CompletionClient, CompletionRequest, OpenRouterClient, QueryGenerator,
    QueryRouter,
};
use stargaze_core::config::API_KEY_ENV;
use stargaze_core::{StargazeConfig, Turn};

use cli::{CliArgs, Command};

const PROBE_PROMPT: &str = "Hello! Can you confirm if you're working?";
const PROBE_MAX_TOKENS: u32 = 400;

fn build_router(
    config: &StargazeConfig,
    client: Arc<dyn CompletionClient>,
) -> Result<QueryRouter, Box<dyn std::error::Error>> {
    let archive_timeout = Duration::from_secs(config.archives.timeout_secs);
    let archives = Archives {
        exoplanets: Arc::new(ExoplanetArchive::new(
            config.archives.exoplanet_url.clone(),
            archive_timeout,
        )?),
        gaia: Arc::new(GaiaArchive::new(
            config.archives.gaia_url.clone(),
            archive_timeout,
        )?),
        images: Arc::new(NasaImageSearch::new(
            config.archives.image_search_url.clone(),
            Duration::from_secs(config.archives.image_timeout_secs),
            Duration::from_secs(config.archives.image_probe_timeout_secs),
        )?),
    };

    let generator = QueryGenerator::new(client, config.completion.clone());
    Ok(QueryRouter::new(
        generator,
        archives,
        &config.conversation,
        config.server.max_query_chars,
    ))
}

async fn check_key(client: &dyn CompletionClient) -> Result<(), Box<dyn std::error::Error>> {
    let request = CompletionRequest {
        messages: vec![Turn::user(PROBE_PROMPT)],
        temperature: None,
        max_tokens: PROBE_MAX_TOKENS,
    };

    match client.complete(&request).await {
        Ok(reply) => {
            tracing::info!("Completion credential accepted");
            println!("{}", reply);
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Completion credential check failed");
            Err(e.into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Tracing starts before the config is read so config loading is logged.
    // The filter is reloaded below once the configured level is known.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().ok();
    let filter_from_env = env_filter.is_some();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter.unwrap_or_else(|| {
            tracing_subscriber::EnvFilter::new(args.startup_log_level())
        }))
        .with_filter_reloading();
    let filter_handle = builder.reload_handle();
    builder.init();

    tracing::info!("Starting Stargaze v{}", env!("CARGO_PKG_VERSION"));

    let config_file = args.resolve_config_path();
    let mut config = StargazeConfig::load_or_default(&config_file);

    // RUST_LOG overrides every configured level.
    if !filter_from_env {
        let level = args.resolve_log_level(&config.general.log_level);
        if let Err(e) = filter_handle.reload(tracing_subscriber::EnvFilter::new(&level)) {
            tracing::warn!(level = %level, error = %e, "Failed to apply configured log level");
        }
    }

    config.server.port = args.resolve_port(config.server.port);
    config.validate()?;

    let api_key = match ApiKey::from_env(API_KEY_ENV) {
        Ok(key) => key,
        Err(e) => {
            tracing::error!(error = %e, "Cannot start without a completion credential");
            return Err(e.into());
        }
    };
    let client: Arc<dyn CompletionClient> =
        Arc::new(OpenRouterClient::new(&config.completion, api_key)?);
    tracing::info!(model = %config.completion.model, "Completion client ready");

    match args.command() {
        Command::CheckKey => check_key(client.as_ref()).await,
        Command::Serve => {
            let router = build_router(&config, client)?;
            let state = AppState::new(config.clone(), router);
            start_server(&config, state).await?;
            Ok(())
        }
    }
}
