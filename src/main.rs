use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;

use twochairs_core::security::{ApiKey, OPENAI_API_KEY_VAR};
use twochairs_engine::{OrchestratorConfig, RoundOrchestrator};
use twochairs_llm::{OpenAiModel, OpenAiModeration, ReliableModel};
use twochairs_server::{AppState, ServerConfig};
use twochairs_settings::Settings;
use twochairs_store::Database;
use twochairs_telemetry::{init_telemetry, parse_level, TelemetryConfig};

/// Two Chairs self-compassion exercise server.
#[derive(Debug, Parser)]
#[command(name = "twochairs", version)]
struct Args {
    /// Settings file (defaults to ~/.twochairs/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Address to bind, overriding settings.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, overriding settings.
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database path, overriding settings.
    #[arg(long)]
    db: Option<PathBuf>,
}

fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = match &args.settings {
        Some(path) => twochairs_settings::load_settings_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => twochairs_settings::load_settings().context("loading settings")?,
    };

    if let Some(host) = &args.host {
        settings.server.host = host.clone();
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(db) = &args.db {
        settings.server.database_path = db.clone();
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let settings = load_settings(&args)?;

    let _telemetry = init_telemetry(TelemetryConfig {
        log_level: parse_level(&settings.telemetry.log_level),
        log_to_sqlite: settings.telemetry.log_to_sqlite,
        log_db_path: settings.telemetry.log_database_path.clone(),
        ..TelemetryConfig::default()
    });

    tracing::info!("starting twochairs server");

    let Some(api_key) = ApiKey::from_env(OPENAI_API_KEY_VAR) else {
        bail!("{OPENAI_API_KEY_VAR} is not set");
    };

    let db = Database::open(&settings.server.database_path).context("opening database")?;

    let models = &settings.models;
    let timeout = Duration::from_secs(models.request_timeout_secs);
    let reply_model = ReliableModel::with_defaults(OpenAiModel::new(
        api_key.clone(),
        &models.base_url,
        &models.reply_model,
        timeout,
    )?);
    let tone_model = ReliableModel::with_defaults(OpenAiModel::new(
        api_key.clone(),
        &models.base_url,
        &models.tone_model,
        timeout,
    )?);
    let moderation = OpenAiModeration::new(api_key, &models.base_url, &models.moderation_model, timeout)?;

    tracing::info!(
        reply_model = %models.reply_model,
        tone_model = %models.tone_model,
        moderation_model = %models.moderation_model,
        "upstream clients ready"
    );

    let orchestrator = Arc::new(RoundOrchestrator::new(
        db,
        Arc::new(reply_model),
        Arc::new(tone_model),
        Arc::new(moderation),
        OrchestratorConfig::from(&settings),
    ));

    let config = ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
    };
    let handle = twochairs_server::start(config, AppState::new(orchestrator))
        .await
        .context("starting server")?;

    tracing::info!(port = handle.port, "twochairs server ready");

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl-c")?;

    tracing::info!("shutting down");
    handle.shutdown();
    Ok(())
}
