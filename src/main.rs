use clap::Parser;
use scriptblox_relay::adapters::interactions::{self, InteractionState};
use scriptblox_relay::core::embed::EmbedRenderer;
use scriptblox_relay::core::filter::ScriptFilter;
use scriptblox_relay::core::shutdown::{self, ShutdownState};
use scriptblox_relay::domain::model::CycleOutcome;
use scriptblox_relay::utils::error::ErrorSeverity;
use scriptblox_relay::utils::{logger, validation::Validate};
use scriptblox_relay::{
    CliArgs, DiscordClient, JsonFileStore, RelayConfig, RelayEngine, RelayError,
    ScriptBloxClient, ScriptCodeCache,
};

fn exit_with(e: RelayError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());

    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

fn load_config(args: &CliArgs) -> scriptblox_relay::Result<RelayConfig> {
    let mut config = if args.config_is_explicit() {
        RelayConfig::from_file(args.config_path())?
    } else {
        RelayConfig::from_file_or_default(args.config_path())?
    };

    config.apply_env_overrides();
    args.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting scriptblox-relay v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).unwrap_or_else(|e| exit_with(e));
    if args.verbose {
        tracing::debug!(
            "Feed: {}, channel: {}, posted file: {}",
            config.api_url(),
            config.channel_id(),
            config.posted_file()
        );
    }

    let source = ScriptBloxClient::from_config(&config).unwrap_or_else(|e| exit_with(e));
    let publisher = DiscordClient::from_config(&config).unwrap_or_else(|e| exit_with(e));
    let store = JsonFileStore::new(config.posted_file());

    let shutdown = ShutdownState::new();
    let cache = ScriptCodeCache::default();

    let engine = RelayEngine::new(source, publisher, store)
        .with_filter(ScriptFilter::from_config(&config))
        .with_renderer(EmbedRenderer::from_config(&config))
        .with_cache(cache.clone())
        .with_shutdown(shutdown.clone())
        .with_timing(config.check_interval(), config.post_delay());

    engine.connect().await.unwrap_or_else(|e| exit_with(e));

    if args.once {
        match engine.run_cycle().await {
            CycleOutcome::Completed(report) => {
                tracing::info!(
                    "✅ Cycle complete: {} fetched, {} posted, {} already posted, {} broken, {} failed",
                    report.fetched,
                    report.posted,
                    report.skipped_seen,
                    report.skipped_broken,
                    report.failed
                );
            }
            outcome => tracing::warn!("⚠️ Cycle ended with {:?}", outcome),
        }
        return Ok(());
    }

    let server = if config.interactions_enabled() {
        let public_key = config.interactions.public_key.as_deref().unwrap_or_default();
        let state = InteractionState::from_hex(public_key, cache).unwrap_or_else(|e| exit_with(e));
        let bind = config.interactions_bind().parse()?;
        let listener = interactions::bind(bind)
            .await
            .unwrap_or_else(|e| exit_with(e));
        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = interactions::serve(listener, state, shutdown).await {
                tracing::error!("❌ Interactions endpoint failed: {}", e);
            }
        }))
    } else {
        tracing::info!("Interactions endpoint disabled, posts carry no copy button");
        None
    };

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown::wait_for_signal().await;
            tracing::info!("🛑 Shutdown signal received");
            shutdown.begin();
        });
    }

    engine.run().await;

    if let Some(server) = server {
        server.await?;
    }

    Ok(())
}
