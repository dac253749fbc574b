//! Furnace - treasury exchange and auto-burn indexer.
//!
//! # Usage
//!
//! ```bash
//! # Index only (no burns)
//! TREASURY_ADDRESS=5Grw... furnace
//!
//! # Index and burn, with environment overrides
//! DATABASE_URL=postgres://localhost/furnace WS_URL=ws://localhost:9944 \
//!     TREASURY_ADDRESS=5Grw... TREASURY_SEED="//Alice" furnace
//! ```

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tokio::sync::{Mutex, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};
use tracing_subscriber::{EnvFilter, fmt};

use furnace_core::error::IndexerError;
use furnace_core::memo::{AddressExtractor, DEFAULT_ADDRESS_PATTERNS};
use furnace_core::metrics::init_metrics;
use furnace_core::ports::{BlockSource, LedgerRepository, TransactionSubmitter};
use furnace_core::services::{AutoBurner, BlockProcessor, IndexerConfig, IndexerService};
use furnace_graphql::{ServerConfig, build_schema, serve_with_shutdown};
use furnace_storage::{Database, DatabaseConfig, PgLedgerRepository};
use furnace_substrate::{
    SubstrateClient, SubstrateClientConfig, SubstrateSubmitter, parse_account, to_ss58,
};

/// Furnace CLI - treasury exchange and auto-burn indexer.
#[derive(Parser, Debug)]
#[command(name = "furnace")]
#[command(about = "Furnace - treasury exchange and auto-burn indexer for Substrate chains")]
#[command(version)]
struct Cli {
    /// Substrate node WebSocket URL.
    #[arg(long, env = "WS_URL", default_value = "ws://127.0.0.1:9944")]
    ws_url: String,

    /// PostgreSQL database URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost/furnace"
    )]
    database_url: String,

    /// GraphQL server port.
    #[arg(long, env = "GRAPHQL_PORT", default_value = "4000")]
    graphql_port: u16,

    /// Prometheus metrics port.
    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    metrics_port: u16,

    /// Enable JSON log output.
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Treasury account (SS58 or 0x-prefixed hex).
    #[arg(long, env = "TREASURY_ADDRESS")]
    treasury_address: Option<String>,

    /// Secret URI of the treasury key. Auto-burn is disabled without it.
    #[arg(long, env = "TREASURY_SEED", hide_env_values = true)]
    treasury_seed: Option<String>,

    /// Blocks withheld below the chain head.
    #[arg(long, env = "FINALITY_DEPTH", default_value = "10")]
    finality_depth: u64,

    /// First block to process on an empty ledger.
    #[arg(long, env = "FIRST_BLOCK", default_value = "1")]
    first_block: u64,

    /// Upper bound in seconds for fetching and processing one block.
    #[arg(long, env = "BLOCK_TIMEOUT_SECS", default_value = "10")]
    block_timeout_secs: u64,

    /// Token decimals, overriding the chain properties.
    #[arg(long, env = "TOKEN_DECIMALS")]
    token_decimals: Option<u8>,

    /// Whitespace-separated payment address regexes, tried in order.
    #[arg(long, env = "ADDRESS_PATTERNS")]
    address_patterns: Option<String>,

    /// Run database migrations and exit.
    #[arg(long)]
    migrate_only: bool,

    /// Purge the ledger and exit.
    ///
    /// This deletes all exchanges, burns, errors and warnings, and resets
    /// the checkpoint. The dollar pool size is preserved.
    #[arg(long)]
    purge: bool,

    /// Skip confirmation prompt for destructive operations (like --purge).
    #[arg(long, short = 'y')]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    // Prometheus metrics exporter (optional - failures don't crash the app)
    let metrics_addr = format!("0.0.0.0:{}", cli.metrics_port).parse::<std::net::SocketAddr>();
    let metrics_enabled = match metrics_addr {
        Ok(metrics_addr) => {
            match PrometheusBuilder::new()
                .with_http_listener(metrics_addr)
                .install()
            {
                Ok(()) => {
                    init_metrics();
                    true
                }
                Err(e) => {
                    warn!(
                        "⚠️  Failed to start metrics exporter: {}. Continuing without metrics.",
                        e
                    );
                    false
                }
            }
        }
        Err(e) => {
            warn!("⚠️  Invalid metrics address: {}. Continuing without metrics.", e);
            false
        }
    };

    // ─────────────────────────────────────────────────────────────────────────
    // 🚀 STARTUP
    // ─────────────────────────────────────────────────────────────────────────
    info!("🚀 Starting Furnace");
    debug!(ws_url = %cli.ws_url, "Substrate endpoint");
    debug!(database_url = %mask_password(&cli.database_url), "Database endpoint");

    // ─────────────────────────────────────────────────────────────────────────
    // 🗄️ DATABASE
    // ─────────────────────────────────────────────────────────────────────────
    info!("🗄️  Connecting to database...");
    let db = Database::connect(&DatabaseConfig::for_indexer(&cli.database_url))
        .await
        .context("Failed to connect to database")?;

    db.migrate().await.context("Failed to run migrations")?;
    info!("🗄️  Database ready (migrations applied)");

    if cli.migrate_only {
        info!("🛑 --migrate-only flag set, exiting");
        return Ok(());
    }

    let ledger = Arc::new(PgLedgerRepository::new(&db));

    if cli.purge {
        return handle_purge(ledger.as_ref(), cli.yes).await;
    }

    // Validate configuration before touching the chain
    let treasury = parse_account(
        cli.treasury_address
            .as_deref()
            .context("TREASURY_ADDRESS is required")?,
    )
    .context("Invalid TREASURY_ADDRESS")?;

    let extractor = match &cli.address_patterns {
        Some(patterns) => {
            AddressExtractor::new(&patterns.split_whitespace().collect::<Vec<_>>())?
        }
        None => AddressExtractor::new(DEFAULT_ADDRESS_PATTERNS)?,
    };

    let graphql_db = Database::connect(&DatabaseConfig::for_graphql(&cli.database_url))
        .await
        .context("Failed to create GraphQL database pool")?;
    let graphql_ledger = Arc::new(PgLedgerRepository::new(&graphql_db));

    // ─────────────────────────────────────────────────────────────────────────
    // 📡 SUBSTRATE CONNECTION
    // ─────────────────────────────────────────────────────────────────────────
    info!("📡 Connecting to Substrate node...");
    let substrate_config = SubstrateClientConfig {
        ws_url: cli.ws_url.clone(),
        token_decimals: cli.token_decimals,
    };

    let substrate_client = SubstrateClient::connect(substrate_config)
        .await
        .context("Failed to connect to Substrate node")?;

    let substrate_client = Arc::new(substrate_client);

    let genesis_hash = substrate_client.genesis_hash().await?;
    let finalized = substrate_client.finalized_head().await?;
    let token_decimals = substrate_client
        .token_decimals()
        .await
        .context("Failed to read token decimals")?;

    info!(
        genesis = %genesis_hash,
        head = finalized.number,
        decimals = token_decimals,
        treasury = %to_ss58(&treasury),
        "🔗 Chain connected"
    );

    // ─────────────────────────────────────────────────────────────────────────
    // 🔥 PIPELINE
    // ─────────────────────────────────────────────────────────────────────────
    let processing_lock = Arc::new(Mutex::new(()));
    let burn_lock = Arc::new(Mutex::new(()));

    let burner = match cli.treasury_seed.as_deref() {
        Some(seed) => {
            let submitter =
                SubstrateSubmitter::from_seed(substrate_client.online_client().clone(), seed)
                    .context("Invalid TREASURY_SEED")?;

            let signer = submitter.signer_account();
            if signer != treasury {
                bail!(
                    "TREASURY_SEED signs for {}, not for the treasury {}",
                    to_ss58(&signer),
                    to_ss58(&treasury)
                );
            }

            Some(Arc::new(AutoBurner::new(
                treasury.clone(),
                substrate_client.clone(),
                Arc::new(submitter),
                burn_lock,
            )))
        }
        None => {
            warn!("⚠️  TREASURY_SEED not set, auto-burn disabled");
            None
        }
    };

    let mut processor = BlockProcessor::new(
        treasury,
        token_decimals,
        substrate_client.clone(),
        ledger.clone(),
        extractor,
        processing_lock,
    );
    if let Some(burner) = burner {
        processor = processor.with_burner(burner);
    }

    let indexer_config = IndexerConfig {
        chain_id: genesis_hash.to_hex(),
        finality_depth: cli.finality_depth,
        first_block: cli.first_block,
        block_timeout: Duration::from_secs(cli.block_timeout_secs),
    };

    let indexer = IndexerService::new(
        indexer_config,
        substrate_client.clone(),
        ledger.clone(),
        Arc::new(processor),
    );

    // ─────────────────────────────────────────────────────────────────────────
    // ⚡ SERVICES START
    // ─────────────────────────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut graphql_shutdown_rx = shutdown_tx.subscribe();

    let graphql_config = ServerConfig {
        host: "0.0.0.0".to_string(),
        port: cli.graphql_port,
        enable_playground: true,
    };

    let schema = build_schema(graphql_ledger);
    let graphql_port = cli.graphql_port;
    let graphql_handle = tokio::spawn(
        async move {
            let shutdown_signal = async move {
                while !*graphql_shutdown_rx.borrow() {
                    if graphql_shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
            };

            if let Err(e) = serve_with_shutdown(schema, graphql_config, shutdown_signal).await {
                error!(error = %e, "❌ Server error");
            }
            debug!("Server stopped");
        }
        .instrument(info_span!("graphql")),
    );

    let mut indexer_handle = tokio::spawn(
        async move { indexer.run(shutdown_rx).await }.instrument(info_span!("indexer")),
    );

    // ─────────────────────────────────────────────────────────────────────────
    // ✅ READY
    // ─────────────────────────────────────────────────────────────────────────
    info!("✅ Furnace ready");
    info!("   ⚡ GraphQL:  http://localhost:{}/graphql", graphql_port);
    if metrics_enabled {
        info!(
            "   📊 Metrics:  http://localhost:{}/metrics",
            cli.metrics_port
        );
    } else {
        info!("   📊 Metrics:  disabled");
    }
    info!("   Press Ctrl+C to stop");

    // The indexer stops on its own on the first failed block
    let indexer_result = tokio::select! {
        _ = shutdown_signal() => {
            info!("🛑 Shutting down...");
            let _ = shutdown_tx.send(true);

            match tokio::time::timeout(Duration::from_secs(30), &mut indexer_handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("⚠️  Indexer shutdown timed out");
                    Ok(Ok(()))
                }
            }
        }
        joined = &mut indexer_handle => {
            let _ = shutdown_tx.send(true);
            joined
        }
    };

    // ─────────────────────────────────────────────────────────────────────────
    // 🛑 SHUTDOWN
    // ─────────────────────────────────────────────────────────────────────────
    match tokio::time::timeout(Duration::from_secs(10), graphql_handle).await {
        Ok(_) => debug!("GraphQL stopped"),
        Err(_) => warn!("⚠️  GraphQL shutdown timed out"),
    }

    db.close().await;
    graphql_db.close().await;

    match indexer_result {
        Ok(Ok(())) | Ok(Err(IndexerError::ShutdownRequested)) => {
            info!("🛑 Shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => {
            if e.is_fatal() {
                error!(error = %e, "❌ Indexer halted, operator intervention required");
            } else {
                error!(error = %e, "❌ Indexer stopped");
            }
            Err(anyhow::Error::new(e).context("Indexer stopped on a fatal error"))
        }
        Err(e) => Err(anyhow::Error::new(e).context("Indexer task panicked")),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

/// Mask password in database URL for logging.
fn mask_password(url_str: &str) -> String {
    match url::Url::parse(url_str) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => url_str.to_string(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Handle the --purge command.
async fn handle_purge(ledger: &PgLedgerRepository, skip_confirmation: bool) -> Result<()> {
    warn!("⚠️  PURGE MODE: This will delete ALL ledger records!");
    warn!("   - All exchanges, burns, errors and warnings");
    warn!("   - The checkpoint and chain id will be reset");
    warn!("   - The dollar pool size will be preserved");

    if !skip_confirmation {
        print!("\n🔴 Are you sure you want to purge the ledger? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            info!("❌ Purge cancelled");
            return Ok(());
        }
    }

    info!("🗑️  Purging ledger...");

    let stats = ledger.purge().await.context("Failed to purge ledger")?;

    info!("✅ Ledger purged successfully");
    info!("   💱 Exchanges removed: {}", stats.exchanges_removed);
    info!("   🔥 Burns removed: {}", stats.burns_removed);
    info!("   ❌ Errors removed: {}", stats.errors_removed);
    info!("   ⚠️  Warnings removed: {}", stats.warnings_removed);
    info!("   The indexer will start from FIRST_BLOCK on next run");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["furnace"]);
        assert_eq!(cli.finality_depth, 10);
        assert_eq!(cli.first_block, 1);
        assert_eq!(cli.block_timeout_secs, 10);
    }

    // Test critique: le mot de passe ne doit jamais apparaître dans les logs
    #[test]
    fn password_is_masked() {
        let masked = mask_password("postgres://furnace:s3cret@db:5432/furnace");
        assert!(!masked.contains("s3cret"));
        assert!(masked.contains("****"));

        assert_eq!(mask_password("not a url"), "not a url");
    }
}
