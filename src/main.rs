//! rewards-gateway server entry point.
//!
//! Wires the store, chain client and broadcaster, starts the poller and the
//! weekly distributor, then serves REST and WebSocket endpoints until a
//! shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rewards_gateway::api;
use rewards_gateway::app_state::AppState;
use rewards_gateway::chain::{
    ChainClientObj, OracleFeed, Poller, PollerSettings, PriceSourceObj, ReservePrice,
    RpcChainClient, Valuator,
};
use rewards_gateway::config::{LogFormat, PriceSourceKind, RewardsConfig, StoreBackend};
use rewards_gateway::domain::RewardRules;
use rewards_gateway::persistence::{MemoryStore, PostgresStore, StoreObj};
use rewards_gateway::service::{CampaignManager, Leaderboard, RewardsLedger, WeeklyDistributor};
use rewards_gateway::ws::{Broadcaster, BroadcasterSettings, ConnectionSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = RewardsConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    init_tracing(config.log_format);
    tracing::info!(addr = %config.listen_addr, "starting rewards-gateway");

    // Storage
    let store = connect_store(&config).await?;

    // Chain access and pricing
    let chain: ChainClientObj = Arc::new(
        RpcChainClient::connect(&config.rpc_url, config.rpc_timeout())
            .await
            .context("connecting to chain RPC")?,
    );
    let prices: PriceSourceObj = match config.price_source {
        PriceSourceKind::Reserves => Arc::new(ReservePrice::new(
            Arc::clone(&chain),
            config.pool_address,
            config.volatile_decimals,
            config.stable_decimals,
        )),
        PriceSourceKind::Oracle => Arc::new(OracleFeed::new(
            Arc::clone(&chain),
            config.oracle_address,
            config.oracle_decimals,
        )),
    };
    tracing::info!(source = prices.name(), pool = %config.pool_address, "price source ready");

    // Service layer
    let (broadcaster, dispatch) = Broadcaster::start(BroadcasterSettings {
        control_capacity: config.broadcast_control_capacity,
        client_buffer: config.ws_client_buffer,
    });
    let rules = RewardRules::default();
    let leaderboard = Leaderboard::new(Arc::clone(&store), config.leaderboard_broadcast_limit);
    let campaigns = CampaignManager::new(Arc::clone(&store), broadcaster.clone());
    if config.campaign_auto_start {
        campaigns
            .ensure_campaign(Utc::now(), config.campaign_weeks)
            .await
            .context("starting campaign")?;
    }
    let ledger = Arc::new(RewardsLedger::new(
        Arc::clone(&store),
        leaderboard.clone(),
        broadcaster.clone(),
        rules.clone(),
    ));

    // Background pipeline
    let shutdown = CancellationToken::new();
    let poller = Poller::new(
        Arc::clone(&chain),
        Valuator::new(
            Arc::clone(&prices),
            config.volatile_decimals,
            config.stable_decimals,
        ),
        ledger,
        PollerSettings {
            pool_address: config.pool_address,
            interval: config.poll_interval(),
            lookback_blocks: config.poll_lookback_blocks,
            max_block_range: config.poll_max_block_range,
        },
    );
    let distributor = WeeklyDistributor::new(
        Arc::clone(&store),
        leaderboard.clone(),
        campaigns.clone(),
        broadcaster.clone(),
        rules.clone(),
        config.distribution_check_interval(),
    );
    let poller_task = tokio::spawn(poller.run(shutdown.child_token()));
    let distributor_task = tokio::spawn(distributor.run(shutdown.child_token()));

    // HTTP surface
    let app = api::build_app(AppState {
        store,
        leaderboard,
        campaigns,
        broadcaster: broadcaster.clone(),
        chain,
        prices,
        rules,
        ws_settings: ConnectionSettings {
            ping_interval: Duration::from_secs(config.ws_ping_interval_secs),
            read_timeout: Duration::from_secs(config.ws_pong_timeout_secs),
            write_timeout: Duration::from_secs(config.ws_write_timeout_secs),
            max_message_bytes: config.ws_max_message_bytes,
        },
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone(), broadcaster))
        .await?;

    for (name, task) in [
        ("poller", poller_task),
        ("distributor", distributor_task),
        ("broadcaster", dispatch),
    ] {
        if let Err(e) = task.await {
            tracing::error!(task = name, error = %e, "background task panicked");
        }
    }
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn connect_store(config: &RewardsConfig) -> anyhow::Result<StoreObj> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .min_connections(config.database_min_connections)
                .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
                .connect(&config.database_url)
                .await
                .context("connecting to database")?;
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("applying migrations")?;
            tracing::info!("database ready");
            Ok(Arc::new(PostgresStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("in-memory store selected, state is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM, after stopping the pipeline and closing
/// every WebSocket client so the server can drain.
async fn shutdown_signal(shutdown: CancellationToken, broadcaster: Broadcaster) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
    shutdown.cancel();
    broadcaster.shutdown();
}
