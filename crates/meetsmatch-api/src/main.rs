//! `MeetsMatch` match service
//!
//! gRPC server for candidate discovery and the pairwise match lifecycle.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{debug, info};

use meetsmatch_core::config::{default_database_path, load_config};
use meetsmatch_core::tracing_init::{default_directive, init_tracing};
use meetsmatch_proto::v1::match_service_server::MatchServiceServer;

use meetsmatch_api::cache::MemoryStore;
use meetsmatch_api::gateway::MatchGateway;
use meetsmatch_api::server::MatchServiceImpl;
use meetsmatch_api::storage::MatchDatabase;

/// How often expired cache entries are swept from memory.
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "meetsmatch-api")]
#[command(version, about = "MeetsMatch match service - discovery and match lifecycle")]
struct Args {
    /// Address to listen on. Overrides the configured address.
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Path to SQLite database file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Extra settings file layered over the global one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    init_tracing(
        &default_directive(env!("CARGO_PKG_NAME"), &config.server.log_level),
        args.log_json,
    )?;

    let addr = match args.addr {
        Some(addr) => addr,
        None => config
            .server
            .addr
            .parse()
            .with_context(|| format!("Invalid listen address {:?}", config.server.addr))?,
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        %addr,
        "Starting meetsmatch-api"
    );

    let db_path = args
        .db_path
        .or_else(|| config.server.database_path.clone())
        .or_else(default_database_path)
        .ok_or_else(|| anyhow::anyhow!("Cannot determine database path"))?;
    info!(path = %db_path.display(), "Opening match database");
    let db = MatchDatabase::open(&db_path).await?;

    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MatchGateway::from_config(db, Arc::<MemoryStore>::clone(&store), &config));
    gateway
        .cache()
        .warm(&config.feature_flags, &config.common_responses)
        .await;

    let shutdown = CancellationToken::new();

    let purge_store = Arc::clone(&store);
    let purge_token = shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
        interval.tick().await; // Skip first immediate tick
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = purge_store.purge_expired();
                    if removed > 0 {
                        debug!(removed, "Purged expired cache entries");
                    }
                }
                () = purge_token.cancelled() => break,
            }
        }
    });

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<MatchServiceServer<MatchServiceImpl>>()
        .await;

    let service = MatchServiceImpl::new(Arc::clone(&gateway), shutdown.clone());

    info!(%addr, "Match service listening");
    Server::builder()
        .http2_keepalive_interval(Some(Duration::from_secs(30)))
        .http2_keepalive_timeout(Some(Duration::from_secs(10)))
        .add_service(health_service)
        .add_service(MatchServiceServer::new(service))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await?;

    shutdown.cancel();
    gateway.activity().shutdown().await;
    info!("Match service stopped");
    Ok(())
}
