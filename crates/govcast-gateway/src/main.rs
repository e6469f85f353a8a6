use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use govcast_core::GovcastConfig;
use govcast_gateway::app::{self, AppState};

/// Real-time governance event broadcast gateway.
#[derive(Debug, Parser)]
#[command(name = "govcast-gateway", version)]
struct Cli {
    /// Config file (defaults to ./govcast.toml when present).
    #[arg(long, short, env = "GOVCAST_CONFIG")]
    config: Option<String>,

    /// Override `server.bind`.
    #[arg(long)]
    bind: Option<String>,

    /// Override `server.port`.
    #[arg(long, short)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "govcast_gateway=info,govcast_hub=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    let mut config =
        GovcastConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if config.auth.jwt_secret.is_none() {
        warn!("auth.jwt_secret not set, every client connects anonymously");
    }
    if config.ingest.token.is_none() {
        warn!("ingest.token not set, POST /internal/events is disabled");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("invalid bind address")?;
    let shutdown_timeout = config.server.shutdown_timeout();

    let state = Arc::new(AppState::new(config));
    let router = app::build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        %addr,
        version = env!("CARGO_PKG_VERSION"),
        build = env!("GOVCAST_GIT_SHA"),
        "govcast gateway listening"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    // Stop accepting first, then drain the sockets that are still open.
    let drain = {
        let state = state.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            state.manager.shutdown(shutdown_timeout).await
        })
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("server error")?;

    let report = drain.await.context("shutdown task panicked")?;
    info!(
        notified = report.notified,
        drained = report.drained,
        forced = report.forced,
        "shutdown complete"
    );
    Ok(())
}

async fn watch_signals(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
    token.cancel();
}
