// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{routing::get, Router};
use kube::Client;
use kube_lease_manager::LeaseManagerBuilder;
use persona::{
    constants::{
        DEFAULT_LEASE_DURATION_SECS, DEFAULT_LEASE_GRACE_SECS, METRICS_SERVER_BIND_ADDRESS,
        METRICS_SERVER_PATH, METRICS_SERVER_PORT, TOKIO_WORKER_THREADS,
    },
    context::{Context, Settings},
    dynamic_cert::DynamicCertProvider,
    metrics,
    proxy::ProxyLifecycle,
    proxy_server::{upstream_from_kube_config, TlsRelayProxyServer},
    runtime::{run_sync_loop, spawn_watchers},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("persona-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format
///
/// Respects `RUST_LOG` environment variable if set, otherwise defaults to INFO level.
/// Respects `RUST_LOG_FORMAT` environment variable for output format (json or text).
fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting Persona impersonation proxy controller");
}

/// Start the Prometheus metrics HTTP server
///
/// Serves metrics on the configured port and path (default: 0.0.0.0:8080/metrics)
fn start_metrics_server() -> tokio::task::JoinHandle<()> {
    info!(
        bind_address = METRICS_SERVER_BIND_ADDRESS,
        port = METRICS_SERVER_PORT,
        path = METRICS_SERVER_PATH,
        "Starting Prometheus metrics HTTP server"
    );

    tokio::spawn(async move {
        async fn metrics_handler() -> String {
            match metrics::gather_metrics() {
                Ok(metrics_text) => metrics_text,
                Err(e) => {
                    error!("Failed to gather metrics: {}", e);
                    String::from("# Error gathering metrics\n")
                }
            }
        }

        let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));

        let bind_addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}");
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind metrics server to {bind_addr}: {e}");
                return;
            }
        };

        info!("Metrics server listening on http://{bind_addr}{METRICS_SERVER_PATH}");

        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {e}");
        }
    })
}

/// Leader election configuration
struct LeaderElectionConfig {
    enabled: bool,
    lease_name: String,
    lease_namespace: String,
    identity: String,
    lease_duration: u64,
    lease_grace: u64,
}

/// Load leader election configuration from environment variables
fn load_leader_election_config(settings: &Settings) -> LeaderElectionConfig {
    let enabled = std::env::var("PERSONA_ENABLE_LEADER_ELECTION")
        .unwrap_or_else(|_| "true".to_string())
        .parse::<bool>()
        .unwrap_or(true);

    let lease_name =
        std::env::var("PERSONA_LEASE_NAME").unwrap_or_else(|_| "persona-leader".to_string());

    let lease_namespace = std::env::var("PERSONA_LEASE_NAMESPACE")
        .unwrap_or_else(|_| settings.namespace.clone());

    let lease_duration = std::env::var("PERSONA_LEASE_DURATION_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_DURATION_SECS);

    let lease_grace = std::env::var("PERSONA_LEASE_GRACE_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_GRACE_SECS);

    let identity = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("persona-{}", rand::random::<u32>()));

    LeaderElectionConfig {
        enabled,
        lease_name,
        lease_namespace,
        identity,
        lease_duration,
        lease_grace,
    }
}

async fn async_main() -> Result<()> {
    initialize_logging();

    // The proxy server and the kube client both build rustls configs; pick
    // one process-wide crypto provider before either does.
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider was already installed");
    }

    let kube_config = kube::Config::infer().await?;
    let upstream = upstream_from_kube_config(&kube_config)?;
    let client = Client::try_from(kube_config)?;
    let settings = Settings::from_env();

    info!(
        namespace = %settings.namespace,
        credential_issuer = %settings.credential_issuer_name,
        "Loaded controller settings"
    );

    let _metrics_handle = start_metrics_server();

    // The trigger channel is the controller's work queue: watchers, the
    // proxy supervisor, and the startup kick all feed it.
    let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();

    let leaf_provider = DynamicCertProvider::new("impersonation-proxy-serving-cert");
    let signer_provider = DynamicCertProvider::new("impersonation-proxy-signer-ca");
    let proxy = ProxyLifecycle::new(
        TlsRelayProxyServer::factory(upstream),
        leaf_provider.clone(),
        signer_provider.clone(),
        trigger_tx.clone(),
    );

    let ctx = Arc::new(Context::new(
        client.clone(),
        settings.clone(),
        leaf_provider,
        signer_provider,
        proxy,
    ));

    let config = load_leader_election_config(&settings);

    if config.enabled {
        info!(
            lease_name = %config.lease_name,
            lease_namespace = %config.lease_namespace,
            identity = %config.identity,
            lease_duration_secs = config.lease_duration,
            "Leader election enabled, waiting to acquire leadership..."
        );

        let lease_manager = LeaseManagerBuilder::new(client.clone(), &config.lease_name)
            .with_namespace(&config.lease_namespace)
            .with_identity(&config.identity)
            .with_duration(config.lease_duration)
            .with_grace(config.lease_grace)
            .build()
            .await?;

        let (leader_rx, _lease_handle) = lease_manager.watch().await;

        let mut rx = leader_rx.clone();
        while !*rx.borrow_and_update() {
            rx.changed().await?;
        }

        info!("Leadership acquired, starting controller");
        run_controller(ctx, trigger_tx, trigger_rx, Some(leader_rx)).await
    } else {
        warn!("Leader election DISABLED - running without high availability");
        run_controller(ctx, trigger_tx, trigger_rx, None).await
    }
}

/// Monitor leadership status - returns when leadership is lost or an error occurs
async fn monitor_leadership(mut leader_rx: tokio::sync::watch::Receiver<bool>) -> Result<()> {
    loop {
        leader_rx.changed().await?;
        if !*leader_rx.borrow() {
            return Ok(());
        }
    }
}

/// Run the watchers and the sync loop until a shutdown condition.
async fn run_controller(
    ctx: Arc<Context>,
    trigger_tx: mpsc::UnboundedSender<()>,
    trigger_rx: mpsc::UnboundedReceiver<()>,
    leader_rx: Option<tokio::sync::watch::Receiver<bool>>,
) -> Result<()> {
    spawn_watchers(&ctx, &trigger_tx);

    // Kick one sync immediately: the CredentialIssuer may not exist yet and
    // that still needs reporting.
    let _ = trigger_tx.send(());

    let shutdown_result: Result<()> = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }

        result = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                sigterm.recv().await;
                Ok::<(), anyhow::Error>(())
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
                Ok::<(), anyhow::Error>(())
            }
        } => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            result
        }

        result = async {
            match leader_rx {
                Some(rx) => monitor_leadership(rx).await,
                None => std::future::pending().await,
            }
        } => {
            warn!("Leadership lost, shutting down controller");
            result
        }

        () = run_sync_loop(Arc::clone(&ctx), trigger_rx) => {
            error!("CRITICAL: sync loop exited unexpectedly");
            anyhow::bail!("sync loop exited unexpectedly")
        }
    };

    // Stop serving before the process goes away so clients see clean closes.
    ctx.proxy.ensure_stopped().await;

    shutdown_result?;
    info!("Graceful shutdown completed successfully");
    Ok(())
}
