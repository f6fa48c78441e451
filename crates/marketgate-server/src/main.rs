//! MarketGate Server
//!
//! This server provides:
//! - Tenant (market) provisioning from a YAML/TOML file or the built-in set
//! - Live re-provisioning when the tenants file changes
//! - Edge-delivery CORS enforcement checked against registered tenants
//! - Tenant context headers on every content response
//! - Health, readiness and Prometheus metrics endpoints
//!
//! Usage:
//! ```bash
//! # Built-in markets (us, uk, jp)
//! marketgate-server
//!
//! # With a tenants file
//! marketgate-server --tenants tenants.yaml
//!
//! # With a server config (env vars override it, CLI flags override both)
//! MARKETGATE_PORT=9090 marketgate-server --config marketgate.yaml
//!
//! # Validate a tenants file without starting the server
//! marketgate-server check --tenants tenants.yaml
//! ```
//!
//! Test with:
//! ```bash
//! curl -i http://localhost:8080/resolve?path=/content/qsr/uk/menu
//!
//! # Preflight from a registered edge origin
//! curl -i -X OPTIONS http://localhost:8080/tenants \
//!   -H "Origin: https://main--qsr-uk--org.aem.live"
//! ```

mod config;
mod provisioning;

use anyhow::Context;
use axum::{Router, http::Uri};
use clap::{Parser, Subcommand};
use config::{LoggingConfig, ServerConfig};
use marketgate_config_file::FileTenantSource;
use marketgate_core::{TenantProvisioner, TenantRegistry};
use marketgate_ingress::{IngressError, IngressState, tenants, with_tenant_layers};
use marketgate_observability::{HealthState, Metrics, health_router};
use provisioning::{Provisioning, RegistryReadiness};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// MarketGate Server - tenant registry and edge-delivery origin gate
#[derive(Parser)]
#[command(name = "marketgate-server")]
#[command(about = "Multi-market tenant registry with edge-delivery CORS enforcement", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to server configuration file (YAML or TOML)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "MARKETGATE_CONFIG",
        global = true
    )]
    config: Option<PathBuf>,

    /// Path to tenants provisioning file (YAML or TOML)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "MARKETGATE_TENANTS_FILE",
        global = true
    )]
    tenants: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server (default if no command specified)
    Serve,
    /// Validate a tenants file and print the tenants it defines
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };

    // Merge environment variables (they override config file)
    config.merge_env();

    // CLI flags have the highest precedence
    if let Some(tenants) = cli.tenants {
        config.tenants_file = Some(tenants);
    }

    init_tracing(&config.logging)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Check => check(config.tenants_file).await,
    }
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let log_level = match logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => {
            eprintln!("Warning: Unknown log level '{}', using info", other);
            Level::INFO
        }
    };

    let filter = EnvFilter::new(log_level.to_string());
    let builder = FmtSubscriber::builder().with_env_filter(filter);

    if logging.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    info!("Initializing MarketGate");

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    let registry = Arc::new(TenantRegistry::new());
    let provisioner = Arc::new(TenantProvisioner::new(registry.clone()));

    let provisioning = Provisioning::from_config(&config).await?;
    provisioning.initial_sync(&provisioner, &metrics).await?;
    let watcher = provisioning.spawn_watcher(&config, provisioner.clone(), metrics.clone());

    let mut markets: Vec<String> = registry
        .all_tenants()
        .iter()
        .map(|t| t.market().to_string())
        .collect();
    markets.sort();
    info!("Registered {} tenants: {}", markets.len(), markets.join(", "));
    if registry.get_default().is_none() {
        warn!("Default market is not registered; /readyz will report not ready");
    }

    let ingress_state = IngressState::new(registry.clone()).with_metrics(metrics.clone());
    let tenant_routes = tenants::router(ingress_state.clone()).fallback(not_found);

    let health_state = HealthState::new(metrics.clone())
        .with_readiness(Arc::new(RegistryReadiness::new(registry.clone())));

    let app: Router = with_tenant_layers(tenant_routes, ingress_state)
        .merge(health_router(health_state))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("MarketGate listening on http://{}", addr);
    info!("   Tenants:");
    info!("   - List:              http://{}/tenants", addr);
    info!("   - Resolve:           http://{}/resolve?path=...", addr);
    info!("   Observability:");
    info!("   - Health check:       http://{}/healthz", addr);
    info!("   - Readiness check:    http://{}/readyz", addr);
    info!("   - Prometheus metrics: http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(watcher) = watcher {
        watcher.abort();
    }

    info!("Server stopped");
    Ok(())
}

/// Validate a tenants file the same way the server provisions it
async fn check(tenants_file: Option<PathBuf>) -> anyhow::Result<()> {
    let path = tenants_file
        .context("No tenants file given; use --tenants or MARKETGATE_TENANTS_FILE")?;
    let source = FileTenantSource::new(path.clone())
        .await
        .with_context(|| format!("Tenants file {} is not usable", path.display()))?;

    let registry = Arc::new(TenantRegistry::new());
    let report = TenantProvisioner::new(registry.clone())
        .sync(&source)
        .await
        .with_context(|| format!("Tenants file {} is invalid", path.display()))?;

    let mut tenants = registry.all_tenants();
    tenants.sort_by(|a, b| a.market().cmp(b.market()));

    println!(
        "{:<8} {:<8} {:<8} {:<22} {:<34} CONTENT ROOT",
        "MARKET", "LOCALE", "CURRENCY", "TIMEZONE", "EDS HOST"
    );
    for tenant in &tenants {
        println!(
            "{:<8} {:<8} {:<8} {:<22} {:<34} {}",
            tenant.market(),
            tenant.locale(),
            tenant.currency(),
            tenant.timezone(),
            tenant.eds_host(),
            tenant.content_root()
        );
    }

    if registry.get_default().is_none() {
        println!("\nWarning: default market is not defined; the server will report not ready");
    }

    if !report.rejected.is_empty() {
        for (market, reason) in &report.rejected {
            eprintln!("Rejected {}: {}", market, reason);
        }
        anyhow::bail!("{} tenant(s) rejected", report.rejected.len());
    }

    println!("\n{} tenants OK", tenants.len());
    Ok(())
}

async fn not_found(uri: Uri) -> IngressError {
    IngressError::NotFound(uri.path().to_string())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
}
