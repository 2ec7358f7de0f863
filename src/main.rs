use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tenantgate::api::{ApiServer, PKG_NAME, VERSION};
use tenantgate::config::Config;
use tenantgate::registry::RegistrationCoordinator;
use tenantgate::reload::ReloadTrigger;
use tenantgate::store::ConfigStore;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tenantgate=debug".parse().expect("valid log directive")),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TENANTGATE_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path.display(), error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        name = PKG_NAME,
        version = VERSION,
        path = %config_path.display(),
        base_domain = %config.base_domain,
        caddyfile = %config.caddyfile,
        services = config.services.len(),
        "Configuration loaded"
    );

    if config.reload_command.is_none() {
        warn!("No reload command configured; the proxy must watch the config file itself");
    }

    let reload = ReloadTrigger::new(config.reload_command.clone(), config.reload_timeout());
    let coordinator = Arc::new(RegistrationCoordinator::new(
        ConfigStore::new(&config.caddyfile),
        config.catalog(),
        config.base_domain.clone(),
        config.default_service.clone(),
        reload,
    ));

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let bind_addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let server = ApiServer::bind(bind_addr, coordinator, shutdown_rx).await?;
    server.run().await?;

    info!("Shutdown complete");
    Ok(())
}
