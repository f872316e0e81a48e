use clap::Parser;
use radius_proxy::proxy::{DeviceRegistry, LoadStatus, PoolStore};
use radius_proxy::{Config, ConfigError, RadiusProxy, TrafficClass};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// RADIUS Pool Proxy - load-balancing RADIUS forwarder for managed access points
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "radius-proxy")]
struct Cli {
    /// Path to configuration file
    #[arg(value_name = "CONFIG", default_value = "radius-proxy.json")]
    config_path: PathBuf,

    /// Directory holding the pool document
    #[arg(long, env = "RADIUS_PROXY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Authentication port
    #[arg(long, env = "RADIUS_PROXY_AUTH_PORT")]
    auth_port: Option<u16>,

    /// Accounting port
    #[arg(long, env = "RADIUS_PROXY_ACCT_PORT")]
    acct_port: Option<u16>,

    /// Validate configuration and pool document and exit
    #[arg(long)]
    validate: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(ref dir) = self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(port) = self.auth_port {
            config.authentication_port = port;
        }
        if let Some(port) = self.acct_port {
            config.accounting_port = port;
        }
    }
}

/// Registry used when the proxy runs standalone: records who sent what.
struct LoggingRegistry;

impl DeviceRegistry for LoggingRegistry {
    fn submit_accounting(&self, device_id: &str, packet: &[u8]) {
        log_submission(TrafficClass::Accounting, device_id, packet);
    }

    fn submit_authentication(&self, device_id: &str, packet: &[u8]) {
        log_submission(TrafficClass::Authentication, device_id, packet);
    }
}

fn log_submission(class: TrafficClass, device_id: &str, packet: &[u8]) {
    if device_id.is_empty() {
        debug!(class = %class, len = packet.len(), "Packet from unidentified device");
    } else {
        info!(class = %class, device = %device_id, len = packet.len(), "Packet from device");
    }
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = match Config::from_file(&cli.config_path) {
        Ok(config) => config,
        Err(ConfigError::Io(e)) if e.kind() == ErrorKind::NotFound && !cli.validate => {
            let config = Config::default();
            config.to_file(&cli.config_path)?;
            eprintln!("Created default configuration at {}", cli.config_path.display());
            config
        }
        Err(e) => return Err(e),
    };
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn validate(config: &Config) -> ! {
    let store = PoolStore::new(&config.data_dir);
    let status = match store.load() {
        Ok(status) => status,
        Err(e) => {
            eprintln!("Pool document validation failed: {}", e);
            process::exit(1);
        }
    };

    println!("Configuration validated successfully");
    println!("  Data directory: {}", config.data_dir.display());
    println!("  Authentication port: {}", config.authentication_port);
    println!("  Accounting port: {}", config.accounting_port);
    println!("  IPv6: {}", if config.enable_ipv6 { "enabled" } else { "disabled" });
    match status {
        LoadStatus::Loaded { pools } => {
            println!("  Pools: {} ({} derived)", pools, store.snapshot().pool_count())
        }
        LoadStatus::NotFound => println!("  Pools: none ({} not found)", store.path().display()),
    }
    process::exit(0);
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    if cli.validate {
        validate(&config);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("RADIUS Pool Proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from: {}", cli.config_path.display());

    let store = Arc::new(PoolStore::new(&config.data_dir));
    match store.load() {
        Ok(LoadStatus::Loaded { pools }) => info!(pools = pools, "Routing through configured pools"),
        Ok(LoadStatus::NotFound) => info!("No pools configured, all traffic passes through"),
        Err(e) => warn!(error = %e, "Starting without pools"),
    }

    let proxy = match RadiusProxy::start(&config, store, Arc::new(LoggingRegistry)) {
        Ok(proxy) => proxy,
        Err(e) => {
            error!("Failed to start proxy: {}", e);
            process::exit(1);
        }
    };

    info!("Press Ctrl+C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    match tokio::task::spawn_blocking(move || proxy.stop()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("Shutdown error: {}", e);
            process::exit(1);
        }
        Err(e) => {
            error!("Shutdown task failed: {}", e);
            process::exit(1);
        }
    }
}
