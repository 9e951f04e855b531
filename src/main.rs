//! Civo CSI
//!
//! Controller plugin provisioning Civo block storage volumes for a container
//! orchestrator.
//!
//! ```text
//! civo-csi [serve]                          listen on the endpoint, expose health and metrics
//! civo-csi create-volume --name pvc-1 ...   one-shot idempotent provisioning
//! civo-csi capabilities                     advertised plugin and controller capabilities
//! ```

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use civo_csi::{
    AccessMode, BackendConfig, CapacityRange, CivoConfig, Controller, CreateVolumeRequest,
    Driver, DriverConfig, Endpoint, Error, Identity, PollConfig, ProvisionMetrics, Result,
    StorageBackend, VolumeCapability, DEFAULT_DRIVER_NAME,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Civo CSI - block volume provisioning plugin
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Endpoint the plugin services are served on
    #[arg(
        long,
        env = "CSI_ENDPOINT",
        default_value = "unix:///var/lib/csi/sockets/pluginproxy/csi.sock"
    )]
    endpoint: String,

    /// Civo API key (falls back to API_KEY)
    #[arg(long, env = "CIVO_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Region volumes are created in
    #[arg(long, env = "CIVO_REGION", default_value = "LON1")]
    region: String,

    /// Civo API base URL
    #[arg(long, env = "CIVO_API_URL", default_value = "https://api.civo.com")]
    api_url: String,

    /// Plugin name reported by GetPluginInfo
    #[arg(long, env = "DRIVER_NAME", default_value = DEFAULT_DRIVER_NAME)]
    driver_name: String,

    /// Seconds to wait before each availability check
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "5")]
    poll_interval_secs: u64,

    /// Availability checks before giving up
    #[arg(long, env = "AVAILABILITY_RETRIES", default_value = "20")]
    availability_retries: u32,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Run against the in-memory backend (no Civo account)
    #[arg(long, env = "STANDALONE")]
    standalone: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Listen on the endpoint and run until interrupted
    Serve,
    /// Provision one volume and print the result as JSON
    CreateVolume {
        /// Volume name, the idempotency key
        #[arg(long)]
        name: String,
        /// Minimum capacity in bytes
        #[arg(long, default_value = "0")]
        required_bytes: i64,
        /// Maximum capacity in bytes
        #[arg(long, default_value = "0")]
        limit_bytes: i64,
    },
    /// Print advertised capabilities as JSON
    Capabilities,
}

impl Args {
    /// Driver settings for the selected subcommand
    fn command_config(&self) -> Result<DriverConfig> {
        match self.command {
            // Capabilities are static; no backend account needed
            Some(Command::Capabilities) => self.driver_config(true),
            _ => self.driver_config(self.standalone),
        }
    }

    fn driver_config(&self, standalone: bool) -> Result<DriverConfig> {
        let api_key = self
            .api_key
            .clone()
            .or_else(|| std::env::var("API_KEY").ok())
            .unwrap_or_default();

        if api_key.is_empty() && !standalone {
            return Err(Error::Configuration(
                "an API key is required (CIVO_API_KEY or API_KEY), or run with --standalone".into(),
            ));
        }

        Ok(DriverConfig {
            driver_name: self.driver_name.clone(),
            backend_kind: if standalone { "memory" } else { "civo" }.to_string(),
            backend: BackendConfig {
                civo: CivoConfig {
                    api_url: self.api_url.clone(),
                    api_key,
                    region: self.region.clone(),
                    ..Default::default()
                },
            },
            poll: PollConfig {
                interval: Duration::from_secs(self.poll_interval_secs),
                max_attempts: self.availability_retries,
            },
        })
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    let config = args.command_config()?;

    match &args.command {
        None | Some(Command::Serve) => serve(&args, config).await,
        Some(Command::CreateVolume {
            name,
            required_bytes,
            limit_bytes,
        }) => create_volume(config, name, *required_bytes, *limit_bytes).await,
        Some(Command::Capabilities) => capabilities(config).await,
    }
}

async fn serve(args: &Args, config: DriverConfig) -> Result<()> {
    info!("Starting {} plugin", civo_csi::NAME);
    info!("  Version: {}", civo_csi::VERSION);
    info!("  Driver: {}", config.driver_name);
    info!("  Region: {}", config.backend.civo.region);
    info!("  Standalone mode: {}", args.standalone);

    let endpoint = Endpoint::parse(&args.endpoint)?;

    let metrics = Arc::new(ProvisionMetrics::new()?);
    let driver = config.build(Some(metrics.clone()))?;

    // Start health server
    let health_addr = args.health_addr.clone();
    let health_driver = driver.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr, health_driver).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, metrics).await {
            error!("Metrics server error: {}", e);
        }
    });

    // Held until shutdown; readiness is only reported while it is bound
    let listener = endpoint.bind()?;

    match driver.reconciler().backend().health_check().await {
        Ok(true) => driver.set_ready(true),
        Ok(false) => warn!("Storage backend reported unhealthy; staying not ready"),
        Err(e) => warn!(error = %e, "Storage backend health check failed; staying not ready"),
    }

    info!(endpoint = %endpoint, ready = driver.is_ready(), "Plugin services available");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    driver.shutdown();
    drop(listener);
    endpoint.prepare()?;

    info!("Plugin shutdown complete");
    Ok(())
}

async fn create_volume(
    config: DriverConfig,
    name: &str,
    required_bytes: i64,
    limit_bytes: i64,
) -> Result<()> {
    let driver = config.build(None)?;

    let interrupt = driver.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.shutdown();
        }
    });

    let request = CreateVolumeRequest {
        name: name.to_string(),
        capacity_range: Some(CapacityRange {
            required_bytes,
            limit_bytes,
        }),
        volume_capabilities: vec![VolumeCapability::mount(AccessMode::SingleNodeWriter)],
        ..Default::default()
    };

    let response = driver
        .create_volume(request)
        .await
        .map_err(|status| Error::Internal(format!("{:?}: {}", status.code(), status.message())))?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn capabilities(config: DriverConfig) -> Result<()> {
    let driver = config.build(None)?;
    let to_error = |status: tonic::Status| Error::Internal(status.message().to_string());

    let output = serde_json::json!({
        "plugin": driver.get_plugin_info().await.map_err(to_error)?,
        "plugin_capabilities": driver.get_plugin_capabilities().await.map_err(to_error)?,
        "controller_capabilities": driver.controller_get_capabilities().await.map_err(to_error)?,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=info", "h2=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Logs go to stderr so create-volume output stays parseable
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

// =============================================================================
// Health Server
// =============================================================================

fn health_response(
    path: &str,
    driver: &Driver,
) -> std::result::Result<hyper::Response<hyper::Body>, hyper::http::Error> {
    use hyper::{Body, Response, StatusCode};

    match path {
        "/healthz" | "/livez" => Response::builder()
            .status(StatusCode::OK)
            .body(Body::from("ok")),
        "/readyz" if driver.is_ready() => Response::builder()
            .status(StatusCode::OK)
            .body(Body::from("ok")),
        "/readyz" => Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .body(Body::from("not ready")),
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("not found")),
    }
}

async fn run_health_server(addr: &str, driver: Arc<Driver>) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server};

    let make_svc = make_service_fn(move |_conn| {
        let driver = driver.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let driver = driver.clone();
                async move { health_response(req.uri().path(), &driver) }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid health server address: {}", e))
    })?;

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

fn metrics_response(
    path: &str,
    metrics: &ProvisionMetrics,
) -> std::result::Result<hyper::Response<hyper::Body>, hyper::http::Error> {
    use hyper::{Body, Response, StatusCode};

    match path {
        "/metrics" => match metrics.encode() {
            Ok((buffer, content_type)) => Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", content_type)
                .body(Body::from(buffer)),
            Err(e) => {
                error!("Encoding metrics failed: {}", e);
                Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Body::from("metrics unavailable"))
            }
        },
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("not found")),
    }
}

async fn run_metrics_server(addr: &str, metrics: Arc<ProvisionMetrics>) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server};

    let make_svc = make_service_fn(move |_conn| {
        let metrics = metrics.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let metrics = metrics.clone();
                async move { metrics_response(req.uri().path(), &metrics) }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid metrics server address: {}", e))
    })?;

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}
