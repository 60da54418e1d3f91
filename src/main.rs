//! Metasearch-MCP: web search and scraping tools for MCP clients
//!
//! Logs go to stderr; stdout is reserved for the protocol on the stdio
//! transport. `RUST_LOG` controls verbosity (default: `metasearch_mcp=info`).

use anyhow::Result;
use clap::Parser;
use metasearch_mcp::{
    config::{Settings, Transport},
    engines::{EngineError, EngineLoader},
    network::HttpClient,
    web::{self, AppState},
    Error, McpServer,
};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// MCP server exposing web search and scraping tools
#[derive(Parser)]
#[command(name = "metasearch-mcp")]
#[command(version)]
struct Args {
    /// Path to settings.yml
    #[arg(short, long, env = "METASEARCH_SETTINGS_PATH")]
    config: Option<PathBuf>,

    /// Preferred engine (serper, serpapi)
    #[arg(short, long)]
    engine: Option<String>,

    /// Transport to serve on (stdio, http)
    #[arg(short, long)]
    transport: Option<Transport>,

    /// Port for the http transport
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address for the http transport
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("metasearch_mcp=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut settings = load_settings(args.config.as_ref())?;
    if let Some(engine) = args.engine {
        settings.selection.preferred = Some(engine);
    }
    if let Some(transport) = args.transport {
        settings.server.transport = transport;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(bind) = args.bind {
        settings.server.bind_address = bind;
    }

    info!(
        "Starting {} v{}",
        settings.server.name,
        metasearch_mcp::VERSION
    );

    let client = HttpClient::with_settings(&settings.outgoing)?;
    let report = EngineLoader::load(&settings, &client);
    if !report.failures.is_empty() {
        warn!(
            "{} of {} engines failed to initialize",
            report.failures.len(),
            EngineLoader::PROVIDERS.len()
        );
    }

    let server = match McpServer::from_registry(&report.registry, &settings) {
        Ok(server) => Arc::new(server),
        Err(Error::Engine(EngineError::NoEngineAvailable)) => {
            anyhow::bail!(
                "No search engines available. Set SERPER_API_KEY or SERPAPI_API_KEY."
            );
        }
        Err(e) => return Err(e.into()),
    };

    let dispatcher = Arc::clone(server.dispatcher());
    match settings.server.transport {
        Transport::Stdio => {
            info!(
                "Starting Multi-Search MCP Server with {} engine...",
                dispatcher.engine().name()
            );
            server.run_stdio().await?;
        }
        Transport::Http => {
            let ip: IpAddr = settings.server.bind_address.parse().map_err(Error::from)?;
            let addr = SocketAddr::new(ip, settings.server.port);
            web::serve(AppState::new(server), addr).await?;
        }
    }

    let snapshot = dispatcher.metrics().snapshot();
    info!(
        "Served {} tool calls ({} from cache)",
        snapshot.total_calls, snapshot.cache_hits
    );
    Ok(())
}

/// Load settings from the first file found, apply the environment and validate
fn load_settings(explicit: Option<&PathBuf>) -> Result<Settings> {
    let mut settings = match explicit {
        Some(path) => {
            info!("Loading settings from: {}", path.display());
            Settings::from_file(path)?
        }
        None => {
            let candidates = [
                Some(PathBuf::from("settings.yml")),
                Some(PathBuf::from("config/settings.yml")),
                dirs::config_dir().map(|p| p.join("metasearch-mcp/settings.yml")),
            ];

            match candidates.into_iter().flatten().find(|p| p.exists()) {
                Some(path) => {
                    info!("Loading settings from: {}", path.display());
                    Settings::from_file(&path)?
                }
                None => {
                    info!("No settings file found, using defaults");
                    Settings::default()
                }
            }
        }
    };

    settings.merge_env();
    settings.validate()?;
    Ok(settings)
}
