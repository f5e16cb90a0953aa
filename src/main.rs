use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use clap::Parser;
use tracing::info;

use mirth_channel_exporter::client::MirthClient;
use mirth_channel_exporter::collect::Collector;
use mirth_channel_exporter::config::Config;
use mirth_channel_exporter::metrics::ExporterMetrics;
use mirth_channel_exporter::server::{self, App};

const SERVICE_NAME: &str = "mirth-channel-exporter";

#[derive(Parser)]
#[clap(name = SERVICE_NAME)]
#[clap(about = "Prometheus exporter for Mirth Connect channel metrics")]
struct Cli {
    /// Address to listen on for telemetry
    #[clap(long = "web.listen-address", default_value = "0.0.0.0:9141")]
    listen_address: SocketAddr,

    /// Path under which to expose metrics
    #[clap(long = "web.telemetry-path", default_value = "/metrics")]
    telemetry_path: String,

    /// Base URL of the Mirth Connect management API
    #[clap(long, env = "MIRTH_ENDPOINT")]
    mirth_endpoint: String,

    /// User for HTTP Basic authentication against the management API
    #[clap(long, env = "MIRTH_USERNAME")]
    mirth_username: String,

    #[clap(long, env = "MIRTH_PASSWORD", hide_env_values = true)]
    mirth_password: String,

    /// Connect timeout towards the engine, in seconds
    #[clap(long, default_value_t = Config::default().http_connect_timeout_secs)]
    http_connect_timeout_secs: u64,

    /// Per-request timeout towards the engine, in seconds
    #[clap(long, default_value_t = Config::default().http_request_timeout_secs)]
    http_request_timeout_secs: u64,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            listen_address: cli.listen_address,
            telemetry_path: cli.telemetry_path,
            mirth_endpoint: cli.mirth_endpoint,
            mirth_username: cli.mirth_username,
            mirth_password: cli.mirth_password,
            http_connect_timeout_secs: cli.http_connect_timeout_secs,
            http_request_timeout_secs: cli.http_request_timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .finish(),
    )
    .expect("failed to set global subscriber");

    // Credentials may come from a local .env file; a missing file just means
    // the process environment is already set up.
    if dotenv::dotenv().is_err() {
        info!("no .env file found, using the process environment");
    }

    let cli = Cli::parse();
    let config = Config::from(cli);

    let client = MirthClient::new(&config).context("failed to build the Mirth client")?;
    let app = Arc::new(App {
        collector: Collector::new(client),
        metrics: ExporterMetrics::new(),
        telemetry_path: config.telemetry_path.clone(),
    });

    info!(
        msg = format!("starting {SERVICE_NAME}").as_str(),
        listen_address = config.listen_address.to_string().as_str(),
        telemetry_path = config.telemetry_path.as_str(),
        mirth_endpoint = config.mirth_endpoint.as_str(),
    );

    let listener = tokio::net::TcpListener::bind(config.listen_address)
        .await
        .context("failed to bind the listen address")?;
    axum::serve(listener, server::router(app))
        .await
        .context(format!("{SERVICE_NAME} failed to run"))?;

    Ok(())
}
