use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pulsetic_operator::config::{
    OperatorConfig, DEFAULT_ANNOTATION_PREFIX, DEFAULT_API_URL,
    DEFAULT_CLUSTER_RESOURCE_NAMESPACE,
};
use pulsetic_operator::controller::{self, Context, ControllerOptions, KubeRecorder, KubeStore};
use pulsetic_operator::{telemetry, Error};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version information
    Version,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Base URL of the Pulsetic API
    #[arg(long, env = "PULSETIC_API", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Namespace of Account API key secrets when the reference does not name one
    #[arg(
        long,
        env = "CLUSTER_RESOURCE_NAMESPACE",
        default_value = DEFAULT_CLUSTER_RESOURCE_NAMESPACE
    )]
    cluster_resource_namespace: String,

    /// Prefix of the annotations read from Ingress and HTTPRoute objects
    #[arg(long, env = "ANNOTATION_PREFIX", default_value = DEFAULT_ANNOTATION_PREFIX)]
    annotation_prefix: String,

    /// Listen address of the health and metrics endpoint
    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:8080")]
    http_addr: SocketAddr,

    /// Do not watch Ingress objects
    #[arg(long, env = "DISABLE_INGRESS")]
    disable_ingress: bool,

    /// Do not watch Gateway API HTTPRoute objects
    #[arg(long, env = "DISABLE_HTTPROUTE")]
    disable_httproute: bool,

    /// Log as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("Pulsetic Operator v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

async fn run_operator(args: RunArgs) -> Result<(), Error> {
    telemetry::init_telemetry(args.log_json)?;

    info!(
        "Starting Pulsetic Operator v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize Kubernetes client
    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    info!("Connected to Kubernetes cluster");

    let config = OperatorConfig::new(
        args.api_url,
        args.cluster_resource_namespace,
        args.annotation_prefix,
    );
    info!(
        api_url = %config.api_url,
        namespace = %config.cluster_resource_namespace,
        prefix = %config.annotation_prefix,
        "Loaded operator configuration"
    );

    let ctx = Arc::new(Context::new(
        KubeStore::new(client.clone()),
        KubeRecorder::new(client.clone()),
        config,
    )?);

    // Start the health and metrics server
    #[cfg(feature = "rest-api")]
    {
        let state = pulsetic_operator::rest_api::ServerState {
            client: Some(client.clone()),
        };
        let addr = args.http_addr;
        tokio::spawn(async move {
            if let Err(e) = pulsetic_operator::rest_api::run_server(addr, state).await {
                tracing::error!("HTTP server error: {:?}", e);
            }
        });
    }
    #[cfg(not(feature = "rest-api"))]
    let _ = args.http_addr;

    let options = ControllerOptions {
        ingress: !args.disable_ingress,
        httproute: !args.disable_httproute,
    };

    // Run the controllers until a shutdown signal arrives
    let result = controller::run_controller(client, ctx, options).await;

    // Flush any remaining traces
    telemetry::shutdown_telemetry();

    result
}
