//! Entry point: loads the federation config, builds the adapter registry and
//! runs the axum HTTP mirror and the rmcp stdio tool surface side by side,
//! shutting both down on Ctrl-C.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use rmcp::service::ServiceExt;
use tokio::net::TcpListener;

use runbooks_config::FederationConfig;
use runbooks_server::mcp::RunbookTools;
use runbooks_server::{build_registry, http, AppState};

#[derive(Debug, Parser)]
#[command(name = "runbooks-server", about = "Federated incident-runbook retrieval engine")]
struct Cli {
    /// Path to the federation config YAML.
    #[arg(long, env = "RUNBOOKS_CONFIG", default_value = "runbooks.yaml")]
    config: PathBuf,

    /// Address the HTTP mirror binds to.
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Skip the rmcp stdio transport and run the HTTP mirror only.
    #[arg(long)]
    http_only: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = FederationConfig::from_file(&cli.config)?;
    let port = config.server.port;
    let registry = build_registry(&config).await?;
    let state = AppState::new(registry.clone());

    let addr = SocketAddr::new(cli.bind.parse()?, port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP mirror listening");

    let http_server = async {
        axum::serve(listener, http::router(state.clone()).into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
    };

    if cli.http_only {
        http_server.await?;
    } else {
        let tools = RunbookTools::new(registry.clone(), state.feedback.clone());
        let mcp_server = async {
            let service = tools.serve(rmcp::transport::stdio()).await?;
            service.waiting().await?;
            Ok::<_, Box<dyn std::error::Error>>(())
        };

        tokio::select! {
            result = http_server => result.map_err(Into::into),
            result = mcp_server => result,
        }?;
    }

    tracing::info!("shutting down, cleaning up adapters");
    registry.cleanup().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
