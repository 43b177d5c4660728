//! Access Portal MCP Server - enterprise access-request tools over MCP.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use access_portal_mcp::{AgentNetwork, PortalConfig, PortalMcpServer, PromptLibrary, ToolContext};

/// Access Portal MCP Server - validation, ticket and dispatch tools.
#[derive(Parser, Debug)]
#[command(name = "portal-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the knowledge tables.
    #[arg(long, env = "PORTAL_KNOWDOCS_DIR", default_value = "knowdocs")]
    knowdocs: PathBuf,

    /// Agent network routing table consumed by the orchestration framework.
    #[arg(long, env = "PORTAL_AGENT_NETWORK", default_value = "config/agent_network.yaml")]
    agent_network: PathBuf,

    /// Force ticket tools into mock mode even when credentials are set.
    #[arg(long)]
    mock_tickets: bool,

    /// Serve MCP over HTTP instead of stdio.
    #[arg(long)]
    http: bool,

    /// Bind address for the HTTP transport.
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logging goes to stderr; stdout is reserved for the MCP protocol.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    if args.json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    info!("access portal MCP server starting");

    let config = PortalConfig::from_env(args.knowdocs.clone(), args.mock_tickets);
    info!("knowledge tables: {}", config.knowdocs_dir.display());
    info!("ticket mock mode: {}", config.mock_tickets);

    let context = ToolContext::from_config(&config)?;
    let server = PortalMcpServer::new(context);

    // The routing table belongs to the external framework; a missing file
    // is its problem, but a file that fails validation is ours.
    match AgentNetwork::from_path(&args.agent_network) {
        Ok(network) => {
            network.validate(&server.tool_names(), &PromptLibrary::new())?;
            info!(
                "agent network '{}' loaded, {} agents",
                network.name,
                network.agents.len()
            );
        }
        Err(err) => warn!(
            "agent network not loaded ({}): {}",
            args.agent_network.display(),
            err
        ),
    }

    if args.http {
        #[cfg(feature = "http")]
        {
            access_portal_mcp::http::serve(std::sync::Arc::new(server), args.bind).await?;
            return Ok(());
        }
        #[cfg(not(feature = "http"))]
        anyhow::bail!("this binary was built without the http feature");
    }

    server.run_stdio().await?;

    Ok(())
}
