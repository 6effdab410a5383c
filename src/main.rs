use adsight::{build_tools, ConnectionPool, Connector, DatabaseConfig, ToolOutcome, ToolRegistry};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "adsight")]
#[command(about = "Run advertising analytics reporting tools against PostgreSQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every tool with its argument schema
    Tools {
        /// Only list tools of this channel
        #[arg(short, long)]
        channel: Option<String>,
    },

    /// Run a tool and print its outcome as JSON
    Call {
        channel: String,
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },

    /// Print the SQL and bound parameters a call would run, without connecting
    Plan {
        channel: String,
        tool: String,
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

fn parse_json_args(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).context("--args must be a JSON object")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = ToolRegistry::new();

    match cli.command {
        Commands::Tools { channel } => {
            let definitions: Vec<_> = build_tools(registry.tools())
                .into_iter()
                .filter(|definition| channel.as_deref().map_or(true, |c| definition.channel == c))
                .collect();
            println!("{}", serde_json::to_string_pretty(&definitions)?);
        }
        Commands::Plan { channel, tool, args } => {
            let planned = registry.plan(&channel, &tool, parse_json_args(&args)?)?;
            println!("{}", serde_json::to_string_pretty(&planned)?);
        }
        Commands::Call { channel, tool, args } => {
            let args = parse_json_args(&args)?;
            let config = DatabaseConfig::from_env()?;
            info!(host = %config.host, database = %config.database, "connecting");

            let pool = ConnectionPool::from_config(&config)?;
            let outcome = registry.invoke(&pool, &channel, &tool, args).await;
            pool.close_all().await;

            let outcome: ToolOutcome = outcome?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}
