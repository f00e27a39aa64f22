//! # HR KB Harness CLI (`hrkb`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hrkb serve chat` | Start the HTTP chat server (`POST /api/chat`) |
//! | `hrkb serve mcp` | Start the MCP tool server on stdio |
//! | `hrkb sync` | Start a knowledge-base ingestion job (scheduler entry point) |
//! | `hrkb search "<query>"` | Run the retrieval tool from the terminal |
//!
//! ## Examples
//!
//! ```bash
//! # Chat server on a custom port
//! PORT=8080 HR_KB_ID=ABCDEFGHIJ hrkb serve chat
//!
//! # Trigger ingestion with the scheduler's event payload
//! hrkb sync --event ./event.json
//!
//! # Retrieval with explicit limits
//! hrkb search "bereavement leave" --top-k 3 --score-threshold 0.4
//! ```
//!
//! Logs go to stderr (filter with `RUST_LOG`); command output goes to stdout.

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use hr_kb_harness::bedrock::BedrockClient;
use hr_kb_harness::retrieve::{retrieve_policy, RetrievalQuery};
use hr_kb_harness::{config, ingest, mcp, server};

/// HR KB Harness: chat, MCP retrieval, and ingestion for an HR knowledge
/// base on Amazon Bedrock.
///
/// Settings come from `--config` (TOML, optional) and environment
/// variables such as `HR_KB_ID`, which take precedence.
#[derive(Parser)]
#[command(
    name = "hrkb",
    about = "HR KB Harness: chat, MCP retrieval, and ingestion for an HR knowledge base on Amazon Bedrock",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/hrkb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a long-running server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },

    /// Start an ingestion job for the configured data source.
    ///
    /// Prints `{ statusCode, body }` to stdout and exits 0. Missing or
    /// unreadable configuration and remote failures are reported in that
    /// output with status 500. Retrieval and server settings are not
    /// validated here.
    Sync {
        /// Scheduler event JSON file, or `-` for stdin. Defaults to `{}`.
        #[arg(long)]
        event: Option<PathBuf>,
    },

    /// Query the knowledge base the way the `retrieve_hr_policy` tool does.
    Search {
        /// The HR question or search query.
        query: String,

        /// Maximum number of results (1-50). Defaults to the configured value.
        #[arg(long)]
        top_k: Option<u32>,

        /// Minimum similarity score (0-1).
        #[arg(long)]
        score_threshold: Option<f64>,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// HTTP chat server with static files from `[server].public_dir`.
    Chat,
    /// MCP tool server on stdin/stdout.
    Mcp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { service } => {
            let cfg = config::load_config(&cli.config)?;
            cfg.require_knowledge_base_id()?;
            let client = Arc::new(BedrockClient::new(&cfg).await?);
            match service {
                ServeService::Chat => server::run_server(&cfg, client).await?,
                ServeService::Mcp => mcp::run_stdio(&cfg, client).await?,
            }
        }
        Commands::Sync { event } => {
            let event = read_event(event.as_deref());
            let response = match config::load_ingestion_config(&cli.config) {
                Ok(cfg) => match BedrockClient::new(&cfg).await {
                    Ok(client) => ingest::trigger_ingestion(&client, &cfg, &event).await,
                    Err(e) => ingest::start_failure(&format!("{:#}", e)),
                },
                Err(e) => ingest::configuration_failure(&format!("{:#}", e)),
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Search {
            query,
            top_k,
            score_threshold,
        } => {
            let cfg = config::load_config(&cli.config)?;
            cfg.require_knowledge_base_id()?;
            let mut params = json!({ "query": query });
            if let Some(k) = top_k {
                params["topK"] = json!(k);
            }
            if let Some(t) = score_threshold {
                params["scoreThreshold"] = json!(t);
            }
            let query = RetrievalQuery::from_params(&params)?;

            let client = BedrockClient::new(&cfg).await?;
            let outcome = retrieve_policy(&client, &cfg, &query).await?;
            eprintln!("{}", outcome.summary);
            println!("{}", serde_json::to_string_pretty(&outcome.report)?);
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Read the scheduler event from a file, stdin (`-`), or default to `{}`.
///
/// The event is only logged, so problems reading it never stop the
/// trigger: an unreadable source becomes `{}` and text that is not JSON is
/// kept as a JSON string.
fn read_event(path: Option<&Path>) -> Value {
    let raw = match path {
        None => return json!({}),
        Some(p) if p == Path::new("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).map(|_| buf)
        }
        Some(p) => std::fs::read_to_string(p),
    };

    let raw = match raw {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "failed to read scheduler event; using {{}}");
            return json!({});
        }
    };

    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(error = %e, "scheduler event is not JSON; passing it through as text");
        Value::String(raw)
    })
}
