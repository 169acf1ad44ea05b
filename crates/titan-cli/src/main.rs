// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod client;

use client::TitanClient;

/// Exit code for a failed request or a non-2xx server response.
const EXIT_RUNTIME_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "titan", version, about = "Titan-AAS admin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the running `titan-http` instance.
    #[arg(long, default_value = "http://127.0.0.1:8080", global = true)]
    base_url: String,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check liveness (`GET /health/live`).
    Health,
    /// Check readiness, including active subscriber count (`GET /health/ready`).
    Ready,
    /// Print the Prometheus exposition text (`GET /metrics`).
    Metrics,
    /// List Shells (`GET /shells`).
    Shells {
        /// Filter by `idShort`.
        #[arg(long)]
        id_short: Option<String>,
        /// Filter by `assetIds` (raw asset-id string).
        #[arg(long)]
        asset_ids: Option<String>,
        /// Page size.
        #[arg(long)]
        limit: Option<u32>,
        /// Pagination cursor from a previous page's response.
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Fetch one Shell by id (`GET /shells/{id}`).
    Shell {
        /// The Shell's plain (unencoded) identifier.
        id: String,
    },
    /// List Submodels (`GET /submodels`).
    Submodels {
        #[arg(long)]
        id_short: Option<String>,
        #[arg(long)]
        semantic_id: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Fetch one Submodel by id (`GET /submodels/{id}`).
    Submodel {
        /// The Submodel's plain (unencoded) identifier.
        id: String,
    },
    /// Discover Shells registered under an asset id (`GET /lookup/shells`).
    Lookup {
        /// The raw (unencoded) asset id to look up.
        asset_id: String,
    },
    /// Tail the live change stream (`GET /events`), printing one JSON
    /// object per line until interrupted.
    Events {
        #[arg(long)]
        entity_kind: Option<String>,
        #[arg(long)]
        entity_id: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug { EnvFilter::new("titan_cli=debug") } else { EnvFilter::new("titan_cli=info") };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client = TitanClient::new(cli.base_url);
    let result = run(client, cli.command).await;

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(EXIT_RUNTIME_ERROR);
    }
}

async fn run(client: TitanClient, command: Commands) -> Result<()> {
    match command {
        Commands::Health => print_json(client.get_json("/health/live").await?),
        Commands::Ready => print_json(client.get_json("/health/ready").await?),
        Commands::Metrics => {
            println!("{}", client.get_text("/metrics").await?);
            Ok(())
        }
        Commands::Shells { id_short, asset_ids, limit, cursor } => {
            let mut query = Vec::new();
            if let Some(v) = id_short {
                query.push(("idShort".to_string(), v));
            }
            if let Some(v) = asset_ids {
                query.push(("assetIds".to_string(), v));
            }
            if let Some(v) = limit {
                query.push(("limit".to_string(), v.to_string()));
            }
            if let Some(v) = cursor {
                query.push(("cursor".to_string(), v));
            }
            print_json(client.get_json_query("/shells", &query).await?)
        }
        Commands::Shell { id } => print_json(client.get_json(&format!("/shells/{}", client.encode_id(&id)?)).await?),
        Commands::Submodels { id_short, semantic_id, limit, cursor } => {
            let mut query = Vec::new();
            if let Some(v) = id_short {
                query.push(("idShort".to_string(), v));
            }
            if let Some(v) = semantic_id {
                query.push(("semanticId".to_string(), v));
            }
            if let Some(v) = limit {
                query.push(("limit".to_string(), v.to_string()));
            }
            if let Some(v) = cursor {
                query.push(("cursor".to_string(), v));
            }
            print_json(client.get_json_query("/submodels", &query).await?)
        }
        Commands::Submodel { id } => {
            print_json(client.get_json(&format!("/submodels/{}", client.encode_id(&id)?)).await?)
        }
        Commands::Lookup { asset_id } => {
            let token = client.encode_id(&asset_id)?;
            print_json(client.get_json_query("/lookup/shells", &[("assetIds".to_string(), token)]).await?)
        }
        Commands::Events { entity_kind, entity_id } => {
            let mut query = Vec::new();
            if let Some(v) = entity_kind {
                query.push(("entityKind".to_string(), v));
            }
            if let Some(v) = entity_id {
                query.push(("entityId".to_string(), v));
            }
            client.watch_events(&query).await
        }
    }
}

fn print_json(value: serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&value).context("formatting response")?);
    Ok(())
}
