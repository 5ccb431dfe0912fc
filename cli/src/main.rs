//! memgraph command-line front end
//!
//! Runs one memory or graph operation per invocation and prints the
//! response as JSON on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memgraph::embedding::SharedProvider;
use memgraph::sanitize::parse_memory_id;
use memgraph::{
    AddResponse, BucketsResponse, GeminiConfig, GeminiProvider, GetResponse,
    HashEmbeddingProvider, MemoryConfig, MemoryGraph, MemoryId, NewMemory, SearchResponse, Status,
    StatusResponse, StorageBackend, TraverseResponse,
};

#[derive(Parser)]
#[command(name = "memgraph")]
#[command(about = "Namespaced memory store with a knowledge graph")]
#[command(version)]
struct Args {
    /// RocksDB directory (defaults to MEMGRAPH_DB_PATH or .memgraph/memory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Keep everything in memory for the lifetime of this process
    #[arg(long, global = true, conflicts_with = "db")]
    in_memory: bool,

    /// Namespace to operate in
    #[arg(long, short, global = true, env = "MEMGRAPH_NAMESPACE")]
    namespace: Option<String>,

    /// Embedding provider
    #[arg(long, global = true, value_enum, env = "MEMGRAPH_PROVIDER", default_value = "gemini")]
    provider: Provider,

    /// Gemini embedding model (overrides MEMGRAPH_EMBEDDING_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Embedding dimension (must match an existing table)
    #[arg(long, global = true)]
    dimension: Option<usize>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Provider {
    /// Gemini embeddings API (needs GEMINI_API_KEY)
    Gemini,
    /// Offline token hashing
    Hash,
}

#[derive(Subcommand)]
enum Command {
    /// Store a new memory
    Add {
        content: String,
        #[arg(long, short)]
        bucket: Option<String>,
        /// Initial outbound edge as TARGET_ID:RELATIONSHIP (repeatable)
        #[arg(long = "edge", value_parser = parse_edge)]
        edges: Vec<(String, String)>,
    },
    /// Semantic search
    Search {
        query: String,
        #[arg(long, short)]
        bucket: Option<String>,
        #[arg(long, short = 'k', default_value_t = 5)]
        top_k: usize,
    },
    /// Fetch one memory by id
    Get { memory_id: String },
    /// Delete one memory by id
    Delete { memory_id: String },
    /// Delete every memory in a bucket
    Clear {
        #[arg(long, short)]
        bucket: Option<String>,
    },
    /// List bucket names in the namespace
    Buckets,
    /// Add the edge SOURCE -[RELATIONSHIP]-> TARGET
    Connect {
        source: String,
        target: String,
        relationship: String,
    },
    /// Remove edges SOURCE -> TARGET
    Disconnect {
        source: String,
        target: String,
        /// Only remove edges with this label
        #[arg(long, short)]
        relationship: Option<String>,
    },
    /// Breadth-first walk from START
    Traverse {
        start: String,
        #[arg(long, short)]
        relationship: Option<String>,
        #[arg(long, short, default_value_t = 2)]
        depth: u32,
    },
}

fn parse_edge(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once(':') {
        Some((target, relationship)) if !target.is_empty() && !relationship.is_empty() => {
            Ok((target.to_string(), relationship.to_string()))
        }
        _ => Err(format!("expected TARGET_ID:RELATIONSHIP, got {:?}", raw)),
    }
}

fn parse_id(raw: &str, field: &str) -> Result<MemoryId> {
    Ok(parse_memory_id(raw, field)?)
}

fn build_config(args: &Args) -> Result<MemoryConfig> {
    let mut config = MemoryConfig::from_env().context("Invalid MEMGRAPH_* environment")?;
    if let Some(db) = &args.db {
        config.storage = StorageBackend::RocksDb { path: db.clone() };
    }
    if args.in_memory {
        config.storage = StorageBackend::InMemory;
    }
    if let Some(dimension) = args.dimension {
        config.embedding_dimension = dimension;
    }
    Ok(config)
}

fn build_provider(provider: Provider, model: Option<&str>) -> Result<SharedProvider> {
    Ok(match provider {
        Provider::Gemini => {
            let mut config =
                GeminiConfig::from_env().context("Gemini provider needs GEMINI_API_KEY")?;
            if let Some(model) = model {
                config = config.with_model(model);
            }
            Arc::new(GeminiProvider::new(config)?)
        }
        Provider::Hash => Arc::new(HashEmbeddingProvider::new()),
    })
}

fn print<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = build_config(&args)?;
    let provider = build_provider(args.provider, args.model.as_deref())?;
    let store = MemoryGraph::new(config, provider)?;
    let ns = store.namespace(args.namespace.as_deref()).to_string();
    let memories = store.memories();
    let graph = store.graph();

    tracing::debug!("Namespace: {}", ns);

    match args.command {
        Command::Add {
            content,
            bucket,
            edges,
        } => {
            let mut memory = NewMemory::new(content);
            if let Some(bucket) = bucket {
                memory = memory.bucket(bucket);
            }
            for (target, relationship) in edges {
                memory = memory.edge(target, relationship);
            }
            let id = memories.add(memory, &ns).await?;
            print(&AddResponse::new(id), args.pretty)
        }
        Command::Search {
            query,
            bucket,
            top_k,
        } => {
            let hits = memories.search(&query, bucket.as_deref(), &ns, top_k).await?;
            print(&SearchResponse::new(hits), args.pretty)
        }
        Command::Get { memory_id } => {
            let record = memories.get_by_str(&memory_id, &ns).await?;
            print(&GetResponse::new(record), args.pretty)
        }
        Command::Delete { memory_id } => {
            let removed = memories
                .delete(parse_id(&memory_id, "memory_id")?, &ns)
                .await?;
            print(
                &StatusResponse::new(Status::Deleted).with_affected(removed as usize),
                args.pretty,
            )
        }
        Command::Clear { bucket } => {
            let removed = memories.clear(bucket.as_deref(), &ns).await?;
            print(
                &StatusResponse::new(Status::Cleared).with_affected(removed),
                args.pretty,
            )
        }
        Command::Buckets => {
            let buckets = memories.list_buckets(&ns).await?;
            print(&BucketsResponse::from(buckets), args.pretty)
        }
        Command::Connect {
            source,
            target,
            relationship,
        } => {
            let added = graph
                .connect(
                    parse_id(&source, "source_id")?,
                    parse_id(&target, "target_id")?,
                    &relationship,
                    &ns,
                )
                .await?;
            print(
                &StatusResponse::new(Status::Connected).with_affected(added as usize),
                args.pretty,
            )
        }
        Command::Disconnect {
            source,
            target,
            relationship,
        } => {
            let removed = graph
                .disconnect(
                    parse_id(&source, "source_id")?,
                    parse_id(&target, "target_id")?,
                    relationship.as_deref(),
                    &ns,
                )
                .await?;
            print(
                &StatusResponse::new(Status::Disconnected).with_affected(removed),
                args.pretty,
            )
        }
        Command::Traverse {
            start,
            relationship,
            depth,
        } => {
            let hits = graph
                .traverse(
                    parse_id(&start, "start_id")?,
                    relationship.as_deref(),
                    depth,
                    &ns,
                )
                .await?;
            print(&TraverseResponse::new(hits), args.pretty)
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memgraph=info,memgraph_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}
