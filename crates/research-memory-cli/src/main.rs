// ============================================================================
// memctl — CLI for the research agent's long-term memory
// ============================================================================
// Usage:
//   memctl init                                   Create missing collections
//   memctl store --user U --query Q [--summary S --mode M --preference P --fact F --topic T]
//   memctl retrieve --user U --query Q            Print the recalled context
//   memctl clear --user U                         Reserved (no-op)
//   memctl stats                                  Points per collection
//   memctl health                                 Check the store connection
// ============================================================================

use anyhow::Result;
use clap::{Parser, Subcommand};
use research_memory::{
    AgentResult, ClearOutcome, Collection, Embedder, EmbeddingService, EnsureStatus, HashEmbedder,
    MemoryConfig, MemoryManager,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Research memory inspection tool
#[derive(Parser)]
#[command(name = "memctl", version, about = "Store and recall research agent memory")]
struct Cli {
    /// Use the deterministic offline embedder instead of the embeddings API
    #[arg(long, global = true)]
    hash_embeddings: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the three collections if they do not exist
    Init,

    /// Store one agent turn
    Store {
        #[arg(long)]
        user: String,

        /// The research query that produced the result
        #[arg(long)]
        query: String,

        #[arg(long)]
        summary: Option<String>,

        /// Research mode, e.g. quick or deep
        #[arg(long)]
        mode: Option<String>,

        #[arg(long)]
        preference: Option<String>,

        #[arg(long)]
        fact: Option<String>,

        /// Topic for --fact
        #[arg(long)]
        topic: Option<String>,
    },

    /// Recall context for a query
    Retrieve {
        #[arg(long)]
        user: String,

        #[arg(long)]
        query: String,
    },

    /// Forget a user's memory (not supported yet)
    Clear {
        #[arg(long)]
        user: String,
    },

    /// Show points per collection
    Stats,

    /// Check that the store is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("research_memory=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = MemoryConfig::from_env()?;
    debug!("Loaded config: {:?}", config);

    let embedder: Arc<dyn Embedder> = if cli.hash_embeddings {
        info!("Using offline hash embeddings");
        Arc::new(HashEmbedder::new())
    } else {
        Arc::new(EmbeddingService::new(&config.embedding))
    };

    let manager = MemoryManager::open(&config, embedder)?;
    run(cli, &manager).await
}

async fn run(cli: Cli, manager: &MemoryManager) -> Result<()> {
    match cli.command {
        // Needs only the connection, not the collections
        Commands::Health => cmd_health(manager).await,
        Commands::Init => {
            let report = bootstrap(manager).await?;
            cmd_init(&report, cli.json)
        }
        Commands::Store {
            user,
            query,
            summary,
            mode,
            preference,
            fact,
            topic,
        } => {
            bootstrap(manager).await?;
            let result = AgentResult {
                summary,
                mode,
                preference,
                fact,
                topic,
            };
            cmd_store(manager, &user, &query, &result).await
        }
        Commands::Retrieve { user, query } => {
            bootstrap(manager).await?;
            cmd_retrieve(manager, &user, &query, cli.json).await
        }
        Commands::Clear { user } => {
            bootstrap(manager).await?;
            cmd_clear(manager, &user).await
        }
        Commands::Stats => {
            bootstrap(manager).await?;
            cmd_stats(manager, cli.json).await
        }
    }
}

/// Create missing collections before any traffic; failure aborts the command
async fn bootstrap(manager: &MemoryManager) -> Result<Vec<(Collection, EnsureStatus)>> {
    Ok(manager.ensure_collections().await?)
}

fn cmd_init(report: &[(Collection, EnsureStatus)], json: bool) -> Result<()> {
    if json {
        let entries: Vec<_> = report
            .iter()
            .map(|(collection, status)| {
                serde_json::json!({
                    "collection": collection.name(),
                    "created": *status == EnsureStatus::Created,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for (collection, status) in report {
        let label = match status {
            EnsureStatus::Created => "CREATED",
            EnsureStatus::Existing => "EXISTS",
        };
        println!("[{}] {}", label, collection);
    }
    println!("Qdrant is connected and ready!");
    Ok(())
}

async fn cmd_store(
    manager: &MemoryManager,
    user: &str,
    query: &str,
    result: &AgentResult,
) -> Result<()> {
    manager.store(user, query, result).await?;

    println!("[STORED] Research for {}: {}", user, query);
    if let Some(preference) = result.preference() {
        println!("[STORED] Preference for {}: {}", user, preference);
    }
    if let Some(fact) = result.fact() {
        println!("[STORED] Fact for {}: {}", user, fact);
    }
    Ok(())
}

async fn cmd_retrieve(manager: &MemoryManager, user: &str, query: &str, json: bool) -> Result<()> {
    if json {
        let context = manager.recall(user, query).await?;
        println!("{}", serde_json::to_string_pretty(&context)?);
    } else {
        println!("{}", manager.retrieve(user, query).await?);
    }
    Ok(())
}

async fn cmd_clear(manager: &MemoryManager, user: &str) -> Result<()> {
    match manager.clear(user).await {
        ClearOutcome::NotSupported => {
            println!("Clearing memory is not supported yet; nothing was removed for {}", user);
        }
    }
    Ok(())
}

async fn cmd_stats(manager: &MemoryManager, json: bool) -> Result<()> {
    let stats = manager.stats().await?;

    if json {
        let map: serde_json::Map<String, serde_json::Value> = stats
            .iter()
            .map(|s| (s.collection.name().to_string(), s.points_count.into()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    println!("=== Research Memory Stats ===");
    for s in &stats {
        println!("  {:18} {}", s.collection.name(), s.points_count);
    }
    Ok(())
}

async fn cmd_health(manager: &MemoryManager) -> Result<()> {
    if manager.health_check().await? {
        println!("Vector store is healthy");
        Ok(())
    } else {
        anyhow::bail!("Vector store health check failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_memory::InMemoryStore;

    fn manager() -> (MemoryManager, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let manager = MemoryManager::new(Arc::new(HashEmbedder::new()), store.clone());
        (manager, store)
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("memctl").chain(args.iter().copied())).unwrap()
    }

    #[tokio::test]
    async fn test_health_skips_bootstrap() {
        let (manager, _) = manager();
        run(parse(&["health"]), &manager).await.unwrap();

        let report = manager.ensure_collections().await.unwrap();
        assert!(report.iter().all(|(_, status)| *status == EnsureStatus::Created));
    }

    #[tokio::test]
    async fn test_health_reports_unreachable_store() {
        let (manager, store) = manager();
        store.set_unavailable(true);

        let err = run(parse(&["health"]), &manager).await.unwrap_err();
        assert!(err.to_string().contains("health check failed"));
    }

    #[tokio::test]
    async fn test_commands_bootstrap_first() {
        let (manager, _) = manager();
        run(parse(&["stats"]), &manager).await.unwrap();

        let report = manager.ensure_collections().await.unwrap();
        assert!(report.iter().all(|(_, status)| *status == EnsureStatus::Existing));
    }

    #[tokio::test]
    async fn test_bootstrap_failure_aborts_command() {
        let (manager, store) = manager();
        store.set_unavailable(true);

        let result = run(parse(&["retrieve", "--user", "u1", "--query", "q"]), &manager).await;
        assert!(result.is_err());
    }
}
