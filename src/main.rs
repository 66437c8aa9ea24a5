use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ka_chat::{ChatOrchestrator, InMemoryCacheStore, ResponseCache};
use ka_core::{CacheConfig, Document, QueryAnswer, RagConfig, RetryConfig, RetryingEmbedder};
use ka_ollama::OllamaClient;
use ka_rag::RetrievalService;

/// Shortest extracted text accepted for indexing
const MIN_CONTENT_CHARS: usize = 50;

type OllamaEmbedder = RetryingEmbedder<Arc<OllamaClient>>;
type Chat = ChatOrchestrator<OllamaEmbedder, Arc<OllamaClient>, InMemoryCacheStore>;

#[derive(Parser)]
#[command(name = "ka")]
#[command(about = "Answer questions from your own documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Index text files into the local corpus
    Index {
        /// Files to index
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Document id (defaults to the file stem; only valid with a single file)
        #[arg(long)]
        id: Option<String>,
    },
    /// Ask a single question
    Query {
        /// The question
        text: String,
    },
    /// Show index statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let chat = build_chat()?;

    match cli.command {
        Some(Commands::Index { paths, id }) => {
            if id.is_some() && paths.len() > 1 {
                bail!("--id can only be used when indexing a single file");
            }
            for path in &paths {
                index_file(&chat, path, id.as_deref()).await?;
            }
        }
        Some(Commands::Query { text }) => {
            let answer = chat.query(&text).await?;
            print_answer(&answer);
        }
        Some(Commands::Stats) => {
            let stats = chat.retrieval().stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        None => interactive(&chat).await?,
    }

    Ok(())
}

/// Wire the Ollama client, retrieval service and cache into an orchestrator.
fn build_chat() -> Result<Chat> {
    let rag_config = RagConfig::from_env()?;
    let cache_config = CacheConfig::from_env()?;

    let ollama = OllamaClient::from_env()?.with_dimension(rag_config.embedding_dimension);
    let generation = ollama.generation_config();
    info!(
        base_url = %ollama.config().base_url,
        model = %ollama.config().model,
        embedding_model = %ollama.config().embedding_model,
        index_dir = %rag_config.index_dir.display(),
        cache_enabled = cache_config.enabled,
        "starting knowledge assistant"
    );
    let ollama = Arc::new(ollama);

    let embedder = RetryingEmbedder::new(ollama.clone(), RetryConfig::default());
    let retrieval = Arc::new(RetrievalService::new(embedder, rag_config)?);
    let cache = ResponseCache::new(InMemoryCacheStore::new(), cache_config);

    Ok(ChatOrchestrator::new(retrieval, ollama, cache, generation))
}

async fn index_file(chat: &Chat, path: &Path, id: Option<&str>) -> Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    if content.trim().chars().count() < MIN_CONTENT_CHARS {
        bail!(
            "{}: document content is too short or empty (minimum {} characters)",
            path.display(),
            MIN_CONTENT_CHARS
        );
    }

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let document = Document {
        id: match id {
            Some(id) => id.to_string(),
            None => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| filename.clone()),
        },
        filename,
        content,
    };

    info!(path = %path.display(), document_id = %document.id, "reading document for indexing");
    println!("{} Indexing {}...", "📄".blue(), document.filename.bold());
    let reference = chat.retrieval().index(&document).await?;
    println!("{} {}", "✅".green(), reference);
    Ok(())
}

fn print_answer(answer: &QueryAnswer) {
    println!("{} {}", "→".green(), answer.answer);

    if !answer.sources.is_empty() {
        println!("{}", "Sources:".bold());
        for source in &answer.sources {
            println!(
                "  {} {} ({}, relevance {:.3})",
                "•".cyan(),
                source.filename,
                source.document_id,
                source.relevance_score
            );
        }
    }

    if answer.cache_hit {
        println!("{}", "(cached)".dimmed());
    }
}

async fn interactive(chat: &Chat) -> Result<()> {
    println!("{}", "Knowledge Assistant".blue().bold());
    println!("{}", "Ask a question about your documents. Type 'exit' to quit.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", "❯".green().bold());
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "exit" | "quit" => {
                println!("{}", "👋 Goodbye!".green());
                break;
            }
            "help" => {
                print_help();
                continue;
            }
            "stats" => {
                let stats = chat.retrieval().stats().await;
                println!("{}", serde_json::to_string_pretty(&stats)?);
                continue;
            }
            _ => {}
        }

        if let Some(path) = input.strip_prefix("index ") {
            if let Err(e) = index_file(chat, Path::new(path.trim()), None).await {
                println!("{} Indexing failed: {:#}", "❌".red(), e);
            }
            continue;
        }

        match chat.query(input).await {
            Ok(answer) => print_answer(&answer),
            Err(e) => println!("{} Query failed: {}", "❌".red(), e),
        }
    }

    Ok(())
}

fn print_help() {
    println!("{}", "Available commands:".bold());
    println!("  {} - Ask a question about the indexed documents", "<question>".green());
    println!("  {} - Index a text file", "index <path>".green());
    println!("  {} - Show index statistics", "stats".green());
    println!("  {} - Show this help message", "help".green());
    println!("  {} - Exit the application", "exit/quit".green());
}
