use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use statrag_core::config::Settings;
use statrag_core::types::{DocumentInput, DocumentOrigin, DocumentPatch, RebuildProgress, RebuildReport, SearchMode};
use statrag_engine::{DocumentFilter, InitOptions, Page, RagService};

#[derive(Parser)]
#[command(name = "statrag", about = "Local retrieval-augmented answers over a statistics knowledge base")]
struct Cli {
    /// Directory holding config.toml (defaults to the working directory).
    #[arg(long, global = true, env = "STATRAG_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    /// Embedding model id, e.g. `hashed:stats-mini` or `ollama:nomic-embed-text`.
    #[arg(long, global = true)]
    embedding_model: Option<String>,
    /// Inference model id, e.g. `extractive` or `ollama:llama3:8b`.
    #[arg(long, global = true)]
    inference_model: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List documents with optional filters.
    List {
        #[arg(long)]
        library: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// baseline | user
        #[arg(long)]
        origin: Option<String>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Print one document as JSON.
    Get { doc_id: String },
    /// Add a user document from a file (or stdin with `-`).
    Add {
        doc_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        library: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        file: PathBuf,
    },
    /// Update fields of a user document.
    Update {
        doc_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        /// Replace the content with this file's text.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Delete { doc_id: String },
    /// Ranked sources without generating an answer.
    Search {
        query: String,
        #[arg(long, default_value = "hybrid")]
        mode: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Retrieve and answer.
    Query {
        query: String,
        #[arg(long, default_value = "hybrid")]
        mode: String,
        /// Print the answer as it is generated.
        #[arg(long)]
        stream: bool,
    },
    /// Re-index every document.
    Rebuild,
    /// Drop all user documents and re-index the baseline.
    Restore {
        #[arg(long)]
        yes: bool,
    },
    Stats,
}

fn read_content(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}") {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn print_report(report: &RebuildReport) {
    println!("\n✅ Rebuild finished: {} processed, {} ok, {} failed, {} chunks", report.processed_docs, report.success_docs, report.failed_docs, report.total_chunks);
    for e in &report.errors { println!("   ❌ {}: {}", e.doc_id, e.error); }
}

async fn rebuild(svc: &RagService, restore: bool) -> Result<RebuildReport> {
    let pb = progress_bar();
    let on_progress = |p: &RebuildProgress| {
        pb.set_position(u64::from(p.percentage));
        pb.set_message(format!("{}/{} {}", p.current, p.total, p.current_doc_title));
    };
    let report = if restore { svc.restore_baseline(on_progress).await? } else { svc.rebuild(on_progress).await? };
    pb.finish_and_clear();
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config_dir {
        Some(dir) => Settings::load_from(dir),
        None => Settings::load(),
    }
    .context("loading configuration")?;
    let mut options = InitOptions::from_config(&settings.providers);
    if let Some(model) = cli.embedding_model.clone() { options.embedding_model = model; }
    if let Some(model) = cli.inference_model.clone() { options.inference_model = model; }
    let svc = RagService::builder().settings(settings).build();
    svc.initialize(options).await.context("initializing rag service")?;

    match cli.command {
        Command::List { library, category, origin, text, offset, limit } => {
            let origin = match origin.as_deref() {
                None => None,
                Some("baseline") => Some(DocumentOrigin::Baseline),
                Some("user") => Some(DocumentOrigin::User),
                Some(other) => bail!("unknown origin '{other}' (expected baseline or user)"),
            };
            let page = svc.list_documents(&DocumentFilter { library, category, origin, text }, Page { offset, limit })?;
            println!("📚 {} documents (showing {})", page.total, page.documents.len());
            for d in &page.documents {
                println!("  {}  [{}{}]  {}", d.doc_id, d.library, d.category.as_deref().map(|c| format!("/{c}")).unwrap_or_default(), d.title);
            }
        }
        Command::Get { doc_id } => match svc.get_document(&doc_id)? {
            Some(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
            None => bail!("no document '{doc_id}'"),
        },
        Command::Add { doc_id, title, library, category, summary, file } => {
            let mut input = DocumentInput::new(doc_id, title, library, read_content(&file)?);
            input.category = category;
            input.summary = summary;
            let id = svc.add_document(input).await?;
            println!("✅ Added {id}");
        }
        Command::Update { doc_id, title, category, summary, file } => {
            let content = file.as_ref().map(read_content).transpose()?;
            let patch = DocumentPatch { title, category, content, summary };
            if patch.is_empty() { bail!("nothing to update"); }
            if svc.update_document(&doc_id, patch).await? { println!("✅ Updated {doc_id}"); } else { bail!("no document '{doc_id}'"); }
        }
        Command::Delete { doc_id } => {
            if svc.delete_document(&doc_id).await? { println!("🗑️  Deleted {doc_id}"); } else { bail!("no document '{doc_id}'"); }
        }
        Command::Search { query, mode, top_k } => {
            let mode: SearchMode = mode.parse()?;
            let res = svc.search(&query, mode, top_k).await?;
            println!("🔍 {} results for \"{}\" ({} mode, {} ms{})", res.sources.len(), query, mode, res.metadata.response_time, if res.metadata.degraded { ", keyword only" } else { "" });
            for (i, s) in res.sources.iter().enumerate() {
                println!("\n  {}. score={:.4}  {}  [{}]  {}", i + 1, s.score, s.chunk_id, s.library, s.title);
                println!("     📝 {}", s.content);
            }
        }
        Command::Query { query, mode, stream } => {
            let mode: SearchMode = mode.parse()?;
            if stream {
                let mut res = svc.query_stream(&query, mode).await?;
                let mut out = std::io::stdout();
                while let Some(fragment) = res.answer.next().await {
                    write!(out, "{}", fragment?)?;
                    out.flush()?;
                }
                println!();
                print_sources(res.sources.iter().map(|s| (s.title.as_str(), s.score)));
            } else {
                let res = svc.query(&query, mode).await?;
                println!("{}\n", res.answer);
                print_sources(res.sources.iter().map(|s| (s.title.as_str(), s.score)));
                println!("⏱️  {} ms via {}", res.metadata.response_time, res.model.provider);
            }
        }
        Command::Rebuild => print_report(&rebuild(&svc, false).await?),
        Command::Restore { yes } => {
            if !yes { bail!("restore discards every user document; pass --yes to confirm"); }
            print_report(&rebuild(&svc, true).await?);
        }
        Command::Stats => println!("{}", serde_json::to_string_pretty(&svc.stats()?)?),
    }
    svc.shutdown().await;
    Ok(())
}

fn print_sources<'a>(sources: impl Iterator<Item = (&'a str, f32)>) {
    println!("📖 Sources:");
    for (i, (title, score)) in sources.enumerate() { println!("  {}. {} ({:.4})", i + 1, title, score); }
}
