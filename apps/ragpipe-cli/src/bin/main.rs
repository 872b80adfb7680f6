use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ragpipe_azure::{AzureBlobStore, AzureOpenAiCompletion, AzureSearchService};
use ragpipe_core::blob::FsBlobStore;
use ragpipe_core::config::{Backend, Settings};
use ragpipe_core::traits::{BlobStore, CompletionService, SearchService};
use ragpipe_core::{Error, Stage};
use ragpipe_rag::Pipeline;
use ragpipe_text::TantivySearchService;

#[derive(Parser)]
#[command(name = "ragpipe", about = "Index a PDF for search and answer questions about it", version)]
struct Cli {
    /// Extra TOML config merged after config.toml / config.<env>.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging for ragpipe crates
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload and index a PDF, then answer a question about it
    Run {
        #[arg(long, alias = "file_path")]
        file_path: PathBuf,
        #[arg(long, alias = "blob_name")]
        blob_name: String,
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long)]
        top_k: Option<usize>,
        /// Ask this instead of reading a question from stdin
        #[arg(long)]
        question: Option<String>,
        /// Keep asking until EOF or "exit"
        #[arg(long)]
        interactive: bool,
    },
    /// Upload and index a PDF without asking anything
    Ingest {
        #[arg(long, alias = "file_path")]
        file_path: PathBuf,
        /// Defaults to the file's base name
        #[arg(long, alias = "blob_name")]
        blob_name: Option<String>,
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Answer questions against the existing index (reads stdin if no question is given)
    Ask {
        question: Option<String>,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Delete every document from the configured index
    Clear,
}

fn init_tracing(verbose: bool) {
    let ours = if verbose { "debug" } else { "info" };
    let default = format!("warn,ragpipe={ours},ragpipe_core={ours},ragpipe_text={ours},ragpipe_azure={ours},ragpipe_rag={ours}");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn blob_store(settings: &Settings) -> Result<Arc<dyn BlobStore>, Error> {
    let store: Arc<dyn BlobStore> = match settings.blob.backend {
        Backend::Local => Arc::new(FsBlobStore::new(&settings.blob)),
        Backend::Azure => Arc::new(AzureBlobStore::new(&settings.blob, &settings.http).map_err(|e| Error::InvalidConfig(format!("{e:#}")))?),
    };
    Ok(store)
}

fn search_service(settings: &Settings) -> Result<Arc<dyn SearchService>, Error> {
    let service: Arc<dyn SearchService> = match settings.search.backend {
        Backend::Local => Arc::new(TantivySearchService::from_config(&settings.search)),
        Backend::Azure => Arc::new(
            AzureSearchService::new(&settings.search, &settings.indexing, &settings.http).map_err(|e| Error::InvalidConfig(format!("{e:#}")))?,
        ),
    };
    Ok(service)
}

fn completion_service(settings: &Settings) -> Result<Arc<dyn CompletionService>, Error> {
    settings.require_completion()?;
    let client = AzureOpenAiCompletion::new(&settings.completion, &settings.http).map_err(|e| Error::InvalidConfig(format!("{e:#}")))?;
    Ok(Arc::new(client))
}

fn pipeline(settings: &Settings, with_completion: bool) -> Result<Pipeline, Error> {
    let pipeline = Pipeline::new(settings, blob_store(settings)?, search_service(settings)?)?;
    Ok(if with_completion { pipeline.with_completion(completion_service(settings)?) } else { pipeline })
}

fn default_blob_name(file_path: &Path) -> anyhow::Result<String> {
    match file_path.file_name().and_then(|n| n.to_str()) {
        Some(name) => Ok(name.to_string()),
        None => bail!("cannot derive a blob name from {}", file_path.display()),
    }
}

fn ingest(pipeline: &Pipeline, file_path: &Path, blob_name: &str) -> Result<(), Error> {
    let report = pipeline.ingest(file_path, blob_name)?;
    eprintln!("Indexed {} chunks from {} into '{}'.", report.indexed, report.blob_name, pipeline.index_name());
    Ok(())
}

/// Prompt on `out` and read one line. Only the line ending is stripped so
/// the question reaches the prompt exactly as typed.
fn read_question(input: &mut impl BufRead, out: &mut impl Write) -> io::Result<Option<String>> {
    write!(out, "Enter your question: ")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Nothing is written to `out` unless an answer was produced.
fn answer_once(pipeline: &Pipeline, question: &str, top_k: Option<usize>, out: &mut impl Write) -> anyhow::Result<()> {
    let answer = match top_k {
        Some(k) => pipeline.ask_with_top_k(question, k)?,
        None => pipeline.ask(question)?,
    };
    writeln!(out, "{}", answer.text)?;
    Ok(())
}

/// One question per line until EOF or "exit"; a failed question is reported
/// and the loop moves on.
fn chat_loop(pipeline: &Pipeline, top_k: Option<usize>, input: &mut impl BufRead, out: &mut impl Write) -> anyhow::Result<()> {
    while let Some(question) = read_question(input, out)? {
        if question.trim().eq_ignore_ascii_case("exit") {
            break;
        }
        if question.trim().is_empty() {
            continue;
        }
        if let Err(e) = answer_once(pipeline, &question, top_k, out) {
            eprintln!("error: {e:#}");
        }
    }
    Ok(())
}

fn ask(
    pipeline: &Pipeline,
    question: Option<String>,
    top_k: Option<usize>,
    interactive: bool,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    if let Some(q) = question {
        return answer_once(pipeline, &q, top_k, out);
    }
    if interactive {
        return chat_loop(pipeline, top_k, input, out);
    }
    match read_question(input, out)? {
        Some(q) if !q.trim().is_empty() => answer_once(pipeline, &q, top_k, out),
        _ => bail!("no question provided"),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_for_env(&std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string()), Some(path.as_path()))?,
        None => Settings::load()?,
    };
    debug!(
        blob = ?settings.blob.backend,
        search = ?settings.search.backend,
        index = %settings.search.index_name,
        "settings loaded"
    );

    match cli.command {
        Command::Run { file_path, blob_name, chunk_size, top_k, question, interactive } => {
            if let Some(n) = chunk_size { settings.chunking.chunk_size = n; }
            if let Some(k) = top_k { settings.retrieval.top_k = k; }
            let pipeline = pipeline(&settings, true)?;
            ingest(&pipeline, &file_path, &blob_name)?;
            ask(&pipeline, question, None, interactive, &mut io::stdin().lock(), &mut io::stdout().lock())
        }
        Command::Ingest { file_path, blob_name, chunk_size } => {
            if let Some(n) = chunk_size { settings.chunking.chunk_size = n; }
            let blob_name = match blob_name { Some(name) => name, None => default_blob_name(&file_path)? };
            ingest(&pipeline(&settings, false)?, &file_path, &blob_name)?;
            Ok(())
        }
        Command::Ask { question, top_k } => {
            let interactive = question.is_none();
            ask(&pipeline(&settings, true)?, question, top_k, interactive, &mut io::stdin().lock(), &mut io::stdout().lock())
        }
        Command::Clear => {
            let deleted = pipeline(&settings, false)?.clear()?;
            eprintln!("Deleted {} documents from '{}'.", deleted, settings.search.index_name);
            Ok(())
        }
    }
}

/// Distinct exit status per failed stage so scripts can tell them apart.
fn exit_status(stage: Stage) -> u8 {
    match stage {
        Stage::Config => 2,
        Stage::Read => 3,
        Stage::Upload => 4,
        Stage::Index => 5,
        Stage::Retrieve => 6,
        Stage::Complete => 7,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<Error>() {
            Some(stage_err) => {
                eprintln!("error: {stage_err}");
                ExitCode::from(exit_status(stage_err.stage()))
            }
            None => {
                eprintln!("error: {e:#}");
                ExitCode::FAILURE
            }
        },
    }
}
