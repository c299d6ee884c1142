use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use docqa_rag::{
    DocumentKind, DocumentLoader, EmbeddingProvider, GeminiLlm, HuggingFaceEmbeddingProvider,
    OllamaEmbeddingProvider, PersistentVectorStore, RagConfig, RagError, RagPipeline,
    collection_name_for, gemini, huggingface, ollama,
};
use docqa_cli::{prompt_line, run_chat};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docqa", version, about = "Ask questions about a text file or PDF")]
struct Cli {
    /// Document to load; prompted for when omitted
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Directory holding persisted collections
    #[arg(long, env = "DOCQA_PERSIST_DIR", default_value = docqa_rag::DEFAULT_PERSIST_DIR)]
    persist_dir: PathBuf,

    /// Where embeddings are computed
    #[arg(long, env = "DOCQA_EMBEDDING_BACKEND", value_enum, default_value_t = Backend::HuggingFace)]
    embedding_backend: Backend,

    /// Embedding model name (backend default when omitted)
    #[arg(long, env = "DOCQA_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// Length of the vectors the embedding model produces
    #[arg(long, env = "DOCQA_EMBEDDING_DIMENSIONS", default_value_t = 384)]
    embedding_dimensions: usize,

    /// Ollama server URL
    #[arg(long, env = "DOCQA_OLLAMA_URL", default_value = ollama::DEFAULT_BASE_URL)]
    ollama_url: String,

    /// Gemini model used to answer
    #[arg(long, env = "DOCQA_LLM_MODEL", default_value = gemini::DEFAULT_MODEL)]
    llm_model: String,

    /// Sampling temperature for answers
    #[arg(long, env = "DOCQA_TEMPERATURE", default_value_t = gemini::DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Drop the document's collection and index it again
    #[arg(long)]
    rebuild: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Hosted Hugging Face inference
    #[value(name = "huggingface")]
    HuggingFace,
    /// Local Ollama runtime
    Ollama,
}

const OLLAMA_DEFAULT_MODEL: &str = "all-minilm";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn embedding_provider(cli: &Cli) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match cli.embedding_backend {
        Backend::HuggingFace => {
            let model = cli.embedding_model.as_deref().unwrap_or(huggingface::DEFAULT_MODEL);
            Arc::new(
                HuggingFaceEmbeddingProvider::from_env()?
                    .with_model(model, cli.embedding_dimensions),
            )
        }
        Backend::Ollama => {
            let model = cli.embedding_model.as_deref().unwrap_or(OLLAMA_DEFAULT_MODEL);
            Arc::new(
                OllamaEmbeddingProvider::new(model, cli.embedding_dimensions)
                    .with_base_url(&cli.ollama_url),
            )
        }
    };
    Ok(provider)
}

/// Resolve the document to load, prompting for the type and name if needed.
fn choose_document<R: BufRead, W: Write>(
    cli: &Cli,
    input: &mut R,
    output: &mut W,
) -> Result<(PathBuf, DocumentKind)> {
    if let Some(path) = &cli.file {
        return Ok((path.clone(), DocumentKind::from_path(path)));
    }

    let Some(selector) = prompt_line(input, output, "Select document type (1 = text, 2 = PDF): ")?
    else {
        bail!("no document type given");
    };
    let kind = DocumentKind::from_selector(&selector);

    let Some(name) = prompt_line(input, output, "Enter the file name: ")? else {
        bail!("no file name given");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("no file name given");
    }
    Ok((PathBuf::from(name), kind))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging();

    let has_key = gemini::api_key_from_env().is_some();
    println!("Google API key loaded: {}", if has_key { "yes" } else { "no" });

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();

    let (path, kind) = choose_document(&cli, &mut input, &mut output)?;
    let documents = DocumentLoader::load(&path, kind)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let collection = collection_name_for(&path);

    let config = RagConfig::builder().persist_dir(&cli.persist_dir).build()?;
    let store = PersistentVectorStore::open(&config.persist_dir).with_context(|| {
        format!("failed to open persist directory {}", config.persist_dir.display())
    })?;
    let llm = GeminiLlm::from_env()?.with_model(&cli.llm_model).with_temperature(cli.temperature);

    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(embedding_provider(&cli)?)
        .vector_store(Arc::new(store))
        .llm(Arc::new(llm))
        .build()?;

    let indexed = if cli.rebuild {
        pipeline.rebuild_collection(&collection, &documents).await
    } else {
        pipeline.index_documents(&collection, &documents).await
    };
    let report = match indexed {
        Ok(report) => report,
        Err(e @ RagError::CorruptCollection { .. }) => {
            return Err(e).context("rerun with --rebuild to index the document again");
        }
        Err(e) => return Err(e.into()),
    };

    if report.created {
        println!("Created collection '{collection}' with {} chunks", report.total_chunks);
    } else {
        println!(
            "Opened collection '{collection}' ({} chunks, {} added)",
            report.total_chunks, report.chunks_added
        );
    }

    let answered = run_chat(&pipeline, &collection, input, &mut output).await?;
    pipeline.close().await?;
    tracing::info!(answered, "session finished");
    Ok(())
}
