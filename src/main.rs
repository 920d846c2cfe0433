use anyhow::Context;
use clap::Parser;
use docwise::gateway::{AzureChatGateway, LanguageModel};
use docwise::knowledge::KnowledgeBase;
use docwise::pipeline::{BatchSettings, ConversationTurn, DocumentAnalysis, DocumentPipeline};
use docwise::{config, logging};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use walkdir::WalkDir;

const RECOGNIZED_EXTENSIONS: [&str; 4] = ["pdf", "docx", "xlsx", "pptx"];

/// Analyze documents and answer questions about them.
#[derive(Parser)]
#[command(name = "docwise", version)]
struct Cli {
    /// Document files or directories to analyze.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Directory to write the analysis and persona JSON records into.
    #[arg(long)]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    config::init_config();
    let cli = Cli::parse();

    let files = collect_files(&cli.paths);
    anyhow::ensure!(!files.is_empty(), "No recognized documents found");

    let gateway: Arc<dyn LanguageModel> = Arc::new(AzureChatGateway::from_config()?);
    let pipeline = Arc::new(DocumentPipeline::new(
        gateway.clone(),
        None,
        BatchSettings::from_config(),
    ));
    let knowledge = Arc::new(Mutex::new(KnowledgeBase::new()));

    ingest(&files, &pipeline, &knowledge, cli.export.as_deref()).await;

    let snapshot = pipeline.metrics();
    tracing::info!(
        documents = snapshot.documents_processed,
        pages = snapshot.pages_processed,
        flagged = snapshot.pages_flagged,
        model_failures = snapshot.model_failures,
        "Ingestion complete"
    );

    if knowledge.lock().await.is_empty() {
        anyhow::bail!("No documents were processed successfully");
    }

    question_loop(gateway.as_ref(), &knowledge).await
}

/// Process every file concurrently; a failing document is reported and
/// skipped without affecting its siblings.
async fn ingest(
    files: &[PathBuf],
    pipeline: &Arc<DocumentPipeline>,
    knowledge: &Arc<Mutex<KnowledgeBase>>,
    export_dir: Option<&Path>,
) {
    let mut tasks = JoinSet::new();
    for path in files {
        let path = path.clone();
        let pipeline = pipeline.clone();
        let knowledge = knowledge.clone();
        let export_dir = export_dir.map(Path::to_path_buf);

        tasks.spawn(async move {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read '{}'", path.display()))?;
            let analysis = pipeline.run(&bytes, &file_name).await?;
            if let Some(dir) = export_dir {
                export_records(&dir, &analysis)?;
            }
            knowledge.lock().await.register(analysis);
            anyhow::Ok(file_name)
        });
    }

    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(name)) => tracing::info!(document = %name, "Document ready"),
            Ok(Err(error)) => tracing::error!(error = %error, "Document processing failed"),
            Err(error) => tracing::error!(error = %error, "Document task panicked"),
        }
    }
}

/// Read questions from stdin until EOF or an empty line.
async fn question_loop(
    model: &dyn LanguageModel,
    knowledge: &Arc<Mutex<KnowledgeBase>>,
) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Ask questions about the documents (empty line to exit).");

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let question = match lines.next_line().await? {
            Some(line) if !line.trim().is_empty() => line.trim().to_string(),
            _ => break,
        };

        let mut kb = knowledge.lock().await;
        match kb.answer(model, &question).await {
            Ok(answer) => {
                println!("{answer}");
                kb.append(ConversationTurn { question, answer });
            }
            Err(error) => eprintln!("Failed to answer: {error}"),
        }
    }

    Ok(())
}

/// Expand file and directory arguments into recognized document paths.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file())
            {
                if has_recognized_extension(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    files.sort();
    files
}

fn has_recognized_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            RECOGNIZED_EXTENSIONS
                .iter()
                .any(|known| extension.eq_ignore_ascii_case(known))
        })
}

/// Write the canonical analysis record and the persona record as JSON.
fn export_records(dir: &Path, analysis: &DocumentAnalysis) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory '{}'", dir.display()))?;

    let stem = Path::new(&analysis.document_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| analysis.document_name.clone());

    let analysis_path = dir.join(format!("{stem}.analysis.json"));
    std::fs::write(&analysis_path, serde_json::to_vec_pretty(analysis)?)
        .with_context(|| format!("Failed to write '{}'", analysis_path.display()))?;

    let persona_path = dir.join(format!("{stem}.persona.json"));
    std::fs::write(&persona_path, serde_json::to_vec_pretty(&analysis.persona)?)
        .with_context(|| format!("Failed to write '{}'", persona_path.display()))?;

    tracing::info!(
        document = %analysis.document_name,
        path = %analysis_path.display(),
        "Exported analysis records"
    );
    Ok(())
}
