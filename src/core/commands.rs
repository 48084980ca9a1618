use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::errors::CoreError;
use super::models::{BulkUploadReport, DocumentUpload, FailedUpload, RuntimeSettings};
use super::service::{describe_failures, failed_upload, ScreeningService};
use super::settings_store::SettingsStore;

/// Rank candidate CVs against job descriptions by TF-IDF cosine similarity.
#[derive(Parser, Debug)]
#[command(name = "cv-match")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file (default: <app data>/CvMatch/settings.json)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Vectorizer file, overrides settings and environment
    #[arg(long, global = true)]
    pub vectorizer: Option<PathBuf>,

    /// pdftotext executable, overrides settings and environment
    #[arg(long, global = true)]
    pub pdftotext: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract skills, experience and education from one document
    Parse(ParseArgs),
    /// Fit a vectorizer on a corpus of documents and persist it
    Train(TrainArgs),
    /// Rank CVs against one job description
    Rank(RankArgs),
    /// Report whether ranking is available
    Health,
    /// Show the resolved settings
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Write the resolved settings to the settings file
    #[arg(long)]
    pub save: bool,
}

#[derive(Args, Debug)]
pub struct ParseArgs {
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Vocabulary cap
    #[arg(long)]
    pub max_features: Option<usize>,
}

#[derive(Args, Debug)]
pub struct RankArgs {
    /// Candidate CV files
    #[arg(long, required = true, num_args = 1..)]
    pub cvs: Vec<PathBuf>,

    /// Job description file
    #[arg(long, conflicts_with = "job_text", required_unless_present = "job_text")]
    pub job: Option<PathBuf>,

    /// Job description as plain text
    #[arg(long)]
    pub job_text: Option<String>,

    /// Title for a plain-text job description
    #[arg(long, requires = "job_text")]
    pub title: Option<String>,

    /// Number of candidates to return (default from settings)
    #[arg(long)]
    pub top_n: Option<usize>,
}

pub fn settings_store(cli: &Cli) -> SettingsStore {
    match &cli.settings {
        Some(path) => SettingsStore::new_with_path(path.clone()),
        None => SettingsStore::new(),
    }
}

// Settings file, then environment, then command-line flags.
pub async fn resolve_settings(
    cli: &Cli,
    store: &SettingsStore,
) -> anyhow::Result<RuntimeSettings> {
    let mut settings = store.load_with_env().await?;
    if let Some(path) = &cli.vectorizer {
        settings.vectorizer_path = path.clone();
    }
    if let Some(path) = &cli.pdftotext {
        settings.pdftotext_path = path.clone();
    }
    if let Command::Train(args) = &cli.command {
        if let Some(max_features) = args.max_features {
            settings.max_features = max_features.max(1);
        }
    }

    Ok(settings)
}

pub async fn execute(cli: &Cli) -> anyhow::Result<Value> {
    let store = settings_store(cli);
    let settings = resolve_settings(cli, &store).await?;
    debug!(vectorizer = %settings.vectorizer_path.display(), "settings resolved");

    match &cli.command {
        Command::Parse(args) => {
            let service = ScreeningService::new(settings).await;
            let sections = service.parse_document(read_upload(&args.file).await?).await?;
            Ok(serde_json::to_value(sections)?)
        }
        Command::Train(args) => train(&ScreeningService::new(settings).await, args).await,
        Command::Rank(args) => rank(&ScreeningService::new(settings).await, args).await,
        Command::Health => {
            let service = ScreeningService::new(settings).await;
            Ok(serde_json::to_value(service.health().await)?)
        }
        Command::Config(args) => config(&store, &settings, args).await,
    }
}

async fn config(
    store: &SettingsStore,
    settings: &RuntimeSettings,
    args: &ConfigArgs,
) -> anyhow::Result<Value> {
    if args.save {
        store.save(settings).await.with_context(|| {
            format!("failed to write settings file {}", store.path().display())
        })?;
        info!(path = %store.path().display(), "settings saved");
    }

    Ok(json!({
        "path": store.path(),
        "saved": args.save,
        "settings": settings,
    }))
}

async fn train(service: &ScreeningService, args: &TrainArgs) -> anyhow::Result<Value> {
    let (readable, unreadable) = read_uploads(&args.files).await;
    if readable.is_empty() {
        return Err(CoreError::EmptyInput(format!(
            "no training documents could be read: {}",
            describe_failures(&unreadable)
        ))
        .into());
    }

    let mut report = match service.train_from_documents(readable).await {
        Ok(report) => report,
        Err(err) if !unreadable.is_empty() => {
            return Err(err.context(format!(
                "also unreadable: {}",
                describe_failures(&unreadable)
            )))
        }
        Err(err) => return Err(err),
    };
    report.failed.extend(unreadable);
    Ok(serde_json::to_value(report)?)
}

async fn rank(service: &ScreeningService, args: &RankArgs) -> anyhow::Result<Value> {
    let (readable, unreadable) = read_uploads(&args.cvs).await;
    let mut uploads = if readable.is_empty() {
        BulkUploadReport::default()
    } else {
        service.upload_cvs_bulk(readable).await?
    };
    uploads.failed.extend(unreadable);

    if uploads.successful.is_empty() {
        return Err(CoreError::EmptyInput(format!(
            "no CVs could be read or parsed: {}",
            describe_failures(&uploads.failed)
        ))
        .into());
    }

    let job = match (&args.job, &args.job_text) {
        (Some(path), _) => service.upload_job_file(read_upload(path).await?).await?,
        (None, Some(text)) => service.add_job_text(args.title.as_deref(), text).await?,
        (None, None) => anyhow::bail!("either --job or --job-text is required"),
    };

    let top_n = args.top_n.unwrap_or(service.settings().default_top_n);
    let report = service
        .recommend(Some(job.job_id.as_str()), Some(top_n))
        .await?;

    Ok(json!({
        "uploads": uploads,
        "recommendations": report,
    }))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|v| v.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

async fn read_upload(path: &Path) -> Result<DocumentUpload, CoreError> {
    let data = tokio::fs::read(path).await.map_err(|err| CoreError::Read {
        file_name: path.display().to_string(),
        reason: err.to_string(),
    })?;

    Ok(DocumentUpload::new(display_name(path), data))
}

// Unreadable paths are reported instead of aborting the batch.
async fn read_uploads(paths: &[PathBuf]) -> (Vec<DocumentUpload>, Vec<FailedUpload>) {
    let mut uploads = Vec::with_capacity(paths.len());
    let mut failed = Vec::new();
    for path in paths {
        match read_upload(path).await {
            Ok(upload) => uploads.push(upload),
            Err(err) => {
                warn!("{err}");
                failed.push(failed_upload(display_name(path), &err.into()));
            }
        }
    }
    (uploads, failed)
}
