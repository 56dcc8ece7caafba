//! emma-fusion - segment fusion runner
//!
//! Loads the segments of one source document, analyzes each with the
//! configured generation provider, writes per-segment reports plus a unified
//! summary to `<root>/data/fusion_reports/`, and exits non-zero when any
//! segment fails.

use anyhow::{Context, Result};
use clap::Parser;
use emma_common::config::{self, RootLayout};
use emma_common::ArtifactStore;
use emma_fusion::aggregator::{spawn_event_logger, FailurePolicy, FusionAggregator, FusionEvent};
use emma_fusion::generation::{client_for, ProviderSettings, RetryPolicy};
use emma_fusion::prompt::PromptTemplate;
use emma_fusion::segments::{DirectorySegmentSource, SegmentSource};
use emma_fusion::FusionError;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "emma-fusion", version, about = "Run the segment fusion pipeline")]
struct Args {
    /// Root folder holding sources/ and data/
    #[arg(long, env = "EMMA_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, env = "EMMA_CONFIG")]
    config: Option<PathBuf>,

    /// Generation provider: openai or gemini
    #[arg(long)]
    provider: Option<String>,

    /// Provider model override
    #[arg(long)]
    model: Option<String>,

    /// API key (takes priority over environment and TOML)
    #[arg(long)]
    api_key: Option<String>,

    /// Module tag used in artifact names
    #[arg(long)]
    module: Option<String>,

    /// Source document title
    #[arg(long)]
    document: Option<String>,

    /// Segment directory (default: <root>/sources/<document>)
    #[arg(long)]
    segments: Option<PathBuf>,

    /// Require exactly this many segments
    #[arg(long)]
    expected_segments: Option<u32>,

    /// Record failed segments and keep going instead of stopping at the first
    #[arg(long)]
    continue_on_error: bool,

    /// Maximum characters of segment text sent per prompt
    #[arg(long)]
    max_chars: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = config::resolve_config_path(args.config.as_deref());
    let toml_config = config::load_toml_config(config_path.as_deref())
        .context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        "Starting emma-fusion v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let layout = RootLayout::new(root_folder);
    layout
        .ensure_directories()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", layout.root().display());

    let fusion = &toml_config.fusion;
    let generation = &toml_config.generation;

    let document = args
        .document
        .clone()
        .unwrap_or_else(|| fusion.source_document.clone());
    let provider = args
        .provider
        .clone()
        .unwrap_or_else(|| generation.provider.clone());
    let module = args.module.clone().unwrap_or_else(|| {
        if args.provider.is_some() {
            provider.clone()
        } else {
            fusion.module.clone()
        }
    });

    // Segments first: a bad input directory should fail before any key lookup
    let segments_dir = args
        .segments
        .clone()
        .unwrap_or_else(|| layout.segments_dir(&document));
    let mut source = DirectorySegmentSource::new(&segments_dir);
    if let Some(count) = args.expected_segments.or(fusion.expected_segments) {
        source = source.with_expected_count(count);
    }
    let segments = source.load().await?;
    info!("Loaded {} segments from {}", segments.len(), source.describe());

    let api_key =
        emma_fusion::config::resolve_api_key(&provider, args.api_key.as_deref(), generation)?;
    let call_timeout = Duration::from_secs(fusion.call_timeout_secs.max(1));
    let client = client_for(&ProviderSettings {
        provider: provider.clone(),
        api_key,
        model: args.model.clone().or_else(|| generation.model.clone()),
        base_url: generation.base_url.clone(),
        timeout: call_timeout,
    })?;

    let policy = if args.continue_on_error || !fusion.fail_fast {
        FailurePolicy::ContinueOnError
    } else {
        FailurePolicy::FailFast
    };
    let max_chars = args.max_chars.unwrap_or(fusion.max_segment_chars);

    let (event_tx, event_rx) = mpsc::channel::<FusionEvent>(32);
    let event_logger = spawn_event_logger(event_rx);

    let aggregator = FusionAggregator::new(
        client,
        ArtifactStore::new(layout.fusion_reports_dir()),
        document.clone(),
        module,
    )
    .with_prompt(PromptTemplate::new(document).with_max_chars(max_chars))
    .with_call_timeout(call_timeout)
    .with_retry(RetryPolicy::default().with_max_attempts(fusion.max_attempts))
    .with_failure_policy(policy)
    .with_events(event_tx);

    let outcome = aggregator.run(segments).await;
    let fallbacks = aggregator.extractor().fallback_count();
    drop(aggregator);
    if let Err(e) = event_logger.await {
        error!("Event logger task failed: {}", e);
    }

    if fallbacks > 0 {
        warn!("{} segment(s) scored with the fallback default", fallbacks);
    }

    match outcome {
        Ok(summary) => {
            info!(
                "Fusion complete: {} segments, average score {:.1}/100",
                summary.results.len(),
                summary.average_score
            );
            info!("Summary: {}", summary.artifact_path.display());
            Ok(())
        }
        Err(FusionError::Partial(partial)) => {
            for failure in partial.failures() {
                error!(
                    "Segment {} failed after {} attempt(s): {}",
                    failure.index, failure.attempts, failure.error
                );
            }
            Err(anyhow::anyhow!("Fusion run incomplete: {}", partial))
        }
        Err(e) => Err(e.into()),
    }
}
