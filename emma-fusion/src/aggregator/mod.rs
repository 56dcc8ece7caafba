//! Fusion aggregator
//!
//! Runs every segment of a document through the generation provider, scores
//! each analysis, persists one artifact per segment and, when every segment
//! succeeded, a unified summary artifact.
//!
//! # Ordering
//! Segments are processed strictly in index order, one upstream call at a
//! time. A fixed [`COOLDOWN`] separates consecutive calls, retries included.
//!
//! # Failure handling
//! - Each call is bounded by a timeout and retried on transient errors.
//! - [`FailurePolicy::FailFast`] (the default) stops at the first failed
//!   segment; [`FailurePolicy::ContinueOnError`] records it and moves on.
//! - Either way, a run with any failed segment produces no summary and
//!   returns [`FusionError::Partial`]; artifacts already written stay on disk.
//! - An artifact write failure stops the run immediately.

pub mod events;
pub mod render;

pub use events::{spawn_event_logger, FusionEvent};
pub use render::{segment_artifact_name, summary_artifact_name};

use crate::error::{FusionError, GenerationError};
use crate::generation::{retry_with_backoff, Attempted, Cooldown, GenerationClient, RetryPolicy};
use crate::prompt::PromptTemplate;
use crate::score::{ScoreExtractor, ScoreSource};
use crate::segments::{validate_contiguous, Segment};
use chrono::{DateTime, Utc};
use emma_common::{time, ArtifactStore};
use render::SegmentReport;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Pause between consecutive upstream calls
pub const COOLDOWN: Duration = Duration::from_secs(2);

/// Upper bound on a single upstream call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(90);

/// What to do when a segment fails after all retries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the run at the first failed segment
    #[default]
    FailFast,
    /// Record the failure and keep processing later segments
    ContinueOnError,
}

/// One analyzed and persisted segment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentResult {
    pub segment: Segment,
    pub analysis_text: String,
    /// 0-100
    pub fusion_score: u8,
    pub score_source: ScoreSource,
    pub artifact_path: PathBuf,
    pub attempts: u32,
}

/// One segment that could not be analyzed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentFailure {
    pub index: u32,
    pub error: String,
    pub attempts: u32,
    pub transient: bool,
}

/// Per-segment record: result or error
pub type SegmentOutcome = Result<SegmentResult, SegmentFailure>;

/// Unified result of a fully successful run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionSummary {
    pub run_id: Uuid,
    pub module: String,
    /// In segment order
    pub results: Vec<SegmentResult>,
    pub average_score: f64,
    pub generated_at: DateTime<Utc>,
    pub artifact_path: PathBuf,
}

/// Report for a run in which at least one segment failed
#[derive(Debug, Clone)]
pub struct PartialFailure {
    pub run_id: Uuid,
    pub total_segments: usize,
    /// Every segment attempted, in order
    pub outcomes: Vec<SegmentOutcome>,
    /// True when the run stopped early under [`FailurePolicy::FailFast`]
    pub aborted: bool,
}

impl PartialFailure {
    /// Index of the first failed segment
    pub fn failed_at(&self) -> Option<u32> {
        self.failures().next().map(|f| f.index)
    }

    pub fn completed(&self) -> impl Iterator<Item = &SegmentResult> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &SegmentFailure> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    pub fn completed_count(&self) -> usize {
        self.completed().count()
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failed_at() {
            Some(index) => write!(
                f,
                "failed at segment {}, {} completed",
                index,
                self.completed_count()
            )?,
            None => write!(f, "{} completed", self.completed_count())?,
        }

        let later: Vec<String> = self.failures().skip(1).map(|f| f.index.to_string()).collect();
        if !later.is_empty() {
            write!(f, " (also failed: {})", later.join(", "))?;
        }
        Ok(())
    }
}

/// Arithmetic mean of fusion scores; `None` for an empty slice
pub fn average_score(results: &[SegmentResult]) -> Option<f64> {
    if results.is_empty() {
        return None;
    }
    let total: u32 = results.iter().map(|r| r.fusion_score as u32).sum();
    Some(total as f64 / results.len() as f64)
}

/// Orchestrates segments x generation client x score extractor x artifact store
pub struct FusionAggregator {
    client: Arc<dyn GenerationClient>,
    store: ArtifactStore,
    extractor: Arc<ScoreExtractor>,
    prompt: PromptTemplate,
    document: String,
    module: String,
    cooldown: Duration,
    call_timeout: Duration,
    retry: RetryPolicy,
    policy: FailurePolicy,
    event_tx: Option<mpsc::Sender<FusionEvent>>,
}

impl FusionAggregator {
    /// Aggregator for `document`, tagging artifacts with `module`
    pub fn new(
        client: Arc<dyn GenerationClient>,
        store: ArtifactStore,
        document: impl Into<String>,
        module: impl Into<String>,
    ) -> Self {
        let document = document.into();
        Self {
            client,
            store,
            extractor: Arc::new(ScoreExtractor::new()),
            prompt: PromptTemplate::new(document.clone()),
            document,
            module: module.into(),
            cooldown: COOLDOWN,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            retry: RetryPolicy::default(),
            policy: FailurePolicy::default(),
            event_tx: None,
        }
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    /// Share an extractor (and its fallback counter) with the caller
    pub fn with_extractor(mut self, extractor: Arc<ScoreExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Override the inter-call pause (embedding and tests only)
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report progress on `event_tx`
    pub fn with_events(mut self, event_tx: mpsc::Sender<FusionEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn extractor(&self) -> &ScoreExtractor {
        &self.extractor
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run the pipeline over `segments` (indices must be 1..N in order)
    pub async fn run(&self, segments: Vec<Segment>) -> Result<FusionSummary, FusionError> {
        validate_contiguous(&segments)?;

        let run_id = Uuid::new_v4();
        let started_at = time::now();
        let date = time::date_stamp(started_at);
        let total = segments.len();
        let cooldown = Cooldown::new(self.cooldown);

        info!(
            %run_id,
            module = %self.module,
            provider = self.client.name(),
            segments = total,
            policy = ?self.policy,
            "Fusion run starting"
        );
        self.emit_event(FusionEvent::RunStarted {
            run_id,
            module: self.module.clone(),
            total_segments: total,
            timestamp: started_at.timestamp(),
        })
        .await;

        let mut outcomes: Vec<SegmentOutcome> = Vec::with_capacity(total);
        let mut aborted = false;

        for segment in segments {
            let index = segment.index;
            self.emit_event(FusionEvent::SegmentStarted {
                index,
                total_segments: total,
            })
            .await;

            let attempted = self.analyze(&cooldown, &segment).await;
            match attempted.result {
                Ok(analysis_text) => {
                    let result = self
                        .persist_segment(segment, analysis_text, attempted.attempts, &date)
                        .await?;
                    info!(
                        segment = index,
                        score = result.fusion_score,
                        attempts = result.attempts,
                        "Segment fused"
                    );
                    self.emit_event(FusionEvent::SegmentCompleted {
                        index,
                        fusion_score: result.fusion_score,
                        attempts: result.attempts,
                        artifact: result.artifact_path.display().to_string(),
                    })
                    .await;
                    outcomes.push(Ok(result));
                }
                Err(err) => {
                    error!(
                        segment = index,
                        attempts = attempted.attempts,
                        error = %err,
                        "Segment analysis failed"
                    );
                    self.emit_event(FusionEvent::SegmentFailed {
                        index,
                        attempts: attempted.attempts,
                        message: err.to_string(),
                    })
                    .await;
                    outcomes.push(Err(SegmentFailure {
                        index,
                        transient: err.is_transient(),
                        error: err.to_string(),
                        attempts: attempted.attempts,
                    }));

                    if self.policy == FailurePolicy::FailFast {
                        aborted = true;
                        break;
                    }
                }
            }
        }

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        if failed > 0 {
            self.emit_event(FusionEvent::RunFinished {
                run_id,
                completed: outcomes.len() - failed,
                failed,
                timestamp: time::now().timestamp(),
            })
            .await;

            let partial = PartialFailure {
                run_id,
                total_segments: total,
                outcomes,
                aborted,
            };
            warn!(%run_id, aborted, "Fusion run incomplete: {}", partial);
            return Err(FusionError::Partial(partial));
        }

        let results: Vec<SegmentResult> = outcomes.into_iter().filter_map(Result::ok).collect();
        let summary = self.persist_summary(run_id, results, &date).await?;

        info!(
            %run_id,
            average_score = summary.average_score,
            summary = %summary.artifact_path.display(),
            "Fusion run complete"
        );
        self.emit_event(FusionEvent::RunFinished {
            run_id,
            completed: summary.results.len(),
            failed: 0,
            timestamp: time::now().timestamp(),
        })
        .await;

        Ok(summary)
    }

    /// Prompt, call upstream (cooldown, timeout, retries) and return the text
    async fn analyze(&self, cooldown: &Cooldown, segment: &Segment) -> Attempted<String> {
        let prompt = self.prompt.build(segment);
        let prompt = prompt.as_str();
        let client = &self.client;
        let call_timeout = self.call_timeout;

        debug!(
            segment = segment.index,
            prompt_chars = prompt.len(),
            "Submitting segment for analysis"
        );

        retry_with_backoff("segment analysis", &self.retry, move || async move {
            cooldown.wait().await;
            match tokio::time::timeout(call_timeout, client.submit(prompt)).await {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Timeout(call_timeout)),
            }
        })
        .await
    }

    async fn persist_segment(
        &self,
        segment: Segment,
        analysis_text: String,
        attempts: u32,
        date: &str,
    ) -> Result<SegmentResult, FusionError> {
        let outcome = self.extractor.evaluate(&analysis_text);
        if outcome.source == ScoreSource::Fallback {
            warn!(segment = segment.index, "Segment scored with fallback default");
        }

        let name = segment_artifact_name(segment.index, &self.module, date);
        let content = render::render_segment(&SegmentReport {
            document: &self.document,
            module: &self.module,
            provider: self.client.name(),
            index: segment.index,
            fusion_score: outcome.score,
            analysis_text: &analysis_text,
            generated_at: time::now(),
        });

        let artifact_path = self
            .store
            .write(&name, &content)
            .await
            .map_err(|source| FusionError::Artifact {
                artifact: name.clone(),
                source,
            })?;

        Ok(SegmentResult {
            segment,
            analysis_text,
            fusion_score: outcome.score,
            score_source: outcome.source,
            artifact_path,
            attempts,
        })
    }

    async fn persist_summary(
        &self,
        run_id: Uuid,
        results: Vec<SegmentResult>,
        date: &str,
    ) -> Result<FusionSummary, FusionError> {
        let name = summary_artifact_name(&self.module, date);
        let mut summary = FusionSummary {
            run_id,
            module: self.module.clone(),
            average_score: average_score(&results).unwrap_or(0.0),
            results,
            generated_at: time::now(),
            artifact_path: self.store.dir().join(&name),
        };

        let content = render::render_summary(&self.document, self.client.name(), &summary);
        summary.artifact_path = self
            .store
            .write(&name, &content)
            .await
            .map_err(|source| FusionError::Artifact {
                artifact: name.clone(),
                source,
            })?;

        self.emit_event(FusionEvent::SummaryWritten {
            artifact: summary.artifact_path.display().to_string(),
            average_score: summary.average_score,
        })
        .await;

        Ok(summary)
    }

    async fn emit_event(&self, event: FusionEvent) {
        if let Some(tx) = &self.event_tx {
            if tx.send(event).await.is_err() {
                debug!("Fusion event receiver dropped");
            }
        }
    }
}
