//! Shared test utilities for emma-fusion

#![allow(dead_code)]

pub mod log_capture;

pub use log_capture::{capture_logs, LogCapture};

use async_trait::async_trait;
use emma_fusion::generation::GenerationClient;
use emma_fusion::GenerationError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

type Responder = dyn Fn(u32, u32) -> Result<String, GenerationError> + Send + Sync;

/// Generation client driven by a `(segment index, attempt) -> response` script
///
/// Records every call and the highest number of calls in flight at once.
pub struct ScriptedClient {
    responder: Box<Responder>,
    delay: Duration,
    calls: Mutex<Vec<(u32, Instant)>>,
    attempts: Mutex<HashMap<u32, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(u32, u32) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: Duration::from_millis(10),
            calls: Mutex::new(Vec::new()),
            attempts: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answer each segment with the matching score from `scores`
    pub fn with_scores(scores: &'static [u8]) -> Self {
        Self::new(move |index, _| Ok(analysis_with_score(scores[index as usize - 1])))
    }

    /// Simulated upstream latency per call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Segment indices in call order (retries included)
    pub fn call_order(&self) -> Vec<u32> {
        self.calls.lock().unwrap().iter().map(|(i, _)| *i).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, prompt: &str) -> Result<String, GenerationError> {
        let index = segment_index(prompt);
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let entry = attempts.entry(index).or_insert(0);
            *entry += 1;
            *entry
        };
        self.calls.lock().unwrap().push((index, Instant::now()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.responder)(index, attempt)
    }
}

/// Segment index embedded in a prompt ("Analyze segment 03 of ...")
pub fn segment_index(prompt: &str) -> u32 {
    prompt
        .split_whitespace()
        .skip_while(|word| *word != "segment")
        .nth(1)
        .and_then(|n| n.parse().ok())
        .expect("prompt names its segment")
}

pub fn analysis_with_score(score: u8) -> String {
    format!(
        "## Key Strategic Insights\n- Diversification is accelerating\n\n{{\"fusion_score\": {}}}",
        score
    )
}

/// Sorted file names in `dir`
pub fn artifact_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
