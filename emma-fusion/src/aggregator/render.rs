//! Artifact names and markdown bodies
//!
//! Names are deterministic in (segment index, module, date); repeating a run
//! on the same day with the same module overwrites the earlier files.

use super::{FusionSummary, SegmentResult};
use chrono::{DateTime, Utc};
use emma_common::time;

/// `segment-fusion-03-openai-2025-11-09.md`
pub fn segment_artifact_name(index: u32, module: &str, date: &str) -> String {
    format!("segment-fusion-{:02}-{}-{}.md", index, module_slug(module), date)
}

/// `fusion-summary-openai-2025-11-09.md`
pub fn summary_artifact_name(module: &str, date: &str) -> String {
    format!("fusion-summary-{}-{}.md", module_slug(module), date)
}

/// Lowercase, with anything outside `[a-z0-9]` collapsed to `-`
pub fn module_slug(module: &str) -> String {
    let mut slug = String::with_capacity(module.len());
    for c in module.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "module".to_string()
    } else {
        slug.to_string()
    }
}

pub(crate) struct SegmentReport<'a> {
    pub document: &'a str,
    pub module: &'a str,
    pub provider: &'a str,
    pub index: u32,
    pub fusion_score: u8,
    pub analysis_text: &'a str,
    pub generated_at: DateTime<Utc>,
}

pub(crate) fn render_segment(report: &SegmentReport<'_>) -> String {
    format!(
        "# {document} - Segment {index:02} Fusion Analysis\n\
         **Generated:** {generated}\n\
         **Module:** {module} ({provider})\n\
         **Source:** segment_{index:02}.md\n\
         **Fusion Score:** {score}/100\n\
         \n\
         ---\n\
         \n\
         {analysis}\n\
         \n\
         ---\n",
        document = report.document,
        index = report.index,
        generated = time::iso(report.generated_at),
        module = report.module,
        provider = report.provider,
        score = report.fusion_score,
        analysis = report.analysis_text.trim(),
    )
}

pub(crate) fn render_summary(document: &str, provider: &str, summary: &FusionSummary) -> String {
    let total_chars: usize = summary
        .results
        .iter()
        .map(|r| r.analysis_text.chars().count())
        .sum();

    let mut out = format!(
        "# {document} - Unified Fusion Summary\n\
         **Generated:** {generated}\n\
         **Module:** {module} ({provider})\n\
         **Run:** {run_id}\n\
         \n\
         ---\n\
         \n\
         ## Pipeline Summary\n\
         \n\
         **Segments Processed:** {count}/{count}\n\
         **Average Fusion Score:** {average:.1}/100\n\
         **Total Analysis Output:** {total_chars} characters\n\
         \n\
         ## Segment Artifacts\n\
         \n\
         | Segment | Score | Characters | Artifact |\n\
         |---------|-------|------------|----------|\n",
        document = document,
        generated = time::iso(summary.generated_at),
        module = summary.module,
        provider = provider,
        run_id = summary.run_id,
        count = summary.results.len(),
        average = summary.average_score,
        total_chars = total_chars,
    );

    for result in &summary.results {
        out.push_str(&format!(
            "| {:02} | {}/100 | {} | {} |\n",
            result.segment.index,
            result.fusion_score,
            result.analysis_text.chars().count(),
            artifact_file_name(result),
        ));
    }

    out
}

fn artifact_file_name(result: &SegmentResult) -> String {
    result
        .artifact_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| result.artifact_path.display().to_string())
}
