//! Fixed prompt template for segment analysis
//!
//! The upstream providers enforce input-size limits, so segment text is cut
//! to `max_chars` characters before it is embedded.

use crate::segments::Segment;

/// Default cap on embedded segment text
pub const DEFAULT_MAX_SEGMENT_CHARS: usize = 4000;

/// System instruction sent alongside every segment prompt
pub const SYSTEM_PROMPT: &str = "You are a strategic intelligence analyst. \
Provide concise, actionable insights for C-level executives.";

/// Builds the per-segment analysis prompt
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    document_title: String,
    max_chars: usize,
}

impl PromptTemplate {
    pub fn new(document_title: impl Into<String>) -> Self {
        Self {
            document_title: document_title.into(),
            max_chars: DEFAULT_MAX_SEGMENT_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn build(&self, segment: &Segment) -> String {
        let text = segment.truncated_text(self.max_chars);
        format!(
            "Analyze segment {index:02} of the research document \"{title}\".\n\
             \n\
             Provide:\n\
             1. **Key Strategic Insights** (3-5 bullet points)\n\
             2. **Investment Opportunities** (2-3 sectors with rationale)\n\
             3. **Risk Factors** (2-3 critical concerns)\n\
             4. **Fusion Score** (0-100: clarity + actionability + strategic value)\n\
             \n\
             Format the analysis in Markdown. Finish with one final line containing only \
             this JSON object, with your score filled in:\n\
             {{\"fusion_score\": <integer 0-100>}}\n\
             \n\
             ---\n\
             SEGMENT {index:02} CONTENT:\n\
             {text}\n\
             ---\n",
            index = segment.index,
            title = self.document_title,
            text = text,
        )
    }
}
