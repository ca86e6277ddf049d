use std::collections::BTreeMap;

use serde::Deserialize;

use crate::session::report::ReportBuffer;
use crate::types::{BriefingSection, Category, Phase};

/// A finished research query. Completed queries are append-only and keep
/// their arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub number: u32,
    pub category: Category,
}

/// A query still being generated, keyed by `(category, number)`. The key
/// moves to the completed list in the same reducer step that removes it
/// from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingQuery {
    pub text: String,
    pub number: u32,
    pub category: Category,
}

/// Extraction progress for one category during enrichment.
///
/// `total` may shrink when an extraction fails (the denominator only counts
/// items still expected to succeed) but never goes below zero, and
/// `enriched` never exceeds it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentCount {
    pub total: u32,
    pub enriched: u32,
}

/// Document-curation progress for one document type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct DocCount {
    #[serde(default)]
    pub initial: u32,
    #[serde(default)]
    pub kept: u32,
}

pub type DocCounts = BTreeMap<String, DocCount>;

/// Completion flags for the four briefing sections. All false at job start;
/// each flips true at most once per briefing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BriefingStatus {
    pub company: bool,
    pub industry: bool,
    pub financial: bool,
    pub news: bool,
}

impl BriefingStatus {
    pub fn mark(&mut self, section: BriefingSection) {
        match section {
            BriefingSection::Company => self.company = true,
            BriefingSection::Industry => self.industry = true,
            BriefingSection::Financial => self.financial = true,
            BriefingSection::News => self.news = true,
        }
    }

    pub fn is_done(&self, section: BriefingSection) -> bool {
        match section {
            BriefingSection::Company => self.company,
            BriefingSection::Industry => self.industry,
            BriefingSection::Financial => self.financial,
            BriefingSection::News => self.news,
        }
    }

    pub fn all_complete(&self) -> bool {
        self.company && self.industry && self.financial && self.news
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Most recent `{step, message}` published by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub step: String,
    pub message: String,
}

/// Aggregate state for one research run.
///
/// Owned exclusively by the main loop; every mutation goes through
/// `reducer::apply`. A new run replaces the whole value; nothing carries
/// over between jobs.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub phase: Option<Phase>,
    pub status: Option<StatusLine>,
    pub queries: Vec<Query>,
    pub streaming_queries: BTreeMap<(Category, u32), StreamingQuery>,
    pub enrichment_counts: BTreeMap<Category, EnrichmentCount>,
    pub doc_counts: DocCounts,
    pub briefing: BriefingStatus,
    pub report: ReportBuffer,
    pub error_message: Option<String>,
    pub is_complete: bool,
    pub in_progress: bool,
    pub reconnect_attempts: u32,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase.unwrap_or(Phase::Idle)
    }

    /// Completed-query count for one category.
    pub fn query_count(&self, category: Category) -> usize {
        self.queries.iter().filter(|q| q.category == category).count()
    }

    pub fn note_reconnect_attempt(&mut self, attempt: u32) {
        self.reconnect_attempts = attempt;
    }

    /// A successful open starts a fresh connection epoch.
    pub fn note_stream_opened(&mut self) {
        self.reconnect_attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{BriefingStatus, SessionState};
    use crate::types::{BriefingSection, Category, Phase};

    #[test]
    fn fresh_state_is_idle_and_empty() {
        let state = SessionState::new();
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.queries.is_empty());
        assert!(state.streaming_queries.is_empty());
        assert!(state.enrichment_counts.is_empty());
        assert!(state.doc_counts.is_empty());
        assert!(!state.briefing.all_complete());
        assert!(!state.is_complete);
        assert!(!state.in_progress);
        assert_eq!(state.reconnect_attempts, 0);
    }

    #[test]
    fn briefing_all_complete_requires_every_section() {
        let mut status = BriefingStatus::default();
        for section in BriefingSection::ALL {
            assert!(!status.all_complete());
            status.mark(section);
        }
        assert!(status.all_complete());
        status.reset();
        assert!(!status.all_complete());
        assert!(!status.is_done(BriefingSection::News));
    }

    #[test]
    fn reconnect_counter_resets_on_successful_open() {
        let mut state = SessionState::new();
        state.note_reconnect_attempt(1);
        state.note_reconnect_attempt(2);
        assert_eq!(state.reconnect_attempts, 2);
        state.note_stream_opened();
        assert_eq!(state.reconnect_attempts, 0);
    }

    #[test]
    fn query_count_filters_by_category() {
        let mut state = SessionState::new();
        state.queries.push(super::Query {
            text: "a".into(),
            number: 1,
            category: Category::Company,
        });
        state.queries.push(super::Query {
            text: "b".into(),
            number: 1,
            category: Category::News,
        });
        assert_eq!(state.query_count(Category::Company), 1);
        assert_eq!(state.query_count(Category::Financial), 0);
    }
}
