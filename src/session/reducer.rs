use std::time::Duration;

use crate::session::state::{
    DocCount, EnrichmentCount, Query, SessionState, StatusLine, StreamingQuery,
};
use crate::stream::event::StatusEvent;
use crate::types::Phase;

/// Grace delay before a finished section collapses in the display.
pub const QUERY_COLLAPSE_DELAY: Duration = Duration::from_secs(1);
pub const ENRICHMENT_COLLAPSE_DELAY: Duration = Duration::from_secs(1);
pub const BRIEFING_COLLAPSE_DELAY: Duration = Duration::from_secs(2);

/// Presentation hints emitted alongside a state change. These are advisory
/// output for the rendering layer. Dropping every hint must leave the
/// session state itself fully correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    ShowQueries,
    CollapseQueries { after: Duration },
    CollapseEnrichment { after: Duration },
    CollapseBriefing { after: Duration },
}

/// Apply one decoded event to the session state.
///
/// This is the single place session state changes. It is synchronous and
/// infallible: events with fields we cannot use were already dropped by the
/// decoder, and anything surprising here degrades to "no update for this
/// aspect".
pub fn apply(state: &mut SessionState, event: &StatusEvent) -> Vec<Hint> {
    let mut hints = Vec::new();

    // A completed run is frozen. The only way forward is a full reset.
    if state.is_complete {
        return hints;
    }

    if let Some(phase) = implied_phase(event) {
        advance_phase(state, phase, &mut hints);
    }

    match event {
        StatusEvent::Processing {
            step,
            message,
            doc_counts,
        } => {
            state.is_complete = false;
            state.status = Some(StatusLine {
                step: step.clone().unwrap_or_else(|| "Processing".to_string()),
                message: message
                    .clone()
                    .unwrap_or_else(|| "Processing...".to_string()),
            });
            if let Some(counts) = doc_counts {
                state.doc_counts = counts.clone();
            }
            // The server may restart the briefing pass; stale checkmarks
            // would misreport progress.
            if step.as_deref() == Some("Briefing") {
                state.briefing.reset();
            }
        }
        StatusEvent::QueryGenerating {
            category,
            number,
            text,
        } => {
            state.streaming_queries.insert(
                (*category, *number),
                StreamingQuery {
                    text: text.clone(),
                    number: *number,
                    category: *category,
                },
            );
        }
        StatusEvent::QueryGenerated {
            category,
            number,
            text,
        } => {
            state.streaming_queries.remove(&(*category, *number));
            state.queries.push(Query {
                text: text.clone(),
                number: *number,
                category: *category,
            });
        }
        StatusEvent::EnrichmentStart { category, total } => {
            state.enrichment_counts.insert(
                *category,
                EnrichmentCount {
                    total: *total,
                    enriched: 0,
                },
            );
        }
        StatusEvent::Extracted { category } => {
            if let Some(count) = state.enrichment_counts.get_mut(category) {
                count.enriched = (count.enriched + 1).min(count.total);
            }
        }
        StatusEvent::ExtractionError { category } => {
            if let Some(count) = state.enrichment_counts.get_mut(category) {
                count.total = count.total.saturating_sub(1);
                count.enriched = count.enriched.min(count.total);
            }
        }
        StatusEvent::EnrichmentComplete {
            category,
            total,
            enriched,
        } => {
            // Authoritative final values; reconcile any drift from the
            // incremental updates above.
            state.enrichment_counts.insert(
                *category,
                EnrichmentCount {
                    total: *total,
                    enriched: *enriched,
                },
            );
        }
        StatusEvent::CurationStart { doc_type, initial } => {
            state.doc_counts.insert(
                doc_type.clone(),
                DocCount {
                    initial: *initial,
                    kept: 0,
                },
            );
        }
        StatusEvent::DocumentKept { doc_type } => {
            // Only count for doc types we were told about; this event alone
            // must not fabricate an entry.
            if let Some(count) = state.doc_counts.get_mut(doc_type) {
                count.kept += 1;
            }
        }
        StatusEvent::CurationComplete { doc_counts } => {
            state.doc_counts = doc_counts.clone();
        }
        StatusEvent::BriefingStart { message } => {
            state.status = Some(StatusLine {
                step: "Briefing".to_string(),
                message: message
                    .clone()
                    .unwrap_or_else(|| "Generating briefings...".to_string()),
            });
        }
        StatusEvent::BriefingComplete { section } => {
            state.briefing.mark(*section);
            if state.briefing.all_complete() {
                hints.push(Hint::CollapseBriefing {
                    after: BRIEFING_COLLAPSE_DELAY,
                });
            }
        }
        StatusEvent::ReportChunk { chunk } => {
            state.report.append_chunk(chunk);
            state.status = Some(StatusLine {
                step: "Report".to_string(),
                message: "Generating report...".to_string(),
            });
        }
        StatusEvent::Completed { report } => {
            state.phase = Some(Phase::Complete);
            state.is_complete = true;
            state.in_progress = false;
            state.report.finalize(report);
            state.status = Some(StatusLine {
                step: "Complete".to_string(),
                message: "Research completed successfully".to_string(),
            });
            // The terminal report supersedes every earlier error.
            state.error_message = None;
        }
        StatusEvent::Failed { message } => {
            state.error_message = Some(message.clone());
            state.in_progress = false;
            state.is_complete = false;
        }
        StatusEvent::WebsiteError {
            message,
            continue_research,
        } => {
            state.error_message = Some(message.clone());
            if !*continue_research {
                state.in_progress = false;
                state.is_complete = false;
            }
        }
    }

    hints
}

/// Which phase an event is evidence of, independent of its specific payload.
fn implied_phase(event: &StatusEvent) -> Option<Phase> {
    match event {
        StatusEvent::Processing { step, .. } => step.as_deref().and_then(Phase::from_step),
        StatusEvent::QueryGenerating { .. } | StatusEvent::QueryGenerated { .. } => {
            Some(Phase::Search)
        }
        StatusEvent::EnrichmentStart { .. }
        | StatusEvent::Extracted { .. }
        | StatusEvent::ExtractionError { .. }
        | StatusEvent::EnrichmentComplete { .. } => Some(Phase::Enrichment),
        StatusEvent::CurationStart { .. }
        | StatusEvent::DocumentKept { .. }
        | StatusEvent::CurationComplete { .. } => Some(Phase::Curation),
        StatusEvent::BriefingStart { .. } | StatusEvent::BriefingComplete { .. } => {
            Some(Phase::Briefing)
        }
        StatusEvent::ReportChunk { .. }
        | StatusEvent::Completed { .. }
        | StatusEvent::Failed { .. }
        | StatusEvent::WebsiteError { .. } => None,
    }
}

/// Move the phase forward, never backward, emitting the presentation hints
/// that belong to each first-time transition.
fn advance_phase(state: &mut SessionState, phase: Phase, hints: &mut Vec<Hint>) {
    if state.phase() >= phase {
        return;
    }
    state.phase = Some(phase);
    match phase {
        Phase::Search => hints.push(Hint::ShowQueries),
        Phase::Enrichment => hints.push(Hint::CollapseQueries {
            after: QUERY_COLLAPSE_DELAY,
        }),
        Phase::Briefing => {
            state.briefing.reset();
            hints.push(Hint::CollapseEnrichment {
                after: ENRICHMENT_COLLAPSE_DELAY,
            });
        }
        Phase::Idle | Phase::Curation | Phase::Complete => {}
    }
}
