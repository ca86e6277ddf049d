use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

use crate::session::state::DocCounts;
use crate::types::{BriefingSection, Category};

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: WireData,
}

#[derive(Deserialize, Default)]
struct WireData {
    status: Option<String>,
    message: Option<String>,
    error: Option<String>,
    #[serde(default)]
    result: WireResult,
}

#[derive(Deserialize, Default)]
struct WireResult {
    step: Option<String>,
    category: Option<String>,
    query: Option<String>,
    query_number: Option<u32>,
    chunk: Option<String>,
    report: Option<String>,
    count: Option<u32>,
    total: Option<u32>,
    enriched: Option<u32>,
    doc_type: Option<String>,
    initial_count: Option<u32>,
    doc_counts: Option<DocCounts>,
    continue_research: Option<bool>,
}

// ── Typed events ──────────────────────────────────────────────────────────────

/// One recognized in-band status event, decoded once at the boundary so the
/// reducer is a closed pattern match. Statuses that carry different meaning
/// depending on the `step` field (enrichment vs curation `category_start`)
/// decode to distinct variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Processing {
        step: Option<String>,
        message: Option<String>,
        doc_counts: Option<DocCounts>,
    },
    QueryGenerating {
        category: Category,
        number: u32,
        text: String,
    },
    QueryGenerated {
        category: Category,
        number: u32,
        text: String,
    },
    EnrichmentStart {
        category: Category,
        total: u32,
    },
    Extracted {
        category: Category,
    },
    ExtractionError {
        category: Category,
    },
    EnrichmentComplete {
        category: Category,
        total: u32,
        enriched: u32,
    },
    CurationStart {
        doc_type: String,
        initial: u32,
    },
    DocumentKept {
        doc_type: String,
    },
    CurationComplete {
        doc_counts: DocCounts,
    },
    BriefingStart {
        message: Option<String>,
    },
    BriefingComplete {
        section: BriefingSection,
    },
    ReportChunk {
        chunk: String,
    },
    Completed {
        report: String,
    },
    Failed {
        message: String,
    },
    WebsiteError {
        message: String,
        continue_research: bool,
    },
}

/// Decode one raw frame.
///
/// `Err` means the payload was not valid JSON for the envelope at all.
/// `Ok(None)` covers everything that is syntactically fine but not for us:
/// non-`status_update` messages, unknown statuses, and recognized statuses
/// missing a field they cannot work without. None of these may ever take the
/// run down.
pub fn decode_frame(raw: &str) -> Result<Option<StatusEvent>> {
    let msg: WireMessage = serde_json::from_str(raw).context("malformed stream frame")?;
    if msg.kind != "status_update" {
        return Ok(None);
    }
    let WireData {
        status,
        message,
        error,
        result: r,
    } = msg.data;
    let Some(status) = status.as_deref() else {
        debug!("dropping status_update without a status field");
        return Ok(None);
    };
    let step = r.step.as_deref();

    let event = match status {
        "processing" => Some(StatusEvent::Processing {
            step: r.step.clone(),
            message: message.clone(),
            doc_counts: if step == Some("Curation") {
                r.doc_counts
            } else {
                None
            },
        }),
        "query_generating" => decode_query(&r).map(|(category, number, text)| {
            StatusEvent::QueryGenerating {
                category,
                number,
                text,
            }
        }),
        "query_generated" => decode_query(&r).map(|(category, number, text)| {
            StatusEvent::QueryGenerated {
                category,
                number,
                text,
            }
        }),
        "category_start" => match step {
            Some("Curation") => r.doc_type.clone().map(|doc_type| StatusEvent::CurationStart {
                doc_type,
                initial: r.initial_count.unwrap_or(0),
            }),
            Some("Enriching") => decode_category(&r).map(|category| StatusEvent::EnrichmentStart {
                category,
                total: r.count.unwrap_or(0),
            }),
            _ => None,
        },
        "extracted" if step == Some("Enriching") => {
            decode_category(&r).map(|category| StatusEvent::Extracted { category })
        }
        "extraction_error" if step == Some("Enriching") => {
            decode_category(&r).map(|category| StatusEvent::ExtractionError { category })
        }
        "category_complete" if step == Some("Enriching") => {
            decode_category(&r).map(|category| StatusEvent::EnrichmentComplete {
                category,
                total: r.total.unwrap_or(0),
                enriched: r.enriched.unwrap_or(0),
            })
        }
        "document_kept" if step == Some("Curation") => r
            .doc_type
            .clone()
            .map(|doc_type| StatusEvent::DocumentKept { doc_type }),
        "curation_complete" if step == Some("Curation") => r
            .doc_counts
            .map(|doc_counts| StatusEvent::CurationComplete { doc_counts }),
        "briefing_start" => Some(StatusEvent::BriefingStart {
            message: message.clone(),
        }),
        "briefing_complete" => r
            .category
            .as_deref()
            .and_then(BriefingSection::parse)
            .map(|section| StatusEvent::BriefingComplete { section }),
        "report_chunk" => r.chunk.clone().map(|chunk| StatusEvent::ReportChunk { chunk }),
        "completed" => Some(StatusEvent::Completed {
            report: r.report.clone().unwrap_or_default(),
        }),
        "failed" | "error" => Some(StatusEvent::Failed {
            message: error_text(&error, &message),
        }),
        "website_error" => Some(StatusEvent::WebsiteError {
            message: error_text(&error, &message),
            continue_research: r.continue_research.unwrap_or(false),
        }),
        other => {
            // Forward compatibility: unknown statuses are dropped, never fatal.
            debug!("dropping unrecognized status {other:?}");
            return Ok(None);
        }
    };

    if event.is_none() {
        debug!("dropping {status:?} event with missing or unusable fields");
    }
    Ok(event)
}

fn decode_query(r: &WireResult) -> Option<(Category, u32, String)> {
    let category = r.category.as_deref().and_then(Category::parse)?;
    let number = r.query_number?;
    let text = r.query.clone()?;
    Some((category, number, text))
}

fn decode_category(r: &WireResult) -> Option<Category> {
    r.category.as_deref().and_then(Category::parse)
}

fn error_text(error: &Option<String>, message: &Option<String>) -> String {
    error
        .clone()
        .or_else(|| message.clone())
        .unwrap_or_else(|| "Research failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::{StatusEvent, decode_frame};
    use crate::types::{BriefingSection, Category};

    fn frame(data: &str) -> String {
        format!(r#"{{"type":"status_update","data":{data}}}"#)
    }

    #[test]
    fn non_status_update_messages_are_ignored() {
        let raw = r#"{"type":"ping","data":{"status":"processing"}}"#;
        assert_eq!(decode_frame(raw).unwrap(), None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(decode_frame("{not json").is_err());
    }

    #[test]
    fn unknown_status_is_dropped_not_fatal() {
        let raw = frame(r#"{"status":"telemetry_blob","message":"x"}"#);
        assert_eq!(decode_frame(&raw).unwrap(), None);
    }

    #[test]
    fn decodes_query_generating() {
        let raw = frame(
            r#"{"status":"query_generating","result":{"category":"company","query_number":1,"query":"Acme revenue"}}"#,
        );
        assert_eq!(
            decode_frame(&raw).unwrap(),
            Some(StatusEvent::QueryGenerating {
                category: Category::Company,
                number: 1,
                text: "Acme revenue".into(),
            })
        );
    }

    #[test]
    fn query_with_unknown_category_is_dropped() {
        let raw = frame(
            r#"{"status":"query_generated","result":{"category":"valuation","query_number":1,"query":"q"}}"#,
        );
        assert_eq!(decode_frame(&raw).unwrap(), None);
    }

    #[test]
    fn category_start_disambiguates_on_step() {
        let enrich = frame(
            r#"{"status":"category_start","result":{"step":"Enriching","category":"news","count":7}}"#,
        );
        assert_eq!(
            decode_frame(&enrich).unwrap(),
            Some(StatusEvent::EnrichmentStart {
                category: Category::News,
                total: 7,
            })
        );

        let curate = frame(
            r#"{"status":"category_start","result":{"step":"Curation","doc_type":"news_docs","initial_count":12}}"#,
        );
        assert_eq!(
            decode_frame(&curate).unwrap(),
            Some(StatusEvent::CurationStart {
                doc_type: "news_docs".into(),
                initial: 12,
            })
        );
    }

    #[test]
    fn enrichment_start_without_count_defaults_to_zero() {
        let raw = frame(
            r#"{"status":"category_start","result":{"step":"Enriching","category":"company"}}"#,
        );
        assert_eq!(
            decode_frame(&raw).unwrap(),
            Some(StatusEvent::EnrichmentStart {
                category: Category::Company,
                total: 0,
            })
        );
    }

    #[test]
    fn extracted_outside_enrichment_is_dropped() {
        let raw = frame(r#"{"status":"extracted","result":{"category":"company"}}"#);
        assert_eq!(decode_frame(&raw).unwrap(), None);
    }

    #[test]
    fn curation_processing_carries_doc_counts() {
        let raw = frame(
            r#"{"status":"processing","message":"Curating","result":{"step":"Curation","doc_counts":{"news_docs":{"initial":9,"kept":2}}}}"#,
        );
        let Some(StatusEvent::Processing {
            step,
            doc_counts: Some(counts),
            ..
        }) = decode_frame(&raw).unwrap()
        else {
            panic!("expected processing event with doc counts");
        };
        assert_eq!(step.as_deref(), Some("Curation"));
        assert_eq!(counts["news_docs"].initial, 9);
        assert_eq!(counts["news_docs"].kept, 2);
    }

    #[test]
    fn non_curation_processing_strips_doc_counts() {
        let raw = frame(
            r#"{"status":"processing","result":{"step":"Searching","doc_counts":{"x":{"initial":1,"kept":0}}}}"#,
        );
        let Some(StatusEvent::Processing { doc_counts, .. }) = decode_frame(&raw).unwrap() else {
            panic!("expected processing event");
        };
        assert_eq!(doc_counts, None);
    }

    #[test]
    fn briefing_complete_maps_category_to_section() {
        let raw = frame(r#"{"status":"briefing_complete","result":{"step":"Briefing","category":"financial"}}"#);
        assert_eq!(
            decode_frame(&raw).unwrap(),
            Some(StatusEvent::BriefingComplete {
                section: BriefingSection::Financial,
            })
        );
    }

    #[test]
    fn completed_without_report_defaults_to_empty() {
        let raw = frame(r#"{"status":"completed"}"#);
        assert_eq!(
            decode_frame(&raw).unwrap(),
            Some(StatusEvent::Completed { report: String::new() })
        );
    }

    #[test]
    fn error_text_prefers_error_over_message() {
        let raw = frame(r#"{"status":"failed","error":"boom","message":"other"}"#);
        assert_eq!(
            decode_frame(&raw).unwrap(),
            Some(StatusEvent::Failed { message: "boom".into() })
        );
    }

    #[test]
    fn website_error_carries_continue_flag() {
        let raw = frame(
            r#"{"status":"website_error","error":"scrape blocked","result":{"continue_research":true}}"#,
        );
        assert_eq!(
            decode_frame(&raw).unwrap(),
            Some(StatusEvent::WebsiteError {
                message: "scrape blocked".into(),
                continue_research: true,
            })
        );
    }
}
