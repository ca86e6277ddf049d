use crossterm::style::Stylize;

use crate::ViewState;
use crate::session::state::SessionState;
use crate::stream::event::StatusEvent;
use crate::types::{BriefingSection, Category, Phase};
use crate::ui::symbols::Symbols;

const BAR_WIDTH: usize = 12;
const MAX_STREAMING_SHOWN: usize = 3;

/// Build the live progress panel for the managed area. Which sections are
/// expanded is presentation state (`view`), not session state.
pub(crate) fn panel_lines(state: &SessionState, view: &ViewState) -> Vec<String> {
    let sym = Symbols::current();
    let mut lines = Vec::new();

    if view.show_queries
        && (!state.queries.is_empty() || !state.streaming_queries.is_empty())
    {
        let done = state.queries.len();
        let streaming = state.streaming_queries.len();
        if view.queries_expanded {
            lines.push(
                format!("  {} Research queries ({done} done)", sym.arrow_down)
                    .grey()
                    .to_string(),
            );
            let per_cat: Vec<String> = Category::ALL
                .iter()
                .map(|c| format!("{} {}", c.as_str(), state.query_count(*c)))
                .collect();
            lines.push(
                format!("    {}", per_cat.join(&format!(" {} ", sym.dot)))
                    .grey()
                    .to_string(),
            );
            for sq in state.streaming_queries.values().take(MAX_STREAMING_SHOWN) {
                lines.push(format!(
                    "    {} {} #{} {}",
                    sym.arrow_right.cyan(),
                    sq.category.as_str(),
                    sq.number,
                    shorten_text(&sq.text, 60).grey()
                ));
            }
        } else {
            lines.push(
                format!(
                    "  {} Research queries ({done} done{})",
                    sym.arrow_right,
                    if streaming > 0 {
                        format!(", {streaming} streaming")
                    } else {
                        String::new()
                    }
                )
                .grey()
                .to_string(),
            );
        }
    }

    if !state.enrichment_counts.is_empty() {
        if view.enrichment_expanded {
            lines.push(format!("  {} Enrichment", sym.arrow_down).grey().to_string());
            for (category, count) in &state.enrichment_counts {
                let bar = progress_bar(count.enriched, count.total, BAR_WIDTH);
                let tail = format!("{}/{}", count.enriched, count.total);
                let line = format!("    {:<12} {bar} {tail}", category.as_str());
                lines.push(if count.total > 0 && count.enriched == count.total {
                    line.green().to_string()
                } else {
                    line
                });
            }
        } else {
            let (done, total) = state
                .enrichment_counts
                .values()
                .fold((0u32, 0u32), |acc, c| (acc.0 + c.enriched, acc.1 + c.total));
            lines.push(
                format!("  {} Enrichment ({done}/{total} extracted)", sym.arrow_right)
                    .grey()
                    .to_string(),
            );
        }
    }

    if !state.doc_counts.is_empty() {
        lines.push(format!("  {} Curation", sym.arrow_down).grey().to_string());
        for (doc_type, count) in &state.doc_counts {
            lines.push(
                format!("    {:<18} kept {}/{}", doc_type, count.kept, count.initial)
                    .grey()
                    .to_string(),
            );
        }
    }

    if state.phase() >= Phase::Briefing && state.phase() != Phase::Complete
        || state.briefing.all_complete()
    {
        if view.briefing_expanded {
            let marks: Vec<String> = BriefingSection::ALL
                .iter()
                .map(|s| {
                    let mark = if state.briefing.is_done(*s) {
                        sym.check
                    } else {
                        sym.pending
                    };
                    format!("{mark} {}", s.as_str())
                })
                .collect();
            lines.push(format!("  {} Briefings", sym.arrow_down).grey().to_string());
            lines.push(format!("    {}", marks.join("  ")));
        } else {
            let done = BriefingSection::ALL
                .iter()
                .filter(|s| state.briefing.is_done(**s))
                .count();
            lines.push(
                format!("  {} Briefings ({done}/4)", sym.arrow_right)
                    .grey()
                    .to_string(),
            );
        }
    }

    if let Some(error) = &state.error_message {
        let line = format!("  {} {}", sym.warning, shorten_text(error, 100));
        lines.push(if state.in_progress {
            line.dark_yellow().to_string()
        } else {
            line.red().to_string()
        });
    }

    lines
}

/// Status line under the panel: current step, message and elapsed time.
pub(crate) fn status_line(state: &SessionState, elapsed_secs: Option<u64>) -> String {
    let sym = Symbols::current();
    let Some(status) = &state.status else {
        return String::new();
    };
    let mut out = format!("{} {} {}", status.step.clone().bold(), sym.dot, status.message);
    if let Some(secs) = elapsed_secs {
        out.push_str(&format!(" {} {:02}:{:02}", sym.dot, secs / 60, secs % 60).grey().to_string());
    }
    out
}

/// Scrollback line for a discrete happening, if the event merits one.
pub(crate) fn format_event_line(event: &StatusEvent) -> Option<String> {
    let sym = Symbols::current();
    match event {
        StatusEvent::QueryGenerated {
            category,
            number,
            text,
        } => Some(format!(
            "  {} {} query #{number} {} {}",
            sym.record.cyan(),
            category.as_str(),
            sym.dot,
            shorten_text(text, 80).grey()
        )),
        StatusEvent::EnrichmentComplete {
            category,
            total,
            enriched,
        } => {
            let line = format!(
                "  {} {} enriched {enriched}/{total}",
                sym.corner,
                category.as_str()
            );
            Some(if enriched >= total && *total > 0 {
                line.green().to_string()
            } else {
                line.dark_yellow().to_string()
            })
        }
        StatusEvent::CurationComplete { doc_counts } => {
            let kept: u32 = doc_counts.values().map(|c| c.kept).sum();
            let initial: u32 = doc_counts.values().map(|c| c.initial).sum();
            Some(
                format!("  {} curation kept {kept}/{initial} documents", sym.corner)
                    .green()
                    .to_string(),
            )
        }
        StatusEvent::BriefingComplete { section } => Some(
            format!("  {} {} briefing ready", sym.check, section.as_str())
                .green()
                .to_string(),
        ),
        StatusEvent::WebsiteError {
            message,
            continue_research: true,
        } => Some(
            format!("  {} {} (continuing)", sym.warning, shorten_text(message, 90))
                .dark_yellow()
                .to_string(),
        ),
        StatusEvent::WebsiteError { message, .. } | StatusEvent::Failed { message } => Some(
            format!("  {} {}", sym.warning, shorten_text(message, 90))
                .red()
                .to_string(),
        ),
        _ => None,
    }
}

/// Render the final markdown report for the scrollback.
pub(crate) fn format_report_lines(report: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut in_code_fence = false;

    for line in report.lines() {
        let trimmed = line.trim_start();

        if trimmed.starts_with("```") {
            in_code_fence = !in_code_fence;
            if !in_code_fence {
                out.push(String::new());
            }
            continue;
        }
        if in_code_fence {
            out.push(format!("    {line}").grey().to_string());
            continue;
        }
        if is_markdown_rule(trimmed) {
            out.push("    ─────────────────────────────".grey().to_string());
            continue;
        }
        if let Some(heading) = trimmed.strip_prefix("### ") {
            out.push(format!("    {heading}").bold().dark_yellow().to_string());
            continue;
        }
        if let Some(heading) = trimmed.strip_prefix("## ") {
            out.push(format!("    {heading}").bold().yellow().to_string());
            continue;
        }
        if let Some(heading) = trimmed.strip_prefix("# ") {
            out.push(format!("    {heading}").bold().green().to_string());
            continue;
        }
        if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            out.push(format!("    • {item}"));
            continue;
        }
        out.push(format!("    {line}"));
    }

    out
}

pub(crate) fn progress_bar(done: u32, total: u32, width: usize) -> String {
    if total == 0 {
        return "░".repeat(width);
    }
    let filled = ((done as usize * width) / total as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

pub(crate) fn shorten_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{kept}{}", Symbols::current().ellipsis)
}

fn is_markdown_rule(line: &str) -> bool {
    line.len() >= 3
        && (line.chars().all(|c| c == '-')
            || line.chars().all(|c| c == '*')
            || line.chars().all(|c| c == '_'))
}
