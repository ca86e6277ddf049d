use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use crossterm::style::Stylize;
use log::info;
use tokio::sync::mpsc;

use crate::api::ResearchRequest;
use crate::session::reducer::{self, Hint};
use crate::session::report::save_report;
use crate::session::state::SessionState;
use crate::stream::connection::{MAX_RECONNECT_ATTEMPTS, StreamHandle, run_stream};
use crate::stream::event::StatusEvent;
use crate::types::Phase;
use crate::ui::format;
use crate::ui::screen::Screen;
use crate::ui::symbols::Symbols;
use crate::{App, SessionMsg, ViewState};

const DEGRADED_MSG: &str = "Connection lost. Checking for final report...";
const LOST_MSG: &str = "Research connection lost. Please try again.";

/// Start a fresh research run. Any previous run's stream, reconnect timers
/// and polling are torn down first, then the whole session state is
/// replaced; nothing carries over between jobs.
pub(crate) fn start_research(app: &mut App, screen: &mut Screen, company: String) {
    shutdown_stream(app);

    app.state = SessionState::new();
    app.view = ViewState::default();
    app.state.in_progress = true;
    app.company = company.clone();
    app.job_id = None;
    app.finished = false;
    app.started_at = Some(Instant::now());

    // A fresh channel per run: anything still queued by a previous run's
    // stream, poller or hint timer lands in a dropped receiver.
    let (tx, rx) = mpsc::channel::<SessionMsg>(64);
    app.session_tx = Some(tx.clone());
    app.session_rx = Some(rx);

    screen.panel.clear();
    screen.is_running = true;
    let sym = Symbols::current();
    screen.emit(&[
        String::new(),
        format!("{} {}", sym.prompt, company.clone().bold()),
    ]);

    let api = app.api.clone();
    let request = ResearchRequest::new(company).with_env_details();
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let worker = tokio::spawn(async move {
        match api.submit_research(&request).await {
            Ok(job_id) => {
                info!("research job accepted: {job_id}");
                if tx
                    .send(SessionMsg::JobAccepted {
                        job_id: job_id.clone(),
                    })
                    .await
                    .is_err()
                {
                    return;
                }
                run_stream(api, job_id, tx, flag).await;
            }
            Err(e) => {
                // A failed submission must not start any stream or polling.
                let _ = tx.send(SessionMsg::SubmitFailed(format!("{e:#}"))).await;
            }
        }
    });
    app.stream = Some(StreamHandle::new(shutdown, worker));
}

/// Tear down the active stream worker. Idempotent; called on reset, on a
/// finished run, and on process exit.
pub(crate) fn shutdown_stream(app: &mut App) {
    if let Some(handle) = app.stream.take() {
        handle.shutdown();
    }
}

/// Process one message from the run's stream worker or a hint timer. All
/// session-state mutation funnels through here, on the main loop.
pub(crate) fn handle_msg(app: &mut App, screen: &mut Screen, msg: SessionMsg) {
    let sym = Symbols::current();
    match msg {
        SessionMsg::JobAccepted { job_id } => {
            screen.emit(&[format!("  job {job_id} accepted").grey().to_string()]);
            app.job_id = Some(job_id);
        }
        SessionMsg::SubmitFailed(error) => {
            app.state.error_message = Some(error.clone());
            app.state.in_progress = false;
            screen.is_running = false;
            screen.emit(&[format!("  {} {error}", sym.warning).red().to_string()]);
        }
        SessionMsg::Event(event) => apply_event(app, screen, event),
        SessionMsg::Opened => {
            app.state.note_stream_opened();
        }
        SessionMsg::Reconnecting { attempt } => {
            app.state.note_reconnect_attempt(attempt);
            screen.emit(&[format!(
                "  {} stream closed, reconnecting ({attempt}/{MAX_RECONNECT_ATTEMPTS})",
                sym.warning
            )
            .dark_yellow()
            .to_string()]);
        }
        SessionMsg::Degraded => {
            info!(
                "stream degraded for job {}; relying on polling",
                app.job_id.as_deref().unwrap_or("?")
            );
            app.state.error_message = Some(DEGRADED_MSG.to_string());
            screen.emit(&[format!("  {} {DEGRADED_MSG}", sym.warning)
                .dark_yellow()
                .to_string()]);
        }
        SessionMsg::LostAfterComplete => {
            app.state.error_message = Some(LOST_MSG.to_string());
            app.state.in_progress = false;
            screen.is_running = false;
            screen.emit(&[format!("  {} {LOST_MSG}", sym.warning).red().to_string()]);
        }
        SessionMsg::TransportError(detail) => {
            app.state.error_message = Some("WebSocket connection error".to_string());
            app.state.in_progress = false;
            screen.is_running = false;
            screen.emit(&[format!("  {} WebSocket connection error: {detail}", sym.warning)
                .red()
                .to_string()]);
        }
        SessionMsg::Hint(hint) => apply_hint(app, hint),
    }

    screen.status = format::status_line(
        &app.state,
        app.started_at.map(|t| t.elapsed().as_secs()),
    );
    screen.panel = format::panel_lines(&app.state, &app.view);
    screen.refresh();
}

fn apply_event(app: &mut App, screen: &mut Screen, event: StatusEvent) {
    let prev_phase = app.state.phase();
    let hints = reducer::apply(&mut app.state, &event);

    let phase = app.state.phase();
    if phase != prev_phase && phase != Phase::Complete {
        let sym = Symbols::current();
        screen.emit(&[format!("  {} {}", sym.record, phase.label())
            .cyan()
            .bold()
            .to_string()]);
    }
    if let Some(line) = format::format_event_line(&event) {
        screen.emit(&[line]);
    }
    for hint in hints {
        apply_hint(app, hint);
    }

    if app.state.is_complete && !app.finished {
        finish_run(app, screen);
    }
    if !app.state.in_progress {
        screen.is_running = false;
    }
}

/// Presentation hints from the reducer. Delayed ones are re-queued through
/// the run's own channel so a stale timer can never touch a newer run.
fn apply_hint(app: &mut App, hint: Hint) {
    match hint {
        Hint::ShowQueries => {
            app.view.show_queries = true;
            app.view.queries_expanded = true;
        }
        Hint::CollapseQueries { after } if !after.is_zero() => {
            schedule_hint(app, Hint::CollapseQueries { after: Duration::ZERO }, after);
        }
        Hint::CollapseQueries { .. } => app.view.queries_expanded = false,
        Hint::CollapseEnrichment { after } if !after.is_zero() => {
            schedule_hint(
                app,
                Hint::CollapseEnrichment { after: Duration::ZERO },
                after,
            );
        }
        Hint::CollapseEnrichment { .. } => app.view.enrichment_expanded = false,
        Hint::CollapseBriefing { after } if !after.is_zero() => {
            schedule_hint(app, Hint::CollapseBriefing { after: Duration::ZERO }, after);
        }
        Hint::CollapseBriefing { .. } => app.view.briefing_expanded = false,
    }
}

fn schedule_hint(app: &App, hint: Hint, after: Duration) {
    let Some(tx) = app.session_tx.clone() else {
        return;
    };
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = tx.send(SessionMsg::Hint(hint)).await;
    });
}

/// Wrap up a completed run: stop the stream worker and any polling, save
/// the report, and print it.
fn finish_run(app: &mut App, screen: &mut Screen) {
    app.finished = true;
    shutdown_stream(app);
    screen.is_running = false;

    let sym = Symbols::current();
    let elapsed = app
        .started_at
        .map(|t| t.elapsed().as_secs())
        .unwrap_or_default();
    let mut lines = vec![String::new()];

    let report = app.state.report.text().to_string();
    if !report.is_empty() {
        lines.extend(format::format_report_lines(&report));
        lines.push(String::new());
        match save_report(&app.company, &report) {
            Ok(path) => {
                lines.push(
                    format!("  report saved to {}", path.display())
                        .grey()
                        .to_string(),
                );
            }
            Err(e) => {
                lines.push(format!("  {} failed to save report: {e:#}", sym.warning)
                    .dark_yellow()
                    .to_string());
            }
        }
    }

    lines.push(
        format!(
            "  ✓ Research completed in {:02}:{:02}",
            elapsed / 60,
            elapsed % 60
        )
        .green()
        .bold()
        .to_string(),
    );
    screen.emit(&lines);
}
