mod api;
mod session;
mod stream;
mod types;
mod ui;

use std::time::{Duration, Instant};

use crossterm::{
    cursor,
    event::{self, Event as CEvent, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    style::Print,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use tokio::sync::mpsc;

use api::JobClient;
use session::controller;
use session::reducer::Hint;
use session::state::SessionState;
use stream::connection::StreamHandle;
use stream::event::StatusEvent;
use ui::format;
use ui::screen::{Screen, extract_host_from_url};

// ── App ───────────────────────────────────────────────────────────────────────

pub(crate) struct App {
    pub api: JobClient,
    /// State for the current run; replaced wholesale when a new job starts.
    pub state: SessionState,
    pub view: ViewState,
    pub company: String,
    pub job_id: Option<String>,
    pub started_at: Option<Instant>,
    /// Set once `finish_run` has wrapped up the current run.
    pub finished: bool,
    pub stream: Option<StreamHandle>,
    pub session_tx: Option<mpsc::Sender<SessionMsg>>,
    pub session_rx: Option<mpsc::Receiver<SessionMsg>>,
}

impl App {
    fn new(api: JobClient) -> Self {
        Self {
            api,
            state: SessionState::new(),
            view: ViewState::default(),
            company: String::new(),
            job_id: None,
            started_at: None,
            finished: false,
            stream: None,
            session_tx: None,
            session_rx: None,
        }
    }
}

/// Which progress sections are currently expanded. Pure presentation state,
/// driven by reducer hints; resetting it never affects the session state.
pub(crate) struct ViewState {
    pub show_queries: bool,
    pub queries_expanded: bool,
    pub enrichment_expanded: bool,
    pub briefing_expanded: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            show_queries: false,
            queries_expanded: true,
            enrichment_expanded: true,
            briefing_expanded: true,
        }
    }
}

/// Everything the main loop can receive from a run's background tasks: the
/// stream worker, the polling fallback and delayed presentation hints. The
/// receiving end is the single writer of `App.state`.
pub(crate) enum SessionMsg {
    JobAccepted { job_id: String },
    SubmitFailed(String),
    Event(StatusEvent),
    Opened,
    Reconnecting { attempt: u32 },
    Degraded,
    LostAfterComplete,
    TransportError(String),
    Hint(Hint),
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let api = JobClient::from_env()?;
    let api_host = extract_host_from_url(api.base_url());
    let mut app = App::new(api);

    enable_raw_mode()?;
    let mut screen = Screen::new(&api_host)?;

    let run_result = run_loop(&mut app, &mut screen).await;

    controller::shutdown_stream(&mut app);
    let _ = disable_raw_mode();
    let _ = execute!(std::io::stdout(), cursor::Show, Print("\r\n"));
    run_result
}

async fn run_loop(app: &mut App, screen: &mut Screen) -> anyhow::Result<()> {
    if let Ok(company) = std::env::var("SCOUTBOT_COMPANY") {
        let company = company.trim().to_string();
        if !company.is_empty() {
            controller::start_research(app, screen, company);
        }
    }

    loop {
        // Drain everything the run's background tasks queued since the last
        // iteration; state mutation happens only here.
        loop {
            let msg = match app.session_rx.as_mut() {
                Some(rx) => rx.try_recv().ok(),
                None => None,
            };
            let Some(msg) = msg else { break };
            controller::handle_msg(app, screen, msg);
        }

        if event::poll(Duration::from_millis(50))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && handle_key(app, screen, key.code, key.modifiers)
                {
                    break;
                }
            }
        }

        if app.state.in_progress {
            screen.spinner_tick = screen.spinner_tick.wrapping_add(1);
            screen.status = format::status_line(
                &app.state,
                app.started_at.map(|t| t.elapsed().as_secs()),
            );
            screen.refresh();
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    Ok(())
}

// ── Key handling ──────────────────────────────────────────────────────────────

fn handle_key(app: &mut App, screen: &mut Screen, key: KeyCode, modifiers: KeyModifiers) -> bool {
    if key == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }
    if app.state.in_progress {
        return false;
    }

    match key {
        KeyCode::Enter => {
            let company = screen.input.trim().to_string();
            if !company.is_empty() {
                screen.input.clear();
                controller::start_research(app, screen, company);
            }
        }
        KeyCode::Esc if modifiers.is_empty() => return true,
        KeyCode::Backspace => {
            screen.input.pop();
            screen.refresh();
        }
        KeyCode::Char(c) if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT => {
            screen.input.push(c);
            screen.refresh();
        }
        _ => {}
    }

    false
}
