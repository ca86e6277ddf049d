use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::SessionMsg;
use crate::api::JobClient;
use crate::stream::event::{StatusEvent, decode_frame};

pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Handle to a running stream worker. Shutting down is idempotent and safe
/// to call any number of times; repeated resets and process teardown both
/// go through here.
pub(crate) struct StreamHandle {
    shutdown: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

impl StreamHandle {
    pub fn new(shutdown: Arc<AtomicBool>, worker: JoinHandle<()>) -> Self {
        Self { shutdown, worker }
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.worker.abort();
    }
}

/// What to do after an unexpected close, given how many reconnects were
/// already spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    Reconnect { attempt: u32 },
    PollOnly,
}

fn next_recovery(attempts_used: u32) -> Recovery {
    if attempts_used < MAX_RECONNECT_ATTEMPTS {
        Recovery::Reconnect {
            attempt: attempts_used + 1,
        }
    } else {
        Recovery::PollOnly
    }
}

/// Own the event-stream connection for one job run.
///
/// Decodes frames at the boundary and forwards typed events over `tx`; all
/// state mutation happens on the receiving side. On an unexpected close
/// while the job is still live this escalates through bounded reconnects
/// (polling the status endpoint the whole time) and finally poll-only mode,
/// until a terminal result arrives from either source or the run is torn
/// down.
pub(crate) async fn run_stream(
    api: JobClient,
    job_id: String,
    tx: mpsc::Sender<SessionMsg>,
    shutdown: Arc<AtomicBool>,
) {
    let url = api.stream_url(&job_id);
    let mut attempts = 0u32;
    let mut poller: Option<tokio::time::Interval> = None;
    let mut got_terminal = false;
    let mut job_active = true;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }

        match tokio_tungstenite::connect_async(&url).await {
            Ok((mut ws, _)) => {
                attempts = 0;
                if tx.send(SessionMsg::Opened).await.is_err() {
                    return;
                }

                let voluntary = loop {
                    tokio::select! {
                        frame = ws.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                match decode_frame(&text) {
                                    Ok(Some(event)) => {
                                        let terminal = matches!(event, StatusEvent::Completed { .. });
                                        if matches!(
                                            event,
                                            StatusEvent::Failed { .. }
                                                | StatusEvent::WebsiteError { continue_research: false, .. }
                                        ) {
                                            job_active = false;
                                        }
                                        if tx.send(SessionMsg::Event(event)).await.is_err() {
                                            return;
                                        }
                                        if terminal {
                                            got_terminal = true;
                                            break true;
                                        }
                                    }
                                    Ok(None) => {}
                                    Err(e) => debug!("dropping undecodable frame: {e:#}"),
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break false,
                            // Ping/pong are answered by the library; binary frames
                            // carry nothing for us.
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("stream transport error: {e}");
                                let _ = tx.send(SessionMsg::TransportError(e.to_string())).await;
                                return;
                            }
                        },
                        found = poll_once(&mut poller, &api, &job_id) => {
                            if let Some(event) = found {
                                let _ = tx.send(SessionMsg::Event(event)).await;
                                return;
                            }
                        }
                    }
                };

                if voluntary {
                    return;
                }
            }
            Err(e) => warn!("stream connect failed: {e}"),
        }

        // The stream closed without a terminal result having gone through it.
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        if got_terminal {
            // Should be unreachable: we close voluntarily after a terminal
            // event. Reaching it means a teardown race.
            let _ = tx.send(SessionMsg::LostAfterComplete).await;
            return;
        }
        if !job_active {
            // Server reported failure and then hung up; nothing to recover.
            return;
        }

        if poller.is_none() {
            poller = Some(tokio::time::interval_at(
                tokio::time::Instant::now() + POLL_INTERVAL,
                POLL_INTERVAL,
            ));
        }

        match next_recovery(attempts) {
            Recovery::Reconnect { attempt } => {
                attempts = attempt;
                if tx
                    .send(SessionMsg::Reconnecting { attempt })
                    .await
                    .is_err()
                {
                    return;
                }
                // Keep polling while the reconnect delay elapses.
                let delay = tokio::time::sleep(RECONNECT_DELAY);
                tokio::pin!(delay);
                loop {
                    tokio::select! {
                        _ = &mut delay => break,
                        found = poll_once(&mut poller, &api, &job_id) => {
                            if let Some(event) = found {
                                let _ = tx.send(SessionMsg::Event(event)).await;
                                return;
                            }
                        }
                    }
                }
            }
            Recovery::PollOnly => {
                if tx.send(SessionMsg::Degraded).await.is_err() {
                    return;
                }
                loop {
                    if shutdown.load(Ordering::SeqCst) {
                        return;
                    }
                    if let Some(event) = poll_once(&mut poller, &api, &job_id).await {
                        let _ = tx.send(SessionMsg::Event(event)).await;
                        return;
                    }
                }
            }
        }
    }
}

/// Wait for the next poll tick and query the status endpoint once. Pends
/// forever while polling hasn't started, so this can sit in a `select!`
/// alongside the stream.
async fn poll_once(
    poller: &mut Option<tokio::time::Interval>,
    api: &JobClient,
    job_id: &str,
) -> Option<StatusEvent> {
    match poller.as_mut() {
        Some(interval) => {
            interval.tick().await;
            match api.check_final_report(job_id).await {
                Ok(found) => found,
                Err(e) => {
                    debug!("status poll failed: {e:#}");
                    None
                }
            }
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_RECONNECT_ATTEMPTS, Recovery, next_recovery};

    #[test]
    fn reconnects_are_bounded_at_the_maximum() {
        let mut attempts = 0;
        let mut reconnects = 0;
        loop {
            match next_recovery(attempts) {
                Recovery::Reconnect { attempt } => {
                    attempts = attempt;
                    reconnects += 1;
                }
                Recovery::PollOnly => break,
            }
        }
        assert_eq!(reconnects, MAX_RECONNECT_ATTEMPTS);
    }

    #[test]
    fn attempt_numbers_count_up_from_one() {
        assert_eq!(next_recovery(0), Recovery::Reconnect { attempt: 1 });
        assert_eq!(next_recovery(2), Recovery::Reconnect { attempt: 3 });
        assert_eq!(next_recovery(3), Recovery::PollOnly);
        assert_eq!(next_recovery(7), Recovery::PollOnly);
    }
}
