//! Start/stop handle around a background poll loop

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::events::SessionEvent;
use super::poller::{PollStats, Poller};
use crate::error::{PollError, SessionError};

/// Lifecycle of a marking session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Never started
    Idle,
    /// Poll loop running
    Running,
    /// Poll loop stopped on request
    Cancelled,
    /// Poll loop ended on a store error
    Failed(String),
}

/// Owns the poll thread, its cancellation token and the selected display
pub struct MarkingSession {
    status: Arc<RwLock<SessionStatus>>,
    display: Arc<AtomicUsize>,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<Result<PollStats, PollError>>>,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
}

impl MarkingSession {
    /// Create an idle session that will capture `display_index`
    pub fn new(display_index: usize) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            status: Arc::new(RwLock::new(SessionStatus::Idle)),
            display: Arc::new(AtomicUsize::new(display_index)),
            cancel: None,
            handle: None,
            events_tx,
            events_rx,
        }
    }

    /// Receiver for progress events from the poll thread
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events_rx.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    /// True while the poll thread is alive and has not ended the loop
    pub fn is_running(&self) -> bool {
        self.status() == SessionStatus::Running && !self.is_finished()
    }

    /// True once the poll thread has exited, or when none was started
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Change the display captured from the next iteration on
    pub fn select_display(&self, index: usize) {
        self.display.store(index, Ordering::Relaxed);
        info!("Screen {} selected.", index + 1);
    }

    pub fn selected_display(&self) -> usize {
        self.display.load(Ordering::Relaxed)
    }

    /// Spawn the poll thread
    pub fn start(&mut self, poller: Poller) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }
        // A previous loop has ended; collect its thread
        self.join();
        self.cancel = None;

        let cancel = CancellationToken::new();
        let thread_cancel = cancel.clone();
        let status = self.status.clone();
        let display = self.display.clone();
        let events = self.events_tx.clone();
        let poller = poller.with_events(events.clone());

        *self.status.write() = SessionStatus::Running;

        let spawned = std::thread::Builder::new()
            .name("poll-loop".to_string())
            .spawn(move || {
                info!("Poll thread starting...");
                send_event(
                    &events,
                    SessionEvent::Started {
                        display: display.load(Ordering::Relaxed),
                    },
                );

                let result = poller.run(&thread_cancel, &display);
                match &result {
                    Ok(stats) => {
                        *status.write() = SessionStatus::Cancelled;
                        send_event(&events, SessionEvent::Stopped { stats: *stats });
                    }
                    Err(e) => {
                        error!("Error during processing: {}", e);
                        *status.write() = SessionStatus::Failed(e.to_string());
                        send_event(
                            &events,
                            SessionEvent::Failed {
                                error: e.to_string(),
                            },
                        );
                    }
                }

                info!("Poll thread exiting...");
                result
            });

        match spawned {
            Ok(handle) => {
                self.cancel = Some(cancel);
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.status.write() = SessionStatus::Idle;
                Err(SessionError::Spawn(e.to_string()))
            }
        }
    }

    /// Cancel the loop and wait for the poll thread to finish
    pub fn stop(&mut self) -> Result<SessionStatus, SessionError> {
        let cancel = self.cancel.take().ok_or(SessionError::NotRunning)?;
        info!("Stop requested");
        cancel.cancel();
        self.join();
        Ok(self.status())
    }

    /// Wait for the poll thread to end on its own
    pub fn wait(&mut self) -> SessionStatus {
        self.join();
        self.cancel = None;
        self.status()
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Poll thread panicked");
                *self.status.write() = SessionStatus::Failed("poll thread panicked".to_string());
            }
        }
    }
}

fn send_event(events: &Sender<SessionEvent>, event: SessionEvent) {
    if events.send(event).is_err() {
        debug!("Session event receiver dropped");
    }
}

impl Drop for MarkingSession {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SheetError;
    use crate::marking::poller::tests::{FakeCapturer, FakeStore, FixedRecognizer};
    use crate::marking::poller::SheetTarget;
    use std::time::Duration;

    const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

    fn poller(store: FakeStore) -> Poller {
        Poller::new(
            Box::new(FakeCapturer::default()),
            Box::new(FixedRecognizer("Student ID001 present")),
            Box::new(store),
            SheetTarget {
                spreadsheet_id: "sheet".into(),
                range: "Sheet1!A1:A".into(),
                sheet_tab_id: 0,
                highlight_color: "#00FF00".into(),
            },
            Duration::from_millis(10),
        )
    }

    fn next_event(events: &Receiver<SessionEvent>) -> SessionEvent {
        events.recv_timeout(EVENT_TIMEOUT).expect("no session event")
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = MarkingSession::new(1);
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.is_finished());
        assert_eq!(session.selected_display(), 1);
    }

    #[test]
    fn test_start_match_and_stop() {
        let store = FakeStore::with_ids(&["ID001"]);
        let mut session = MarkingSession::new(0);
        let events = session.events();

        session.start(poller(store.clone())).unwrap();
        assert!(session.is_running());

        assert_eq!(next_event(&events), SessionEvent::Started { display: 0 });
        assert!(matches!(next_event(&events), SessionEvent::Matched { .. }));

        assert_eq!(session.stop().unwrap(), SessionStatus::Cancelled);

        let last = events.try_iter().last().unwrap();
        assert!(matches!(last, SessionEvent::Stopped { stats } if stats.matches >= 1));

        // No store traffic once stopped
        let calls = store.calls.lock().len();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(store.calls.lock().len(), calls);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut session = MarkingSession::new(0);
        session.start(poller(FakeStore::with_ids(&["ID001"]))).unwrap();

        assert_eq!(
            session.start(poller(FakeStore::with_ids(&["ID001"]))).unwrap_err(),
            SessionError::AlreadyRunning
        );
        session.stop().unwrap();
    }

    #[test]
    fn test_stop_without_start() {
        let mut session = MarkingSession::new(0);
        assert_eq!(session.stop().unwrap_err(), SessionError::NotRunning);
    }

    #[test]
    fn test_stop_is_not_repeatable() {
        let mut session = MarkingSession::new(0);
        session.start(poller(FakeStore::with_ids(&["ID001"]))).unwrap();

        session.stop().unwrap();
        assert_eq!(session.stop().unwrap_err(), SessionError::NotRunning);
    }

    #[test]
    fn test_store_failure_is_reported_as_failed() {
        let mut store = FakeStore::with_ids(&["ID001"]);
        store.read_error = Some(SheetError::Permanent {
            status: 401,
            message: "unauthenticated".into(),
        });
        let mut session = MarkingSession::new(0);
        let events = session.events();

        session.start(poller(store)).unwrap();
        let status = session.wait();

        assert!(matches!(status, SessionStatus::Failed(ref msg) if msg.contains("unauthenticated")));
        assert!(events.try_iter().any(|e| matches!(e, SessionEvent::Failed { .. })));
    }

    #[test]
    fn test_restart_after_stop() {
        let mut session = MarkingSession::new(0);
        session.start(poller(FakeStore::with_ids(&["ID001"]))).unwrap();
        session.stop().unwrap();

        session.start(poller(FakeStore::with_ids(&["ID001"]))).unwrap();
        assert!(session.is_running());
        assert_eq!(session.stop().unwrap(), SessionStatus::Cancelled);
    }

    #[test]
    fn test_stop_after_loop_failed_reports_failure() {
        let mut store = FakeStore::with_ids(&["ID001"]);
        store.color_error = Some(SheetError::Permanent {
            status: 400,
            message: "bad request".into(),
        });
        let mut session = MarkingSession::new(0);
        let events = session.events();

        session.start(poller(store)).unwrap();
        assert!(events
            .iter()
            .take(10)
            .any(|e| matches!(e, SessionEvent::Failed { .. })));

        assert!(matches!(session.stop().unwrap(), SessionStatus::Failed(_)));
        assert_eq!(session.stop().unwrap_err(), SessionError::NotRunning);
    }

    #[test]
    fn test_send_event_survives_dropped_receiver() {
        let (tx, rx) = unbounded();
        send_event(&tx, SessionEvent::Started { display: 1 });
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Started { display: 1 });

        drop(rx);
        send_event(&tx, SessionEvent::Started { display: 2 });
    }

    #[test]
    fn test_selected_display_reaches_poll_thread() {
        let mut session = MarkingSession::new(0);
        session.select_display(2);
        let events = session.events();

        session.start(poller(FakeStore::with_ids(&[]))).unwrap();
        assert_eq!(next_event(&events), SessionEvent::Started { display: 2 });
        session.stop().unwrap();
    }
}
