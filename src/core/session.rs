//! Session controller
//!
//! Owns the transcript, the selection state and the pending input, and
//! turns user input into outbound commands.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::event::{Pattern, ResponseEvent};
use super::selection::{CommandCatalog, PatternCatalog, SelectionState};
use super::transcript::{Transcript, TranscriptAccumulator, TranscriptView};
use super::transport::Transport;
use crate::history::CommandHistory;

/// First whitespace-delimited token, or `""` for blank input
pub fn command_token(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or("")
}

/// One console session.
///
/// All methods run on the event-loop thread. None of them block except
/// [`SessionController::wait_for_responses`].
///
/// Calling any operation after [`SessionController::teardown`] is a
/// precondition violation: debug builds panic, release builds log and
/// ignore the call.
pub struct SessionController<T: Transport> {
    transcript: TranscriptAccumulator,
    selection: SelectionState,
    /// Suggestion written into the input box but not yet submitted
    pending_input: Option<String>,
    /// Bumped on every submit so presentation can reset its input box
    input_epoch: u64,
    transport: T,
    /// Subscription to the transport's responses; `None` after teardown
    responses: Option<Receiver<ResponseEvent>>,
    command_catalog: Box<dyn CommandCatalog>,
    pattern_catalog: Box<dyn PatternCatalog>,
    history: Option<CommandHistory>,
    uppercase_echo: bool,
}

impl<T: Transport> SessionController<T> {
    pub fn new(
        transport: T,
        responses: Receiver<ResponseEvent>,
        command_catalog: Box<dyn CommandCatalog>,
        pattern_catalog: Box<dyn PatternCatalog>,
    ) -> Self {
        info!("session started");
        Self {
            transcript: TranscriptAccumulator::new(),
            selection: SelectionState::default(),
            pending_input: None,
            input_epoch: 0,
            transport,
            responses: Some(responses),
            command_catalog,
            pattern_catalog,
            history: None,
            uppercase_echo: true,
        }
    }

    /// Record submitted commands into `history`
    pub fn with_history(mut self, history: CommandHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_uppercase_echo(mut self, uppercase: bool) -> Self {
        self.uppercase_echo = uppercase;
        self
    }

    #[allow(dead_code)]
    pub fn transcript(&self) -> Transcript {
        self.transcript.snapshot()
    }

    /// Live transcript feed; starts from the current transcript
    pub fn subscribe(&self) -> TranscriptView {
        self.transcript.subscribe()
    }

    pub fn active_command(&self) -> Option<&str> {
        self.selection.active_command()
    }

    pub fn active_pattern(&self) -> Option<&Pattern> {
        self.selection.active_pattern()
    }

    pub fn pending_input(&self) -> Option<&str> {
        self.pending_input.as_deref()
    }

    pub fn input_epoch(&self) -> u64 {
        self.input_epoch
    }

    pub fn history(&self) -> Option<&CommandHistory> {
        self.history.as_ref()
    }

    #[allow(dead_code)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[allow(dead_code)]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    #[allow(dead_code)]
    pub fn is_torn_down(&self) -> bool {
        self.responses.is_none()
    }

    pub fn select_active_command(&mut self, command: &str) {
        if !self.ensure_live("select_active_command") {
            return;
        }
        self.selection
            .select_active_command(command, self.command_catalog.as_mut());
    }

    pub fn select_pattern(&mut self, pattern: Pattern) {
        if !self.ensure_live("select_pattern") {
            return;
        }
        self.selection
            .select_pattern(pattern, self.pattern_catalog.as_mut());
    }

    /// Put `command` into the input box without running it
    pub fn write_command(&mut self, command: &str) {
        if !self.ensure_live("write_command") {
            return;
        }
        self.pending_input = Some(command.to_string());
        self.select_active_command(command);
    }

    /// Submit `command_string` for execution.
    ///
    /// The echo lands in the transcript before the transport sees the
    /// command. Returns without waiting for the response.
    pub fn run_command(&mut self, command_string: &str) {
        if !self.ensure_live("run_command") {
            return;
        }

        let echo = if self.uppercase_echo {
            command_string.to_uppercase()
        } else {
            command_string.to_string()
        };
        self.transcript.append(ResponseEvent::command(echo));

        if let Some(history) = self.history.as_mut() {
            history.add(command_string);
        }

        info!("dispatching command ({} bytes)", command_string.len());
        self.transport.send(command_string);

        self.select_active_command(command_token(command_string));

        self.pending_input = None;
        self.input_epoch += 1;
    }

    /// Empty the transcript. Selection is left alone.
    pub fn clear_output(&mut self) {
        if !self.ensure_live("clear_output") {
            return;
        }
        self.transcript.reset();
    }

    /// Fold every response already queued, without blocking.
    ///
    /// Returns the number of responses applied.
    pub fn process_responses(&mut self) -> usize {
        let Some(rx) = &self.responses else {
            return 0;
        };

        let mut applied = 0;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    self.transcript.append(event);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("response channel disconnected");
                    break;
                }
            }
        }
        if applied > 0 {
            debug!("applied {} responses", applied);
        }
        applied
    }

    /// Block the event loop until a response arrives or `timeout` passes,
    /// then drain whatever else is queued.
    pub fn wait_for_responses(&mut self, timeout: Duration) -> usize {
        let Some(rx) = &self.responses else {
            return 0;
        };

        match rx.recv_timeout(timeout) {
            Ok(event) => {
                self.transcript.append(event);
                1 + self.process_responses()
            }
            Err(RecvTimeoutError::Timeout) => 0,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("response channel disconnected");
                0
            }
        }
    }

    /// Release the response subscription. Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.responses.take().is_some() {
            info!("session torn down");
        }
    }

    fn ensure_live(&self, operation: &str) -> bool {
        let live = self.responses.is_some();
        debug_assert!(live, "{} called after teardown", operation);
        if !live {
            error!("{} called after teardown; ignored", operation);
        }
        live
    }
}

impl<T: Transport> Drop for SessionController<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Sender};

    use super::*;
    use crate::core::event::ResponseKind;
    use crate::core::selection::CatalogSlot;
    use crate::core::transport::testing::RecordingTransport;

    struct Fixture {
        session: SessionController<RecordingTransport>,
        backend: Sender<ResponseEvent>,
        commands: CatalogSlot<String>,
        patterns: CatalogSlot<Pattern>,
    }

    fn fixture() -> Fixture {
        let (backend, responses) = mpsc::channel();
        let commands = CatalogSlot::new();
        let patterns = CatalogSlot::new();
        let session = SessionController::new(
            RecordingTransport::default(),
            responses,
            Box::new(commands.clone()),
            Box::new(patterns.clone()),
        );
        Fixture {
            session,
            backend,
            commands,
            patterns,
        }
    }

    #[test]
    fn test_command_token() {
        assert_eq!(command_token("set key value"), "set");
        assert_eq!(command_token("  get\tfoo"), "get");
        // Leading whitespace is skipped, not taken as an empty first token
        assert_eq!(command_token(" get x"), "get");
        assert_eq!(command_token("   "), "");
        assert_eq!(command_token(""), "");
    }

    #[test]
    fn test_echo_before_send() {
        let mut f = fixture();
        let view = f.session.subscribe();
        f.session.transport_mut().view = Some(view);

        f.session.run_command("get foo");

        let transcript = f.session.transcript();
        assert_eq!(transcript.entries(), &[ResponseEvent::command("GET FOO")]);
        assert_eq!(
            f.session.transport().sent,
            vec![("get foo".to_string(), Some(1))]
        );
    }

    #[test]
    fn test_run_command_sets_first_token() {
        let mut f = fixture();
        f.session.run_command("set key value");

        assert_eq!(f.session.active_command(), Some("set"));
        assert_eq!(f.commands.get().as_deref(), Some("set"));
        assert_eq!(f.session.transport().sent[0].0, "set key value");

        f.session.run_command(" get x");
        assert_eq!(f.session.active_command(), Some("get"));
        assert_eq!(f.session.transport().sent[1].0, " get x");
    }

    #[test]
    fn test_blank_command_is_accepted() {
        let mut f = fixture();
        f.session.run_command("   ");

        let transcript = f.session.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.entries()[0].payload, "   ");
        assert_eq!(f.session.active_command(), Some(""));
        assert_eq!(f.session.transport().sent.len(), 1);

        f.session.run_command("");
        assert_eq!(f.session.transcript().entries()[1].payload, "");
    }

    #[test]
    fn test_write_command_does_not_dispatch() {
        let mut f = fixture();
        f.session.write_command("ping");

        assert_eq!(f.session.active_command(), Some("ping"));
        assert_eq!(f.session.pending_input(), Some("ping"));
        assert!(f.session.transcript().is_empty());
        assert!(f.session.transport().sent.is_empty());
    }

    #[test]
    fn test_submit_clears_pending_input() {
        let mut f = fixture();
        f.session.write_command("get a");
        assert_eq!(f.session.input_epoch(), 0);

        f.session.run_command("get a");
        assert_eq!(f.session.pending_input(), None);
        assert_eq!(f.session.input_epoch(), 1);
    }

    #[test]
    fn test_selection_independence() {
        let mut f = fixture();
        f.session.select_active_command("hget");

        for id in ["a", "b", "a"] {
            f.session.select_pattern(Pattern::new(id, "T"));
            assert_eq!(f.session.active_command(), Some("hget"));
        }
        assert_eq!(f.patterns.get().map(|p| p.id), Some("a".to_string()));

        f.session.run_command("del k");
        assert_eq!(f.session.active_pattern().map(|p| p.id.as_str()), Some("a"));
    }

    #[test]
    fn test_clear_output_keeps_selection() {
        let mut f = fixture();
        f.session.select_pattern(Pattern::new("get", "GET key"));
        f.session.run_command("get k");
        f.session.clear_output();
        f.session.clear_output();

        assert!(f.session.transcript().is_empty());
        assert_eq!(f.session.active_command(), Some("get"));
        assert!(f.session.active_pattern().is_some());
    }

    #[test]
    fn test_end_to_end() {
        let mut f = fixture();
        assert!(f.session.transcript().is_empty());
        assert_eq!(f.session.active_command(), None);
        assert_eq!(f.session.active_pattern(), None);

        f.session.run_command("lpush x 1");
        assert_eq!(
            f.session.transcript().entries(),
            &[ResponseEvent::new(true, "LPUSH X 1", ResponseKind::Command)]
        );
        assert_eq!(f.session.active_command(), Some("lpush"));

        f.backend
            .send(ResponseEvent::new(true, "(integer) 1", ResponseKind::Result))
            .unwrap();
        assert_eq!(f.session.process_responses(), 1);
        assert_eq!(
            f.session.transcript().entries(),
            &[
                ResponseEvent::new(true, "LPUSH X 1", ResponseKind::Command),
                ResponseEvent::new(true, "(integer) 1", ResponseKind::Result),
            ]
        );

        f.session.clear_output();
        assert!(f.session.transcript().is_empty());
        assert_eq!(f.session.active_command(), Some("lpush"));
    }

    #[test]
    fn test_in_flight_response_lands_after_echo() {
        let mut f = fixture();
        f.session.run_command("get a");
        // Response to the first command still queued
        f.backend.send(ResponseEvent::result("\"1\"")).unwrap();
        f.session.run_command("get b");
        f.session.process_responses();

        let payloads: Vec<_> = f
            .session
            .transcript()
            .iter()
            .map(|e| e.payload.clone())
            .collect();
        assert_eq!(payloads, vec!["GET A", "GET B", "\"1\""]);
    }

    #[test]
    fn test_wait_for_responses() {
        let mut f = fixture();
        assert_eq!(f.session.wait_for_responses(Duration::from_millis(10)), 0);

        f.backend.send(ResponseEvent::result("PONG")).unwrap();
        f.backend.send(ResponseEvent::error("ERR x")).unwrap();
        assert_eq!(f.session.wait_for_responses(Duration::from_secs(1)), 2);
        assert_eq!(f.session.transcript().len(), 2);
    }

    #[test]
    fn test_teardown_is_idempotent_and_stops_updates() {
        let mut f = fixture();
        f.session.run_command("ping");
        f.session.teardown();
        f.session.teardown();
        assert!(f.session.is_torn_down());

        // The transport keeps its end; nothing gets folded anymore
        let _ = f.backend.send(ResponseEvent::result("PONG"));
        assert_eq!(f.session.process_responses(), 0);
        assert_eq!(f.session.transcript().len(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "run_command called after teardown")]
    fn test_use_after_teardown_panics_in_debug() {
        let mut f = fixture();
        f.session.teardown();
        f.session.run_command("ping");
    }

    #[test]
    fn test_history_and_plain_echo() {
        let (_backend, responses) = mpsc::channel();
        let mut session = SessionController::new(
            RecordingTransport::default(),
            responses,
            Box::new(CatalogSlot::<String>::new()),
            Box::new(CatalogSlot::<Pattern>::new()),
        )
        .with_history(CommandHistory::in_memory(10))
        .with_uppercase_echo(false);

        session.run_command("get Key");
        session.run_command("auth secret");

        assert_eq!(session.transcript().entries()[0].payload, "get Key");
        let history = session.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.recent(1)[0].command, "get Key");
    }
}
