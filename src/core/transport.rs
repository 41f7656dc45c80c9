//! Command transport
//!
//! The session hands every submitted command to a [`Transport`] and never
//! waits for the answer. Answers (and failures) come back later as
//! [`ResponseEvent`]s on a channel.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use super::event::ResponseEvent;

/// Outbound half of a backend connection
pub trait Transport {
    /// Queue `command` for execution. Never fails synchronously.
    fn send(&mut self, command: &str);
}

/// Something that can execute one command and describe the outcome
pub trait Backend: Send + 'static {
    fn execute(&mut self, command: &str) -> ResponseEvent;
}

/// Transport that forwards commands to a backend worker thread
pub struct ChannelTransport {
    /// Channel to the worker; taken on drop so the worker can exit
    commands: Option<Sender<String>>,
    /// Used to report delivery failures in-band
    responses: Sender<ResponseEvent>,
    worker: Option<JoinHandle<()>>,
}

impl ChannelTransport {
    /// Start `backend` on its own thread.
    ///
    /// Returns the transport and the channel its responses arrive on.
    pub fn spawn<B: Backend>(mut backend: B) -> (Self, Receiver<ResponseEvent>) {
        let (command_tx, command_rx) = mpsc::channel::<String>();
        let (response_tx, response_rx) = mpsc::channel::<ResponseEvent>();

        let worker_tx = response_tx.clone();
        let worker = thread::spawn(move || {
            for command in command_rx {
                let response = backend.execute(&command);
                if worker_tx.send(response).is_err() {
                    // Nobody listens anymore
                    break;
                }
            }
            info!("backend worker stopped");
        });

        let transport = Self {
            commands: Some(command_tx),
            responses: response_tx,
            worker: Some(worker),
        };
        (transport, response_rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, command: &str) {
        let delivered = self
            .commands
            .as_ref()
            .map(|tx| tx.send(command.to_string()).is_ok())
            .unwrap_or(false);

        if !delivered {
            warn!("backend unavailable, dropping command");
            let _ = self
                .responses
                .send(ResponseEvent::error("ERR connection closed"));
        }
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        // Closing the command channel ends the worker loop
        self.commands.take();

        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
