//! Transcript accumulation
//!
//! Folds [`Update`]s into the ordered transcript and republishes the full
//! transcript to every subscriber after each fold.

use tokio::sync::watch;
use tracing::debug;

use super::event::{ResponseEvent, Update};

/// Ordered log of response events, most recent last
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<ResponseEvent>,
    /// Number of resets observed so far
    resets: u64,
}

impl Transcript {
    pub fn entries(&self) -> &[ResponseEvent] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResponseEvent> {
        self.entries.iter()
    }

    /// Reset generation. Two snapshots with different generations do not
    /// share any entries.
    pub fn resets(&self) -> u64 {
        self.resets
    }

    fn apply(&mut self, update: Update) {
        match update {
            Update::Append(event) => self.entries.push(event),
            Update::Reset => {
                self.entries = Vec::new();
                self.resets += 1;
            }
        }
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a ResponseEvent;
    type IntoIter = std::slice::Iter<'a, ResponseEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Live view of the transcript.
///
/// Each subscriber starts from the transcript current at subscription
/// time. Each borrowed value is the whole transcript, not a delta.
///
/// Only the latest state is kept: a subscriber that reads after several
/// updates sees the last snapshot, and the intermediate ones are merged
/// into it. Compare [`Transcript::resets`] to spot a reset that happened
/// in between.
pub type TranscriptView = watch::Receiver<Transcript>;

/// Owner of the transcript fold
pub struct TranscriptAccumulator {
    tx: watch::Sender<Transcript>,
}

impl Default for TranscriptAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Transcript::default());
        Self { tx }
    }

    /// Fold one update and publish the resulting transcript
    pub fn apply(&self, update: Update) {
        match &update {
            Update::Append(event) => {
                debug!("transcript append: kind={} valid={}", event.kind, event.is_valid)
            }
            Update::Reset => debug!("transcript reset"),
        }
        // send_modify notifies even when nobody is subscribed yet
        self.tx.send_modify(|transcript| transcript.apply(update));
    }

    pub fn append(&self, event: ResponseEvent) {
        self.apply(Update::Append(event));
    }

    pub fn reset(&self) {
        self.apply(Update::Reset);
    }

    /// Copy of the current transcript
    pub fn snapshot(&self) -> Transcript {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> TranscriptView {
        self.tx.subscribe()
    }
}
