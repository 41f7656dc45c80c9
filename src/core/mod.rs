//! Session core.
//!
//! - **event**: response events, transcript updates, patterns
//! - **transcript**: fold of updates into the published transcript
//! - **selection**: active command / active pattern and their catalogs
//! - **transport**: outbound command channel and backend worker
//! - **session**: controller tying the pieces together
//!
//! # Data flow
//!
//! ```text
//! input ──► SessionController ──► echo ──► TranscriptAccumulator ──► views
//!                 │                              ▲
//!                 └──► Transport ──► Backend ────┘ (response channel)
//! ```

pub mod event;
pub mod selection;
pub mod session;
pub mod transcript;
pub mod transport;

pub use event::{Pattern, ResponseEvent, ResponseKind};
pub use selection::CatalogSlot;
pub use session::SessionController;
pub use transcript::{Transcript, TranscriptView};
pub use transport::{Backend, ChannelTransport};
