//! Live Marking
//!
//! The core of the application: normalize OCR lines, look them up in the
//! sheet, highlight matches, and keep doing so on a background thread until
//! told to stop.

pub mod events;
pub mod matcher;
pub mod poller;
pub mod session;

pub use events::SessionEvent;
pub use matcher::find_cell;
pub use poller::{Poller, SheetTarget};
pub use session::{MarkingSession, SessionStatus};
