//! Live session domain module.
//!
//! - `history`: bounded FIFO buffer used for frame and conversation history
//! - `model`: per-connection `SessionState`

mod history;
mod model;

pub use history::BoundedHistory;
pub use model::{ConversationEntry, SessionState};
