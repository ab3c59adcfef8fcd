//! Domain layer for Signlens.
//!
//! Holds the types shared by every other crate: frames, vocabulary entries,
//! classification results, per-connection session state, configuration, and
//! the interfaces of the external collaborators (vocabulary store,
//! translation store, inference oracle, secret source).

pub mod clock;
pub mod config;
pub mod error;
pub mod frame;
pub mod oracle;
pub mod secret;
pub mod session;
pub mod translation;
pub mod vocabulary;

// Re-export common types
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, SignlensError};
pub use frame::Frame;
