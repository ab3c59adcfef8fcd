//! Live session services.
//!
//! - `admission`: per-frame serve-cached / drop / admit decision
//! - `registry`: one entry per open connection

mod admission;
mod registry;

pub use admission::{AdmissionController, AdmissionDecision, CachedReason};
pub use registry::{SessionHandle, SessionRegistry};
