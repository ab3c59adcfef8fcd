//! Application layer for Signlens.
//!
//! Coordinates the domain types and the oracle client into the streaming
//! classification pipeline: vocabulary caching, shortlist narrowing, final
//! classification, per-frame admission control and the session registry.

pub mod classifier;
pub mod pipeline;
pub mod session;
pub mod shortlist;
pub mod vocabulary_cache;

pub use classifier::FinalClassifier;
pub use pipeline::{
    ANONYMOUS_REQUEST_KEY, CachedReply, FrameDecision, KeyedOutcome, PipelineError, Reply,
    TranslationPipeline,
};
pub use session::{AdmissionController, AdmissionDecision, CachedReason, SessionHandle, SessionRegistry};
pub use shortlist::ShortlistEngine;
pub use vocabulary_cache::VocabularyCache;
