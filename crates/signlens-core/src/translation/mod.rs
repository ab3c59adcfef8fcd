//! Translation domain module.
//!
//! - `model`: classification results, Stage A features and persisted records
//! - `repository`: session/translation history store interface

mod model;
mod repository;

pub use model::{
    AlternativeSign, ClassificationResult, JudgeEntry, ShortlistFeatures, TranslationRecord,
    TranslationSession,
};
pub use repository::TranslationRepository;
