//! Sign vocabulary domain module.
//!
//! - `model`: the `VocabularyEntry` label/metadata record
//! - `repository`: read-only store interface the vocabulary cache consumes

mod model;
mod repository;

pub use model::VocabularyEntry;
pub use repository::VocabularyRepository;
