//! Infrastructure layer for Signlens.
//!
//! File-system implementations of the domain's configuration, secret and
//! repository interfaces.

pub mod async_dir_translation_repository;
pub mod config_service;
pub mod json_vocabulary_repository;
pub mod paths;
pub mod secret_service;

pub use async_dir_translation_repository::AsyncDirTranslationRepository;
pub use config_service::ConfigService;
pub use json_vocabulary_repository::{JsonVocabularyRepository, seed_vocabulary};
pub use paths::{PathError, SignlensPaths};
pub use secret_service::SecretServiceImpl;
