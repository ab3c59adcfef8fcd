//! Candidate narrowing (Stages A and B).
//!
//! - `engine`: Stage A feature extraction with a per-session TTL cache
//! - `scoring`: Stage B keyword scoring and the never-empty shortlist policy

mod engine;
pub mod scoring;

pub use engine::ShortlistEngine;
