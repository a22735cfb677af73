//! # trajview-rs
//!
//! Normalizes agent trajectories (OpenHands event streams, evaluation
//! histories, bare git patches) into one timeline shape, and handles JSONL
//! evaluation files holding one trajectory per line.
//!
//! ```text
//! raw JSON ──▶ Envelope::detect ──▶ normalizer ──▶ Vec<TimelineEntry> ──▶ classify
//! JSONL    ──▶ parse_records ──▶ sort_records ──▶ timeline_for_record ──▶ eval_history
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod eval_history;
pub mod jsonl;
pub mod normalizer;
pub mod object_path;
pub mod timeline;
pub mod trajectory;

pub use classify::{classify, StepInfo};
pub use error::NormalizeError;
pub use jsonl::{JsonlRecord, SortDirection, ViewerSettings};
pub use normalizer::normalize;
pub use timeline::{ActorType, EntryType, TimelineEntry};
