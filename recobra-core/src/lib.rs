//! # recobra-core
//!
//! Core library for recobra - a conversation analysis pipeline for
//! sales-recovery workflows.
//!
//! This library provides:
//! - A tagged pattern table for Spanish-language conversation matching
//! - A transcript classifier with an explicit handoff state machine
//! - A content-addressed result cache backed by SQLite
//! - Deterministic repair of enumerated output fields
//! - Optional LLM lead summarization
//!
//! ## Data flow
//!
//! ```text
//! transcript → digest → cache lookup
//!                          │ hit: stored payload
//!                          └ miss: classify → summarize → validate → store
//! ```
//!
//! Transcripts are read-only inputs; everything the pipeline produces is
//! derived and regenerable. A changed transcript produces a new digest, so
//! cache invalidation is purely content-addressed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use recobra_core::{AnalysisPipeline, Config, ResultCache};
//!
//! let config = Config::load().expect("failed to load config");
//! let cache = ResultCache::open(&config.cache.resolved_path()).expect("failed to open cache");
//! cache.migrate().expect("failed to run migrations");
//!
//! let pipeline = AnalysisPipeline::with_spanish_patterns(config.validation.constraints())
//!     .expect("failed to compile patterns");
//! ```

// Re-export commonly used items at the crate root
pub use cache::ResultCache;
pub use classifier::ConversationClassifier;
pub use config::Config;
pub use error::{Error, Result};
pub use patterns::PatternLibrary;
pub use pipeline::{AnalysisOutcome, AnalysisPipeline};
pub use types::*;
pub use validator::{EnumConstraint, NormalizedValue, RepairAction};

// Public modules
pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod patterns;
pub mod pipeline;
pub mod summary;
pub mod types;
pub mod validator;
