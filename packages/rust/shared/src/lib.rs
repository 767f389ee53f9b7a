//! Shared types, error model, and configuration for Quizsmith.
//!
//! This crate is the foundation depended on by all other Quizsmith crates.
//! It provides:
//! - [`QuizsmithError`]: the unified error type
//! - Domain types ([`Article`], [`QuizDraft`], [`Quiz`] and its children)
//! - Configuration ([`AppConfig`], config loading, env overrides)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DatabaseConfig, FetchConfig, GenerationConfig, MAX_GENERATION_ATTEMPTS,
    OpenRouterConfig, ServerConfig, api_key, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{QuizsmithError, Result};
pub use types::{
    Article, Difficulty, DraftEntities, DraftQuestion, EntityCategory, KeyEntity, MAX_QUESTIONS,
    MIN_QUESTIONS, OPTIONS_PER_QUESTION, Question, Quiz, QuizDraft, QuizOption, RelatedTopic,
    Section,
};
