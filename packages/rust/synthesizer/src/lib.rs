//! Quiz synthesis from an extracted article.
//!
//! [`Synthesizer`] builds the prompt, calls a [`TextModel`] once and hands the
//! response to [`parse_draft`]. Only validated drafts leave this crate.

mod client;
mod prompt;
mod schema;

use std::sync::Arc;

use quizsmith_shared::{Article, QuizDraft, Result};
use tracing::{info, instrument, warn};

pub use client::{OpenRouterClient, TextModel};
pub use prompt::{BANNED_PHRASES, OUTPUT_SCHEMA, build_prompt};
pub use schema::{MAX_TOPIC_CHARS, parse_draft};

/// Turns articles into validated quiz drafts.
#[derive(Clone)]
pub struct Synthesizer {
    model: Arc<dyn TextModel>,
}

impl Synthesizer {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    /// One model call, one validation pass. Retries belong to the caller.
    #[instrument(skip_all, fields(title = %article.title))]
    pub async fn synthesize(&self, article: &Article) -> Result<QuizDraft> {
        let prompt = build_prompt(article);
        let raw = self.model.complete(&prompt).await?;

        match parse_draft(&raw) {
            Ok(draft) => {
                info!(questions = draft.questions.len(), "quiz draft accepted");
                Ok(draft)
            }
            Err(e) => {
                warn!(error = %e, "model output rejected");
                Err(e)
            }
        }
    }
}
