//! End-to-end `generate` pipeline: URL → cache check → extract → synthesize → persist.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{info, instrument, warn};

use quizsmith_extractor::ArticleSource;
use quizsmith_shared::{Quiz, QuizsmithError, Result};
use quizsmith_storage::Storage;
use quizsmith_synthesizer::Synthesizer;

/// Pipeline stage, used for progress and structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CacheCheck,
    Extract,
    Synthesize,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheCheck => "cache_check",
            Self::Extract => "extract",
            Self::Synthesize => "synthesize",
            Self::Persist => "persist",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::CacheCheck => "Checking for an existing quiz",
            Self::Extract => "Fetching article",
            Self::Synthesize => "Generating quiz",
            Self::Persist => "Saving quiz",
        }
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new stage.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, quiz: &Quiz, cached: bool);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _quiz: &Quiz, _cached: bool) {}
}

/// Drives one URL through the pipeline. Built once and shared.
pub struct Coordinator {
    source: Arc<dyn ArticleSource>,
    synthesizer: Synthesizer,
    storage: Arc<Storage>,
    max_attempts: u32,
    locks: LockMap,
}

impl Coordinator {
    /// `max_attempts` bounds synthesize runs on transient failures (min 1).
    pub fn new(
        source: Arc<dyn ArticleSource>,
        synthesizer: Synthesizer,
        storage: Arc<Storage>,
        max_attempts: u32,
    ) -> Self {
        Self {
            source,
            synthesizer,
            storage,
            max_attempts: max_attempts.max(1),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Return the quiz for `url`, generating and storing it when there is
    /// none yet or when `force_refresh` is set.
    ///
    /// Requests for the same URL are serialized: a concurrent second request
    /// waits and then sees the first one's quiz.
    #[instrument(skip(self, progress))]
    pub async fn generate(
        &self,
        url: &str,
        force_refresh: bool,
        progress: &dyn ProgressReporter,
    ) -> Result<Quiz> {
        let url = url.trim();
        if url.is_empty() {
            return Err(QuizsmithError::validation("URL must not be empty"));
        }

        let entry = UrlLock::acquire(&self.locks, url);
        let _held = entry.lock.lock().await;
        self.run(url, force_refresh, progress).await
    }

    /// All stored quizzes, oldest first.
    pub async fn history(&self) -> Result<Vec<Quiz>> {
        self.storage.list_quizzes().await
    }

    /// One stored quiz by id.
    pub async fn quiz(&self, id: i64) -> Result<Option<Quiz>> {
        self.storage.get_quiz(id).await
    }

    async fn run(&self, url: &str, force_refresh: bool, progress: &dyn ProgressReporter) -> Result<Quiz> {
        let start = Instant::now();

        if !force_refresh {
            enter(Stage::CacheCheck, progress);
            if let Some(quiz) = self
                .storage
                .find_latest_by_url(url)
                .await
                .inspect_err(|e| failed(Stage::CacheCheck, e))?
            {
                info!(quiz_id = quiz.id, "cached quiz returned");
                progress.done(&quiz, true);
                return Ok(quiz);
            }
        }

        enter(Stage::Extract, progress);
        let article = self
            .source
            .extract(url)
            .await
            .inspect_err(|e| failed(Stage::Extract, e))?;

        enter(Stage::Synthesize, progress);
        let mut attempt = 1;
        let draft = loop {
            match self.synthesizer.synthesize(&article).await {
                Ok(draft) => break draft,
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(attempt, max_attempts = self.max_attempts, error = %e, "synthesis failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    failed(Stage::Synthesize, &e);
                    return Err(e);
                }
            }
        };

        enter(Stage::Persist, progress);
        let quiz = self
            .storage
            .save_quiz(&article, &draft, url)
            .await
            .inspect_err(|e| failed(Stage::Persist, e))?;

        info!(
            quiz_id = quiz.id,
            questions = quiz.questions.len(),
            sections = quiz.sections.len(),
            attempts = attempt,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "quiz generated"
        );
        progress.done(&quiz, false);
        Ok(quiz)
    }
}

type LockMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// A reference to one URL's lock. Dropping it removes the map entry once no
/// other request holds or waits on it, including when `generate` is cancelled.
struct UrlLock<'a> {
    locks: &'a LockMap,
    url: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> UrlLock<'a> {
    fn acquire(locks: &'a LockMap, url: &'a str) -> Self {
        let lock = {
            let mut map = locks.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(url.to_string()).or_default().clone()
        };
        Self { locks, url, lock }
    }
}

impl Drop for UrlLock<'_> {
    fn drop(&mut self) {
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one here
        if Arc::strong_count(&self.lock) == 2 {
            map.remove(self.url);
        }
    }
}

fn enter(stage: Stage, progress: &dyn ProgressReporter) {
    info!(stage = stage.as_str(), "entering stage");
    progress.phase(stage.label());
}

fn failed(stage: Stage, error: &QuizsmithError) {
    warn!(
        stage = stage.as_str(),
        client_fault = error.is_client_fault(),
        error = %error,
        "generation failed"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
