//! Turso Embedded / libSQL storage for quizzes.
//!
//! The [`Storage`] struct wraps a local libSQL database holding each quiz as
//! an aggregate: the `quizzes` row plus its questions, options, key
//! entities, sections and related topics, all cascade-deleted together.
//!
//! Every operation opens its own connection, so concurrent requests never
//! share a session or a transaction.

mod migrations;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, Transaction, params};
use quizsmith_shared::{
    Article, Difficulty, EntityCategory, KeyEntity, Question, Quiz, QuizDraft, QuizOption,
    QuizsmithError, RelatedTopic, Result, Section,
};
use tracing::{debug, info, instrument};

/// Milliseconds a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

fn storage_err(e: libsql::Error) -> QuizsmithError {
    QuizsmithError::Storage(e.to_string())
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    db: Database,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| QuizsmithError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let storage = Self { db };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// A fresh connection with foreign keys enforced.
    async fn connect(&self) -> Result<Connection> {
        let conn = self.db.connect().map_err(storage_err)?;
        conn.execute_batch(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"
        ))
        .await
        .map_err(storage_err)?;
        Ok(conn)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let conn = self.connect().await?;
        let current_version = schema_version(&conn).await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                conn.execute_batch(migration.sql).await.map_err(|e| {
                    QuizsmithError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Persist a validated draft as a new quiz and return it fully hydrated.
    ///
    /// All rows are written in one transaction. On any failure the
    /// transaction is rolled back and no part of the quiz is visible.
    #[instrument(skip(self, article, draft))]
    pub async fn save_quiz(&self, article: &Article, draft: &QuizDraft, url: &str) -> Result<Quiz> {
        let conn = self.connect().await?;
        let tx = conn.transaction().await.map_err(storage_err)?;

        let quiz_id = match insert_graph(&tx, article, draft, url).await {
            Ok(id) => id,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    debug!(error = %rollback, "rollback failed");
                }
                return Err(e);
            }
        };
        tx.commit().await.map_err(storage_err)?;

        info!(quiz_id, questions = draft.questions.len(), "quiz saved");

        load_quiz(&conn, quiz_id).await?.ok_or_else(|| {
            QuizsmithError::Storage(format!("quiz {quiz_id} vanished after commit"))
        })
    }

    /// Delete a quiz and everything it owns. Returns whether it existed.
    pub async fn delete_quiz(&self, id: i64) -> Result<bool> {
        let conn = self.connect().await?;
        let affected = conn
            .execute("DELETE FROM quizzes WHERE id = ?1", params![id])
            .await
            .map_err(storage_err)?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetch one quiz by id.
    pub async fn get_quiz(&self, id: i64) -> Result<Option<Quiz>> {
        let conn = self.connect().await?;
        load_quiz(&conn, id).await
    }

    /// The most recently created quiz for `url`, if any.
    pub async fn find_latest_by_url(&self, url: &str) -> Result<Option<Quiz>> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT id FROM quizzes WHERE url = ?1 ORDER BY id DESC LIMIT 1",
                params![url],
            )
            .await
            .map_err(storage_err)?;

        let id = match rows.next().await.map_err(storage_err)? {
            Some(row) => row.get::<i64>(0).map_err(storage_err)?,
            None => return Ok(None),
        };
        load_quiz(&conn, id).await
    }

    /// Every stored quiz, hydrated, in id order.
    pub async fn list_quizzes(&self) -> Result<Vec<Quiz>> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query("SELECT id FROM quizzes ORDER BY id ASC", params![])
            .await
            .map_err(storage_err)?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            ids.push(row.get::<i64>(0).map_err(storage_err)?);
        }

        let mut quizzes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(quiz) = load_quiz(&conn, id).await? {
                quizzes.push(quiz);
            }
        }
        Ok(quizzes)
    }

    /// Number of stored quizzes for `url`.
    pub async fn quiz_count_for_url(&self, url: &str) -> Result<u64> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM quizzes WHERE url = ?1", params![url])
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => {
                let count = row.get::<i64>(0).map_err(storage_err)?;
                Ok(u64::try_from(count).unwrap_or(0))
            }
            None => Ok(0),
        }
    }
}

/// Current schema version, or 0 if no migrations have been applied.
async fn schema_version(conn: &Connection) -> u32 {
    match conn
        .query("SELECT MAX(version) FROM schema_migrations", params![])
        .await
    {
        Ok(mut rows) => match rows.next().await {
            Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
            _ => 0,
        },
        Err(_) => 0, // Table doesn't exist yet
    }
}

/// Insert the quiz row and all children in dependency order.
async fn insert_graph(tx: &Transaction, article: &Article, draft: &QuizDraft, url: &str) -> Result<i64> {
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

    tx.execute(
        "INSERT INTO quizzes (url, title, summary, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![url, article.title.as_str(), draft.summary.as_str(), created_at],
    )
    .await
    .map_err(storage_err)?;
    let quiz_id = tx.last_insert_rowid();

    for topic in &draft.related_topics {
        tx.execute(
            "INSERT INTO related_topics (quiz_id, topic) VALUES (?1, ?2)",
            params![quiz_id, topic.as_str()],
        )
        .await
        .map_err(storage_err)?;
    }

    for name in &article.sections {
        tx.execute(
            "INSERT INTO sections (quiz_id, name) VALUES (?1, ?2)",
            params![quiz_id, name.as_str()],
        )
        .await
        .map_err(storage_err)?;
    }

    for category in EntityCategory::ALL {
        for name in draft.key_entities.names(category) {
            tx.execute(
                "INSERT INTO key_entities (quiz_id, category, name) VALUES (?1, ?2, ?3)",
                params![quiz_id, category.as_str(), name.as_str()],
            )
            .await
            .map_err(storage_err)?;
        }
    }

    for question in &draft.questions {
        tx.execute(
            "INSERT INTO questions (quiz_id, text, correct_answer, explanation, difficulty)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                quiz_id,
                question.question.as_str(),
                question.answer.as_str(),
                question.explanation.as_str(),
                question.difficulty.as_str()
            ],
        )
        .await
        .map_err(storage_err)?;
        let question_id = tx.last_insert_rowid();

        for option in &question.options {
            tx.execute(
                "INSERT INTO options (question_id, text) VALUES (?1, ?2)",
                params![question_id, option.as_str()],
            )
            .await
            .map_err(storage_err)?;
        }
    }

    Ok(quiz_id)
}

/// Load one quiz with every child collection in insertion order.
async fn load_quiz(conn: &Connection, id: i64) -> Result<Option<Quiz>> {
    let mut rows = conn
        .query(
            "SELECT id, url, title, summary, created_at FROM quizzes WHERE id = ?1",
            params![id],
        )
        .await
        .map_err(storage_err)?;

    let Some(row) = rows.next().await.map_err(storage_err)? else {
        return Ok(None);
    };
    let created_at: String = row.get(4).map_err(storage_err)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| QuizsmithError::Storage(format!("quiz {id}: bad created_at: {e}")))?
        .with_timezone(&Utc);

    let mut quiz = Quiz {
        id: row.get(0).map_err(storage_err)?,
        url: row.get(1).map_err(storage_err)?,
        title: row.get(2).map_err(storage_err)?,
        summary: row.get(3).map_err(storage_err)?,
        created_at,
        questions: Vec::new(),
        key_entities: Vec::new(),
        sections: Vec::new(),
        related_topics: Vec::new(),
    };

    let mut rows = conn
        .query(
            "SELECT id, topic FROM related_topics WHERE quiz_id = ?1 ORDER BY id",
            params![id],
        )
        .await
        .map_err(storage_err)?;
    while let Some(row) = rows.next().await.map_err(storage_err)? {
        quiz.related_topics.push(RelatedTopic {
            id: row.get(0).map_err(storage_err)?,
            topic: row.get(1).map_err(storage_err)?,
        });
    }

    let mut rows = conn
        .query(
            "SELECT id, name FROM sections WHERE quiz_id = ?1 ORDER BY id",
            params![id],
        )
        .await
        .map_err(storage_err)?;
    while let Some(row) = rows.next().await.map_err(storage_err)? {
        quiz.sections.push(Section {
            id: row.get(0).map_err(storage_err)?,
            name: row.get(1).map_err(storage_err)?,
        });
    }

    let mut rows = conn
        .query(
            "SELECT id, category, name FROM key_entities WHERE quiz_id = ?1 ORDER BY id",
            params![id],
        )
        .await
        .map_err(storage_err)?;
    while let Some(row) = rows.next().await.map_err(storage_err)? {
        let category: String = row.get(1).map_err(storage_err)?;
        quiz.key_entities.push(KeyEntity {
            id: row.get(0).map_err(storage_err)?,
            category: category.parse::<EntityCategory>().map_err(QuizsmithError::Storage)?,
            name: row.get(2).map_err(storage_err)?,
        });
    }

    let mut rows = conn
        .query(
            "SELECT id, text, correct_answer, explanation, difficulty
             FROM questions WHERE quiz_id = ?1 ORDER BY id",
            params![id],
        )
        .await
        .map_err(storage_err)?;
    while let Some(row) = rows.next().await.map_err(storage_err)? {
        let difficulty: String = row.get(4).map_err(storage_err)?;
        quiz.questions.push(Question {
            id: row.get(0).map_err(storage_err)?,
            text: row.get(1).map_err(storage_err)?,
            correct_answer: row.get(2).map_err(storage_err)?,
            explanation: row.get(3).map_err(storage_err)?,
            difficulty: difficulty.parse::<Difficulty>().map_err(QuizsmithError::Storage)?,
            options: Vec::new(),
        });
    }

    let mut rows = conn
        .query(
            "SELECT o.id, o.question_id, o.text
             FROM options o JOIN questions q ON o.question_id = q.id
             WHERE q.quiz_id = ?1 ORDER BY o.id",
            params![id],
        )
        .await
        .map_err(storage_err)?;
    while let Some(row) = rows.next().await.map_err(storage_err)? {
        let question_id: i64 = row.get(1).map_err(storage_err)?;
        if let Some(question) = quiz.questions.iter_mut().find(|q| q.id == question_id) {
            question.options.push(QuizOption {
                id: row.get(0).map_err(storage_err)?,
                text: row.get(2).map_err(storage_err)?,
            });
        }
    }

    Ok(Some(quiz))
}
