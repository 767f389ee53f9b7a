//! SQL migration definitions for the Quizsmith database.
//!
//! Migrations are applied in order on database open. Each one records its
//! version in `schema_migrations`.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: quizzes and their owned children",
        sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Aggregate root. url is a lookup key, not unique: regeneration adds rows.
CREATE TABLE IF NOT EXISTS quizzes (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    url        TEXT NOT NULL,
    title      TEXT NOT NULL,
    summary    TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_quizzes_url ON quizzes(url);

CREATE TABLE IF NOT EXISTS related_topics (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    quiz_id INTEGER NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
    topic   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_related_topics_quiz ON related_topics(quiz_id);

CREATE TABLE IF NOT EXISTS sections (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    quiz_id INTEGER NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
    name    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sections_quiz ON sections(quiz_id);

CREATE TABLE IF NOT EXISTS key_entities (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    quiz_id  INTEGER NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
    category TEXT NOT NULL CHECK (category IN ('people', 'organizations', 'locations')),
    name     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_key_entities_quiz ON key_entities(quiz_id);

CREATE TABLE IF NOT EXISTS questions (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    quiz_id        INTEGER NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
    text           TEXT NOT NULL,
    correct_answer TEXT NOT NULL,
    explanation    TEXT NOT NULL,
    difficulty     TEXT NOT NULL CHECK (difficulty IN ('easy', 'medium', 'hard'))
);

CREATE INDEX IF NOT EXISTS idx_questions_quiz ON questions(quiz_id);

CREATE TABLE IF NOT EXISTS options (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
    text        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_options_question ON options(question_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
