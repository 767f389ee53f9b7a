//! Boundary validation of untrusted model output.
//!
//! Model text is located, parsed, lightly repaired and then checked against
//! the quiz contract. Anything that still fails is rejected as a whole with a
//! [`QuizsmithError::Schema`] naming the offending field; no question is ever
//! dropped to make the rest pass.

use std::collections::HashSet;
use std::sync::LazyLock;

use quizsmith_shared::{
    Difficulty, DraftEntities, DraftQuestion, MAX_QUESTIONS, MIN_QUESTIONS, OPTIONS_PER_QUESTION,
    QuizDraft, QuizsmithError, Result,
};
use regex::Regex;
use serde::Deserialize;

/// Longest related topic we accept.
pub const MAX_TOPIC_CHARS: usize = 120;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?(.*?)```").expect("fence regex is valid")
});

// ---------------------------------------------------------------------------
// Raw (unvalidated) shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawDraft {
    summary: String,
    key_entities: RawEntities,
    questions: Vec<RawQuestion>,
    related_topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawEntities {
    people: Vec<String>,
    organizations: Vec<String>,
    locations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    options: Vec<String>,
    answer: String,
    difficulty: String,
    #[serde(default)]
    explanation: String,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Parse and validate a model response into a [`QuizDraft`].
pub fn parse_draft(raw: &str) -> Result<QuizDraft> {
    let mut first_error = None;
    for json in json_candidates(raw) {
        match serde_json::from_str::<RawDraft>(json) {
            Ok(draft) => return validate(draft),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    Err(match first_error {
        Some(e) => QuizsmithError::schema(format!("response does not match schema: {e}")),
        None => QuizsmithError::schema("response contains no JSON object"),
    })
}

/// Spans that may hold the quiz object: each fenced `{...}` block in order,
/// then the outermost `{...}` of the whole response.
fn json_candidates(raw: &str) -> Vec<&str> {
    let mut candidates: Vec<&str> = FENCED_BLOCK
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|block| block.starts_with('{') && block.ends_with('}'))
        .collect();

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            candidates.push(&raw[start..=end]);
        }
    }
    candidates
}

fn validate(raw: RawDraft) -> Result<QuizDraft> {
    let summary = raw.summary.trim().to_string();
    if summary.is_empty() {
        return Err(QuizsmithError::schema("summary is empty"));
    }

    let count = raw.questions.len();
    if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&count) {
        return Err(QuizsmithError::schema(format!(
            "expected {MIN_QUESTIONS}-{MAX_QUESTIONS} questions, got {count}"
        )));
    }

    let questions = raw
        .questions
        .into_iter()
        .enumerate()
        .map(|(i, q)| validate_question(i, q))
        .collect::<Result<Vec<_>>>()?;

    let related_topics = clean_names(raw.related_topics);
    if related_topics.is_empty() {
        return Err(QuizsmithError::schema("related_topics is empty"));
    }
    if let Some(long) = related_topics
        .iter()
        .find(|t| t.chars().count() > MAX_TOPIC_CHARS)
    {
        return Err(QuizsmithError::schema(format!(
            "related topic longer than {MAX_TOPIC_CHARS} characters: '{}...'",
            long.chars().take(40).collect::<String>()
        )));
    }

    Ok(QuizDraft {
        summary,
        key_entities: DraftEntities {
            people: clean_names(raw.key_entities.people),
            organizations: clean_names(raw.key_entities.organizations),
            locations: clean_names(raw.key_entities.locations),
        },
        questions,
        related_topics,
    })
}

fn validate_question(index: usize, raw: RawQuestion) -> Result<DraftQuestion> {
    let at = |msg: String| QuizsmithError::schema(format!("questions[{index}]: {msg}"));

    let question = raw.question.trim().to_string();
    if question.is_empty() {
        return Err(at("question text is empty".into()));
    }

    let options: Vec<String> = raw.options.iter().map(|o| o.trim().to_string()).collect();
    if options.len() != OPTIONS_PER_QUESTION {
        return Err(at(format!(
            "expected {OPTIONS_PER_QUESTION} options, got {}",
            options.len()
        )));
    }
    if options.iter().any(|o| o.is_empty()) {
        return Err(at("an option is empty".into()));
    }
    let distinct: HashSet<&str> = options.iter().map(String::as_str).collect();
    if distinct.len() != options.len() {
        return Err(at("options are not distinct".into()));
    }

    let difficulty: Difficulty = raw.difficulty.parse().map_err(at)?;

    let answer = resolve_answer(raw.answer.trim(), &options)
        .ok_or_else(|| at(format!("answer '{}' is not one of its options", raw.answer.trim())))?;

    Ok(DraftQuestion {
        question,
        options,
        answer,
        difficulty,
        explanation: raw.explanation.trim().to_string(),
    })
}

/// Exact match first; otherwise a unique case-insensitive match is accepted
/// and rewritten to the option's own text.
fn resolve_answer(answer: &str, options: &[String]) -> Option<String> {
    if options.iter().any(|o| o == answer) {
        return Some(answer.to_string());
    }

    let lowered = answer.to_lowercase();
    let mut matches = options.iter().filter(|o| o.to_lowercase() == lowered);
    match (matches.next(), matches.next()) {
        (Some(only), None) => Some(only.clone()),
        _ => None,
    }
}

/// Trim names and drop blanks, keeping model order.
fn clean_names(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn question(n: usize) -> Value {
        json!({
            "question": format!("Question {n}?"),
            "options": [format!("Right {n}"), "Wrong A", "Wrong B", "Wrong C"],
            "answer": format!("Right {n}"),
            "difficulty": (["easy", "medium", "hard"][n % 3]),
            "explanation": "Because the text says so."
        })
    }

    fn valid_response(questions: usize) -> Value {
        json!({
            "summary": "Ada Lovelace was a mathematician.",
            "key_entities": {
                "people": ["Ada Lovelace", "Charles Babbage"],
                "organizations": [],
                "locations": ["London"]
            },
            "questions": (0..questions).map(question).collect::<Vec<_>>(),
            "related_topics": ["Analytical Engine", "Lord Byron"]
        })
    }

    #[test]
    fn accepts_valid_response() {
        let draft = parse_draft(&valid_response(6).to_string()).unwrap();

        assert_eq!(draft.questions.len(), 6);
        assert_eq!(draft.key_entities.people.len(), 2);
        assert!(draft.key_entities.organizations.is_empty());
        assert_eq!(draft.related_topics, vec!["Analytical Engine", "Lord Byron"]);
        for q in &draft.questions {
            assert_eq!(q.options.len(), OPTIONS_PER_QUESTION);
            assert_eq!(q.options.iter().filter(|o| **o == q.answer).count(), 1);
        }
    }

    #[test]
    fn accepts_fixture_response() {
        let raw = std::fs::read_to_string("../../../fixtures/json/quiz_response.json")
            .expect("read fixture");
        let draft = parse_draft(&raw).unwrap();
        assert_eq!(draft.questions.len(), 6);
        assert_eq!(draft.questions[0].difficulty, Difficulty::Easy);
    }

    #[test]
    fn strips_fences_and_prose() {
        let body = valid_response(5).to_string();
        let fenced = format!("Here is your quiz:\n```json\n{body}\n```\nEnjoy!");
        assert_eq!(parse_draft(&fenced).unwrap().questions.len(), 5);

        let prose = format!("Sure! {body} Let me know if you need more.");
        assert_eq!(parse_draft(&prose).unwrap().questions.len(), 5);
    }

    #[test]
    fn first_parsable_fence_wins() {
        let body = valid_response(6).to_string();
        let two_fences = format!(
            "```json\n{body}\n```\nMetadata:\n```json\n{{\"note\": 1}}\n```"
        );
        assert_eq!(parse_draft(&two_fences).unwrap().questions.len(), 6);

        let note_first = format!("```json\n{{\"note\": 1}}\n```\n```json\n{body}\n```");
        assert_eq!(parse_draft(&note_first).unwrap().questions.len(), 6);
    }

    #[test]
    fn reply_without_json_is_schema_error() {
        let err = parse_draft("Sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, QuizsmithError::Schema { .. }));
        assert!(err.to_string().contains("no JSON object"));
    }

    #[test]
    fn rejects_missing_questions_field() {
        let mut response = valid_response(5);
        response.as_object_mut().unwrap().remove("questions");

        let err = parse_draft(&response.to_string()).unwrap_err();
        assert!(matches!(err, QuizsmithError::Schema { .. }));
        assert!(err.to_string().contains("questions"));
    }

    #[test]
    fn rejects_answer_not_in_options() {
        let mut response = valid_response(5);
        response["questions"][2]["answer"] = json!("Something else");

        let err = parse_draft(&response.to_string()).unwrap_err();
        assert!(matches!(err, QuizsmithError::Schema { .. }));
        assert!(err.to_string().contains("questions[2]"));
    }

    #[test]
    fn repairs_answer_case_and_whitespace() {
        let mut response = valid_response(5);
        response["questions"][0]["answer"] = json!("  right 0 ");
        response["questions"][1]["difficulty"] = json!("Medium");

        let draft = parse_draft(&response.to_string()).unwrap();
        assert_eq!(draft.questions[0].answer, "Right 0");
        assert_eq!(draft.questions[1].difficulty, Difficulty::Medium);
    }

    #[test]
    fn rejects_ambiguous_case_insensitive_answer() {
        let mut response = valid_response(5);
        response["questions"][0]["options"] = json!(["Paris", "PARIS", "Rome", "Oslo"]);
        response["questions"][0]["answer"] = json!("paris");

        assert!(parse_draft(&response.to_string()).is_err());
    }

    #[test]
    fn rejects_question_count_out_of_range() {
        let err = parse_draft(&valid_response(4).to_string()).unwrap_err();
        assert!(err.to_string().contains("got 4"));

        let err = parse_draft(&valid_response(11).to_string()).unwrap_err();
        assert!(err.to_string().contains("got 11"));
    }

    #[test]
    fn rejects_wrong_option_count() {
        let mut response = valid_response(5);
        response["questions"][3]["options"] = json!(["Right 3", "Wrong A", "Wrong B"]);

        let err = parse_draft(&response.to_string()).unwrap_err();
        assert!(err.to_string().contains("questions[3]: expected 4 options, got 3"));
    }

    #[test]
    fn rejects_duplicate_options() {
        let mut response = valid_response(5);
        response["questions"][1]["options"] = json!(["Right 1", "Wrong A", "Wrong A ", "Wrong C"]);

        let err = parse_draft(&response.to_string()).unwrap_err();
        assert!(err.to_string().contains("not distinct"));
    }

    #[test]
    fn rejects_unknown_difficulty() {
        let mut response = valid_response(5);
        response["questions"][4]["difficulty"] = json!("impossible");

        let err = parse_draft(&response.to_string()).unwrap_err();
        assert!(err.to_string().contains("questions[4]"));
    }

    #[test]
    fn rejects_empty_summary_and_topics() {
        let mut response = valid_response(5);
        response["summary"] = json!("   ");
        assert!(parse_draft(&response.to_string()).unwrap_err().to_string().contains("summary"));

        let mut response = valid_response(5);
        response["related_topics"] = json!(["", "  "]);
        assert!(
            parse_draft(&response.to_string())
                .unwrap_err()
                .to_string()
                .contains("related_topics")
        );

        let mut response = valid_response(5);
        response["related_topics"] = json!(["x".repeat(MAX_TOPIC_CHARS + 1)]);
        assert!(parse_draft(&response.to_string()).is_err());
    }

    #[test]
    fn rejects_missing_entity_category() {
        let mut response = valid_response(5);
        response["key_entities"].as_object_mut().unwrap().remove("locations");

        let err = parse_draft(&response.to_string()).unwrap_err();
        assert!(err.to_string().contains("locations"));
    }

    #[test]
    fn rejects_non_json() {
        let err = parse_draft("I cannot help with that.").unwrap_err();
        assert!(matches!(err, QuizsmithError::Schema { .. }));

        let err = parse_draft("{ not json at all }").unwrap_err();
        assert!(matches!(err, QuizsmithError::Schema { .. }));
    }
}
