//! Prompt construction: article text, quality contract and output schema.

use quizsmith_shared::{Article, MAX_QUESTIONS, MIN_QUESTIONS, OPTIONS_PER_QUESTION};

/// Phrases distractors must never use.
pub const BANNED_PHRASES: [&str; 3] = ["All of the above", "None of the above", "A and B"];

/// JSON shape the model must return. Validated client-side regardless.
pub const OUTPUT_SCHEMA: &str = r#"{
  "summary": "string, at most 3 sentences",
  "key_entities": {
    "people": ["string"],
    "organizations": ["string"],
    "locations": ["string"]
  },
  "questions": [
    {
      "question": "string",
      "options": ["string", "string", "string", "string"],
      "answer": "string, copied exactly from one of options",
      "difficulty": "easy | medium | hard",
      "explanation": "string, one or two sentences"
    }
  ],
  "related_topics": ["string"]
}"#;

/// Build the full generation prompt for one article.
pub fn build_prompt(article: &Article) -> String {
    let banned = BANNED_PHRASES
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are an expert educational content creator and examiner.
Create a high-quality quiz based strictly on the provided text.

---
### INPUT TEXT
Title: "{title}"
Content:
{content}
---

### TASKS

1. SUMMARY
- A concise summary of the article, at most 3 sentences.

2. KEY ENTITIES
- Up to 5 names each for people, organizations and locations mentioned in the text.
- If none are found, return an empty list. Do not invent names.

3. QUIZ QUESTIONS
Generate {min} to {max} multiple-choice questions, each with exactly {options} options.
- Every question must be answerable using only the provided text.
- The correct answer must be indisputable based on the text.
- The {wrong} wrong options must be plausible, grammatically consistent with the
  question, and clearly incorrect according to the text.
- All options of a question must be different from each other.
- Banned options: {banned}.
- Mix difficulties: easy (direct fact retrieval), medium (combining two facts or
  understanding a concept), hard (inference or distinguishing similar concepts).
- "answer" must be copied character for character from one of the options.

4. RELATED TOPICS
- Suggest 3 to 5 specific encyclopedia topics for further reading, each a short title.

### OUTPUT FORMAT
Respond with exactly one JSON object and nothing else, matching this schema:
{schema}
"#,
        title = article.title,
        content = article.content,
        min = MIN_QUESTIONS,
        max = MAX_QUESTIONS,
        options = OPTIONS_PER_QUESTION,
        wrong = OPTIONS_PER_QUESTION - 1,
        banned = banned,
        schema = OUTPUT_SCHEMA,
    )
}
