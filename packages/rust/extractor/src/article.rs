//! HTML → [`Article`] normalization for MediaWiki-style pages.
//!
//! Pure transformation of the fetched document text: no network, no storage.

use std::sync::LazyLock;

use quizsmith_shared::{Article, QuizsmithError, Result};
use scraper::{Html, Selector};

/// Title used when the page has no usable heading.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Structural headings that never become quiz sections.
pub const SECTION_DENYLIST: [&str; 5] =
    ["Contents", "See also", "References", "External links", "Notes"];

/// Edit-affordance text left behind in older heading markup.
const EDIT_MARKER: &str = "[edit]";

static STRIP_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("script, style, nav, footer, aside, .mw-editsection")
        .expect("strip selector is valid")
});
static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1#firstHeading").expect("title selector is valid"));
static CONTENT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#mw-content-text").expect("content selector is valid"));
static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#bodyContent").expect("body selector is valid"));
static PARAGRAPH_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("paragraph selector is valid"));
static SECTION_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2").expect("section selector is valid"));

/// Reduce an article page to its title, body text and section names.
///
/// Fails with a parse error when neither `#mw-content-text` nor
/// `#bodyContent` exists. The body is cut to `max_chars` characters; the
/// section list is always computed from the full document.
pub fn parse_article(html: &str, max_chars: usize) -> Result<Article> {
    let mut doc = Html::parse_document(html);
    strip_non_content(&mut doc);

    let title = doc
        .select(&TITLE_SEL)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let container = doc
        .select(&CONTENT_SEL)
        .next()
        .or_else(|| doc.select(&BODY_SEL).next())
        .ok_or_else(|| QuizsmithError::parse("Could not find article content."))?;

    let paragraphs: Vec<String> = container
        .select(&PARAGRAPH_SEL)
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();

    let sections = container
        .select(&SECTION_SEL)
        .map(|h| h.text().collect::<String>().replace(EDIT_MARKER, "").trim().to_string())
        .filter(|name| !name.is_empty() && !SECTION_DENYLIST.contains(&name.as_str()))
        .collect();

    let content = truncate_chars(&paragraphs.join("\n\n"), max_chars).to_string();

    Ok(Article {
        title,
        content,
        sections,
    })
}

/// Detach scripts, styles, page chrome and edit links from the tree.
fn strip_non_content(doc: &mut Html) {
    let ids: Vec<_> = doc.select(&STRIP_SEL).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Hard cut at `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
