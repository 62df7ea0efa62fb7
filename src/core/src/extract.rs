use std::sync::OnceLock;

use regex::Regex;

static RE_COMMENTS: OnceLock<Regex> = OnceLock::new();
static RE_NOISE: OnceLock<Regex> = OnceLock::new();
static RE_BLOCKS: OnceLock<Regex> = OnceLock::new();
static RE_TAGS: OnceLock<Regex> = OnceLock::new();
static RE_MULTI_NL: OnceLock<Regex> = OnceLock::new();
static RE_TITLE: OnceLock<Regex> = OnceLock::new();

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static extraction pattern"))
}

fn re_comments() -> &'static Regex {
    regex(&RE_COMMENTS, r"(?is)<!--.*?-->")
}

fn re_noise() -> &'static Regex {
    regex(
        &RE_NOISE,
        concat!(
            r"(?is)<(?:script|style|noscript|svg|iframe|nav|header|footer|aside)\b[^>]*>",
            r".*?",
            r"</(?:script|style|noscript|svg|iframe|nav|header|footer|aside)\s*>",
        ),
    )
}

fn re_blocks() -> &'static Regex {
    regex(
        &RE_BLOCKS,
        concat!(
            r"(?is)</?(?:p|div|section|article|main|h[1-6]|li|ul|ol|blockquote|pre|tr|table|hr|br)",
            r"\b[^>]*>",
        ),
    )
}

fn re_tags() -> &'static Regex {
    regex(&RE_TAGS, r"(?is)<[^>]+>")
}

fn re_multi_nl() -> &'static Regex {
    regex(&RE_MULTI_NL, r"\n{3,}")
}

fn re_title() -> &'static Regex {
    regex(&RE_TITLE, r"(?is)<title\b[^>]*>(.*?)</title\s*>")
}

/// Title and body text pulled out of one HTML document. Either may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub title: String,
    pub content: String,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.content.is_empty()
    }
}

/// One stateless way of turning HTML into text. Strategies never fail; a
/// strategy that cannot make sense of the document returns empty fields.
pub trait ExtractStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, html: &str, url: &str) -> Extracted;
}

/// Readability-style main-content detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadabilityStrategy;

impl ExtractStrategy for ReadabilityStrategy {
    fn name(&self) -> &'static str {
        "readability"
    }

    fn extract(&self, html: &str, url: &str) -> Extracted {
        let Ok(readability) = readabilityrs::Readability::new(html, Some(url), None) else {
            return Extracted::default();
        };
        let Some(article) = readability.parse() else {
            return Extracted::default();
        };
        let title = article.title.as_deref().map(clean_line).unwrap_or_default();
        let text = match article.text_content {
            Some(text) if !text.trim().is_empty() => text,
            _ => article
                .content
                .as_deref()
                .and_then(|content| html2text::from_read(content.as_bytes(), 10_000).ok())
                .unwrap_or_default(),
        };
        Extracted {
            title,
            content: tidy_lines(&text),
        }
    }
}

/// Regex fallback: drop non-content elements, turn block boundaries into
/// line breaks, strip the remaining markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupStripStrategy;

impl ExtractStrategy for MarkupStripStrategy {
    fn name(&self) -> &'static str {
        "markup_strip"
    }

    fn extract(&self, html: &str, _url: &str) -> Extracted {
        Extracted {
            title: extract_title(html),
            content: extract_readable_text(html),
        }
    }
}

/// Ordered chain of strategies. Title and content are each taken from the
/// first strategy that produces a non-empty value for them.
pub struct Pipeline {
    strategies: Vec<Box<dyn ExtractStrategy>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(vec![
            Box::new(ReadabilityStrategy),
            Box::new(MarkupStripStrategy),
        ])
    }
}

impl Pipeline {
    pub fn new(strategies: Vec<Box<dyn ExtractStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn extract(&self, html: &str, url: &str) -> Extracted {
        let mut out = Extracted::default();
        for strategy in &self.strategies {
            let got = strategy.extract(html, url);
            if out.title.is_empty() && !got.title.is_empty() {
                out.title = got.title;
            }
            if out.content.is_empty() {
                if got.content.trim().is_empty() {
                    tracing::debug!(strategy = strategy.name(), url, "no content");
                } else {
                    tracing::debug!(
                        strategy = strategy.name(),
                        url,
                        chars = got.content.chars().count(),
                        "content extracted"
                    );
                    out.content = got.content;
                }
            }
            if !out.title.is_empty() && !out.content.is_empty() {
                break;
            }
        }
        out
    }
}

pub fn extract_title(html: &str) -> String {
    re_title()
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| clean_line(&html_escape::decode_html_entities(m.as_str())))
        .unwrap_or_default()
}

pub fn extract_readable_text(html: &str) -> String {
    let text = re_comments().replace_all(html, " ");
    let text = re_noise().replace_all(&text, "\n");
    let text = re_blocks().replace_all(&text, "\n");
    let text = re_tags().replace_all(&text, " ");
    let text = html_escape::decode_html_entities(&text).replace('\r', "");
    tidy_lines(&text)
}

/// Whitespace-normalises every line, drops empty ones and separates the
/// survivors with one blank line.
fn tidy_lines(text: &str) -> String {
    let joined = text
        .lines()
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    re_multi_nl()
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

fn clean_line(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}
