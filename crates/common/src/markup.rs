//! Rendered markup and structural queries over it
//!
//! [`Markup`] is what every component render produces. Pages embed it
//! directly; tests query it with a small CSS-like selector language:
//!
//! - `div`, `a`, `*`: element kind
//! - `.sample-button`: class
//! - `#main`: id
//! - `[href]`, `[href="#"]`: attribute presence / value
//! - `div.sample-button a`: descendant chains of the above
//!
//! The scanner is deliberately forgiving: it tracks open/close tags, treats
//! HTML void elements as self-closing and ignores comments, doctypes and the
//! raw text of `<script>`/`<style>` elements.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<(/)?([a-zA-Z][a-zA-Z0-9-]*)((?:[^>"']|"[^"]*"|'[^']*')*?)(/)?>"#)
        .expect("tag pattern is valid")
});

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s"'=/>]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("attribute pattern is valid")
});

static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?(?:-->|$)").expect("comment pattern is valid"));

static RAW_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:script|style)\b[^>]*>(.*?)</(?:script|style)\s*>")
        .expect("raw text pattern is valid")
});

static STRIP_TAGS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("strip pattern is valid"));

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Rendered HTML
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Markup(String);

impl Markup {
    /// Wrap already-safe HTML
    pub fn from_trusted(html: impl Into<String>) -> Self {
        Self(html.into())
    }

    /// Escape plain text into markup
    pub fn text(text: &str) -> Self {
        Self(escape_html(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every element in document order
    pub fn elements(&self) -> Vec<Element> {
        scan(&self.0)
    }

    /// Elements with no enclosing element
    pub fn top_level(&self) -> Vec<Element> {
        self.elements().into_iter().filter(|e| e.depth == 0).collect()
    }

    /// Elements matching `selector`
    pub fn select(&self, selector: &str) -> Result<Vec<Element>, AssertionFailure> {
        let selector = Selector::parse(selector)?;
        let elements = self.elements();
        Ok((0..elements.len())
            .filter(|&idx| selector.matches(&elements, idx))
            .map(|idx| elements[idx].clone())
            .collect())
    }

    pub fn count(&self, selector: &str) -> Result<usize, AssertionFailure> {
        Ok(self.select(selector)?.len())
    }

    /// True when at least one element matches; invalid selectors match nothing
    pub fn contains(&self, selector: &str) -> bool {
        self.count(selector).map(|n| n > 0).unwrap_or(false)
    }

    /// Concatenate several fragments
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a Markup>) -> Markup {
        Markup(parts.into_iter().map(Markup::as_str).collect())
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Markup> for String {
    fn from(markup: Markup) -> Self {
        markup.0
    }
}

/// A scanned element
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    /// Number of enclosing elements
    pub depth: usize,
    parent: Option<usize>,
    pub inner_html: String,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Text content with tags stripped and entities decoded
    pub fn text(&self) -> String {
        let visible = COMMENT_RE.replace_all(&self.inner_html, "");
        unescape_html(STRIP_TAGS_RE.replace_all(&visible, "").trim())
    }
}

/// An unmet structural predicate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssertionFailure {
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("expected markup to contain `{selector}`, found none")]
    NoMatch { selector: String },

    #[error("expected {expected} match(es) for `{selector}`, found {actual}")]
    CountMismatch {
        selector: String,
        expected: usize,
        actual: usize,
    },

    #[error("expected text {expected:?} for `{selector}`, found {actual:?}")]
    TextMismatch {
        selector: String,
        expected: String,
        actual: String,
    },
}

/// Assert that at least one element matches `selector`
pub fn expect_css(markup: &Markup, selector: &str) -> Result<(), AssertionFailure> {
    if markup.count(selector)? == 0 {
        return Err(AssertionFailure::NoMatch {
            selector: selector.to_string(),
        });
    }
    Ok(())
}

/// Assert that exactly `expected` elements match `selector`
pub fn expect_css_count(
    markup: &Markup,
    selector: &str,
    expected: usize,
) -> Result<(), AssertionFailure> {
    let actual = markup.count(selector)?;
    if actual != expected {
        return Err(AssertionFailure::CountMismatch {
            selector: selector.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Assert that the first element matching `selector` has the given text
pub fn expect_text(markup: &Markup, selector: &str, expected: &str) -> Result<(), AssertionFailure> {
    let found = markup.select(selector)?;
    let first = found.first().ok_or_else(|| AssertionFailure::NoMatch {
        selector: selector.to_string(),
    })?;
    let actual = first.text();
    if actual != expected {
        return Err(AssertionFailure::TextMismatch {
            selector: selector.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Escape text for use in element content and quoted attribute values
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape_html(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Replace comments and script/style contents with spaces of equal byte
/// length so tag offsets still index into the original text
fn blank_hidden(html: &str) -> String {
    let mut ranges: Vec<(usize, usize)> = COMMENT_RE
        .find_iter(html)
        .map(|m| (m.start(), m.end()))
        .collect();
    ranges.extend(
        RAW_TEXT_RE
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .map(|m| (m.start(), m.end())),
    );

    let mut bytes = html.as_bytes().to_vec();
    for (start, end) in ranges {
        bytes[start..end].fill(b' ');
    }
    // Whole UTF-8 sequences are replaced, so the result stays valid.
    String::from_utf8(bytes).unwrap_or_default()
}

fn scan(html: &str) -> Vec<Element> {
    struct Open {
        tag: String,
        attributes: Vec<(String, String)>,
        depth: usize,
        parent: Option<usize>,
        start: usize,
        end: Option<usize>,
    }

    let mut open: Vec<Open> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    let visible = blank_hidden(html);

    for caps in TAG_RE.captures_iter(&visible) {
        let Some(whole) = caps.get(0) else { continue };
        let tag = caps
            .get(2)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();

        if caps.get(1).is_some() {
            if let Some(pos) = stack.iter().rposition(|&i| open[i].tag == tag) {
                for &idx in &stack[pos..] {
                    open[idx].end = Some(whole.start());
                }
                stack.truncate(pos);
            }
            continue;
        }

        let self_closing = caps.get(4).is_some() || VOID_ELEMENTS.contains(&tag.as_str());
        let attributes = parse_attributes(caps.get(3).map_or("", |m| m.as_str()));
        let idx = open.len();
        open.push(Open {
            tag,
            attributes,
            depth: stack.len(),
            parent: stack.last().copied(),
            start: whole.end(),
            end: self_closing.then_some(whole.end()),
        });
        if !self_closing {
            stack.push(idx);
        }
    }

    open.into_iter()
        .map(|o| {
            let end = o.end.unwrap_or(html.len());
            Element {
                tag: o.tag,
                attributes: o.attributes,
                depth: o.depth,
                parent: o.parent,
                inner_html: html.get(o.start..end).unwrap_or_default().to_string(),
            }
        })
        .collect()
}

fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| unescape_html(m.as_str()))
                .unwrap_or_default();
            Some((name, value))
        })
        .collect()
}

#[derive(Debug, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn parse(input: &str) -> Option<Self> {
        let mut compound = Compound::default();
        let is_delim = |ch: char| ch == '.' || ch == '#' || ch == '[';

        let end = input.find(is_delim).unwrap_or(input.len());
        let tag = &input[..end];
        if !tag.is_empty() && tag != "*" {
            if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return None;
            }
            compound.tag = Some(tag.to_ascii_lowercase());
        }

        let mut rest = &input[end..];
        while let Some(first) = rest.chars().next() {
            match first {
                '.' | '#' => {
                    let body = &rest[1..];
                    let end = body.find(is_delim).unwrap_or(body.len());
                    let name = &body[..end];
                    if name.is_empty() {
                        return None;
                    }
                    if first == '.' {
                        compound.classes.push(name.to_string());
                    } else {
                        compound.id = Some(name.to_string());
                    }
                    rest = &body[end..];
                }
                '[' => {
                    let close = rest.find(']')?;
                    let inner = &rest[1..close];
                    let attr = match inner.split_once('=') {
                        Some((name, value)) => (
                            name.trim().to_ascii_lowercase(),
                            Some(value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()),
                        ),
                        None => (inner.trim().to_ascii_lowercase(), None),
                    };
                    if attr.0.is_empty() {
                        return None;
                    }
                    compound.attrs.push(attr);
                    rest = &rest[close + 1..];
                }
                _ => return None,
            }
        }

        if input.is_empty() {
            None
        } else {
            Some(compound)
        }
    }

    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if &element.tag != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| element.has_class(c)) {
            return false;
        }
        self.attrs.iter().all(|(name, value)| match value {
            Some(value) => element.attr(name) == Some(value.as_str()),
            None => element.attr(name).is_some(),
        })
    }
}

/// Descendant chain of compound selectors
#[derive(Debug)]
struct Selector {
    parts: Vec<Compound>,
}

impl Selector {
    fn parse(input: &str) -> Result<Self, AssertionFailure> {
        let parts = input
            .split_whitespace()
            .map(Compound::parse)
            .collect::<Option<Vec<_>>>()
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| AssertionFailure::InvalidSelector(input.to_string()))?;
        Ok(Self { parts })
    }

    fn matches(&self, elements: &[Element], idx: usize) -> bool {
        let Some((last, ancestors)) = self.parts.split_last() else {
            return false;
        };
        if !last.matches(&elements[idx]) {
            return false;
        }

        let mut cursor = elements[idx].parent;
        for compound in ancestors.iter().rev() {
            loop {
                match cursor {
                    None => return false,
                    Some(p) => {
                        cursor = elements[p].parent;
                        if compound.matches(&elements[p]) {
                            break;
                        }
                    }
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Markup {
        Markup::from_trusted(
            r##"<!doctype html>
<div class="card primary" id="main">
  <a href="#" class="link">Click &amp; go</a>
  <br>
  <img src="x.png"/>
  <!-- note -->
</div>
<section><a href="/other">Other</a></section>"##,
        )
    }

    #[test]
    fn test_select_by_tag_class_and_id() {
        let markup = page();
        assert_eq!(markup.count("div").unwrap(), 1);
        assert_eq!(markup.count(".card").unwrap(), 1);
        assert_eq!(markup.count("div.card.primary").unwrap(), 1);
        assert_eq!(markup.count("#main").unwrap(), 1);
        assert_eq!(markup.count("a").unwrap(), 2);
        assert_eq!(markup.count("span").unwrap(), 0);
    }

    #[test]
    fn test_descendant_selector() {
        let markup = page();
        assert_eq!(markup.count("div a").unwrap(), 1);
        assert_eq!(markup.count("section a").unwrap(), 1);
        assert_eq!(markup.count("div.card a[href=\"#\"]").unwrap(), 1);
        assert_eq!(markup.count("section a[href=\"#\"]").unwrap(), 0);
    }

    #[test]
    fn test_top_level_and_void_elements() {
        let markup = page();
        let top: Vec<_> = markup.top_level().into_iter().map(|e| e.tag).collect();
        assert_eq!(top, vec!["div", "section"]);
        let img = &markup.select("img").unwrap()[0];
        assert_eq!(img.depth, 1);
        assert_eq!(img.attr("src"), Some("x.png"));
    }

    #[test]
    fn test_text_is_decoded() {
        let markup = page();
        assert!(expect_text(&markup, "div a", "Click & go").is_ok());
    }

    #[test]
    fn test_expectations_report_failures() {
        let markup = page();
        assert!(expect_css(&markup, "div").is_ok());
        assert_eq!(
            expect_css(&markup, "table"),
            Err(AssertionFailure::NoMatch {
                selector: "table".to_string()
            })
        );
        assert_eq!(
            expect_css_count(&markup, "a", 3),
            Err(AssertionFailure::CountMismatch {
                selector: "a".to_string(),
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_invalid_selector() {
        let markup = page();
        assert!(matches!(
            markup.select("div..x"),
            Err(AssertionFailure::InvalidSelector(_))
        ));
        assert!(matches!(
            markup.select("   "),
            Err(AssertionFailure::InvalidSelector(_))
        ));
        assert!(!markup.contains("a>b"));
    }

    #[test]
    fn test_commented_out_markup_is_ignored() {
        let markup = Markup::from_trusted(
            "<!-- <div class=\"ghost\"></div> --><p>x<!-- <b>y</b> --></p>",
        );
        assert_eq!(markup.count("div").unwrap(), 0);
        assert_eq!(markup.count("b").unwrap(), 0);
        assert!(expect_css(&markup, "div.ghost").is_err());
        let top: Vec<_> = markup.top_level().into_iter().map(|e| e.tag).collect();
        assert_eq!(top, vec!["p"]);
        assert_eq!(markup.select("p").unwrap()[0].text(), "x");
    }

    #[test]
    fn test_script_and_style_contents_are_not_elements() {
        let markup = Markup::from_trusted(
            "<style>.a > div { color: red }</style><script>if (a < b) { document.write('<div></div>') }</script><div></div>",
        );
        assert_eq!(markup.count("div").unwrap(), 1);
        assert_eq!(markup.count("script").unwrap(), 1);
        assert_eq!(markup.count("style").unwrap(), 1);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(Markup::text("a<b").as_str(), "a&lt;b");
    }

    #[test]
    fn test_concat() {
        let parts = [Markup::from_trusted("<p>1</p>"), Markup::from_trusted("<p>2</p>")];
        let joined = Markup::concat(&parts);
        assert_eq!(joined.as_str(), "<p>1</p><p>2</p>");
        assert_eq!(joined.top_level().len(), 2);
    }
}
