use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use ammonia::url::{self, Url};
use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer,
};

/// Tags that survive sanitizing.
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "code", "dd", "del", "details", "div", "dl", "dt",
    "em", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "input", "kbd", "li", "mark",
    "ol", "p", "pre", "s", "small", "span", "strong", "sub", "summary", "sup", "table",
    "tbody", "td", "tfoot", "th", "thead", "tr", "u", "ul",
];

const GENERIC_ATTRIBUTES: &[&str] = &["title", "lang"];

const TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href"]),
    ("img", &["src", "alt", "width", "height"]),
    ("code", &["class"]),
    ("span", &["class"]),
    ("ol", &["start"]),
    ("td", &["align", "style"]),
    ("th", &["align", "style"]),
    ("input", &["type", "checked", "disabled"]),
];

const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

const URL_ATTRIBUTES: &[&str] = &["href", "src"];

/// Something the sanitizer strips from the formatted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    Tag { name: String },
    Attribute { tag: String, name: String },
    Url { url: String },
    /// A doctype declaration.
    Markup { text: String },
}

impl std::fmt::Display for Removal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Removal::Tag { name } => write!(f, "tag <{name}>"),
            Removal::Attribute { tag, name } => write!(f, "attribute {name} on <{tag}>"),
            Removal::Url { url } => write!(f, "url {url}"),
            Removal::Markup { text } => write!(f, "markup {text}"),
        }
    }
}

/// `ammonia` cleaner plus an inspector that reports what the cleaner would
/// strip.
///
/// The inspector runs the same html5ever tokenizer `ammonia` parses with, so
/// tags and attributes are seen exactly as the cleaner sees them: names are
/// case-folded, attributes may span lines, and character references in values
/// are decoded before any check.
pub struct Sanitizer {
    cleaner: ammonia::Builder<'static>,
    tags: HashSet<&'static str>,
    generic_attributes: HashSet<&'static str>,
    tag_attributes: HashMap<&'static str, HashSet<&'static str>>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer {
    pub fn new() -> Self {
        let tags: HashSet<&'static str> = ALLOWED_TAGS.iter().copied().collect();
        let generic_attributes: HashSet<&'static str> = GENERIC_ATTRIBUTES.iter().copied().collect();
        let tag_attributes: HashMap<&'static str, HashSet<&'static str>> = TAG_ATTRIBUTES
            .iter()
            .map(|(tag, attrs)| (*tag, attrs.iter().copied().collect()))
            .collect();

        let mut cleaner = ammonia::Builder::default();
        cleaner
            .tags(tags.clone())
            .generic_attributes(generic_attributes.clone())
            .tag_attributes(tag_attributes.clone())
            .url_schemes(URL_SCHEMES.iter().copied().collect())
            .attribute_filter(|element, attribute, value| {
                if attribute_value_allowed(element, attribute, value) {
                    Some(value.into())
                } else {
                    None
                }
            });

        Self { cleaner, tags, generic_attributes, tag_attributes }
    }

    pub fn clean(&self, html: &str) -> String {
        self.cleaner.clean(html).to_string()
    }

    /// Lists every piece of `html` that [`Sanitizer::clean`] would strip.
    ///
    /// Comments are not listed; they carry nothing that reaches the page.
    pub fn inspect(&self, html: &str) -> Vec<Removal> {
        let input = BufferQueue::default();
        input.push_back(StrTendril::from_slice(html));

        let tokenizer = Tokenizer::new(
            Inspector { sanitizer: self, removed: RefCell::default() },
            Default::default(),
        );
        let _ = tokenizer.feed(&input);
        tokenizer.end();
        tokenizer.sink.removed.take()
    }

    fn attribute_allowed(&self, tag: &str, name: &str) -> bool {
        self.generic_attributes.contains(name)
            || self
                .tag_attributes
                .get(tag)
                .is_some_and(|attrs| attrs.contains(name))
    }

    fn inspect_tag(&self, tag: &Tag, removed: &mut Vec<Removal>) {
        let name: &str = &tag.name;
        if !self.tags.contains(name) {
            removed.push(Removal::Tag { name: name.to_string() });
            return;
        }

        for attr in &tag.attrs {
            let attr_name: &str = &attr.name.local;
            let value: &str = &attr.value;
            if !self.attribute_allowed(name, attr_name)
                || !attribute_value_allowed(name, attr_name, value)
            {
                removed.push(Removal::Attribute {
                    tag: name.to_string(),
                    name: attr_name.to_string(),
                });
            } else if URL_ATTRIBUTES.contains(&attr_name) && !url_allowed(value) {
                removed.push(Removal::Url { url: value.to_string() });
            }
        }
    }
}

/// Token sink collecting removals. End tags are skipped: the cleaner drops a
/// disallowed element together with its start tag.
struct Inspector<'s> {
    sanitizer: &'s Sanitizer,
    removed: RefCell<Vec<Removal>>,
}

impl TokenSink for Inspector<'_> {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) if tag.kind == TagKind::StartTag => {
                self.sanitizer.inspect_tag(&tag, &mut self.removed.borrow_mut());
            }
            Token::DoctypeToken(doctype) => {
                let name = doctype.name.as_deref().unwrap_or_default();
                self.removed
                    .borrow_mut()
                    .push(Removal::Markup { text: format!("<!DOCTYPE {name}>") });
            }
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

/// Value-level rules on top of the attribute allowlist.
fn attribute_value_allowed(element: &str, attribute: &str, value: &str) -> bool {
    match (element, attribute) {
        ("input", "type") => value.eq_ignore_ascii_case("checkbox"),
        // Column alignment as Markdown tables emit it, nothing else.
        ("td" | "th", "style") => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "text-align: left" | "text-align: center" | "text-align: right"
        ),
        _ => true,
    }
}

/// Same decision `ammonia` makes: relative URLs pass, absolute ones need an
/// allowed scheme, anything unparsable goes.
fn url_allowed(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => URL_SCHEMES.contains(&url.scheme()),
        Err(url::ParseError::RelativeUrlWithoutBase) => true,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::markdown;

    fn inspect(text: &str) -> Vec<Removal> {
        Sanitizer::new().inspect(&markdown::to_html(markdown::events(text)))
    }

    #[test]
    fn plain_markdown_is_clean() {
        assert!(inspect("# Title\n\n**bold** [link](https://example.com)\n\n- [x] done").is_empty());
    }

    #[test]
    fn allowed_inline_html_is_clean() {
        assert!(inspect("press <kbd>Ctrl</kbd> then <b title=\"x\">go</b>").is_empty());
    }

    #[test]
    fn aligned_tables_are_clean_and_keep_alignment() {
        let text = "| a | b |\n|:-:|--:|\n| 1 | 2 |";
        assert!(inspect(text).is_empty());

        let sanitizer = Sanitizer::new();
        let html = sanitizer.clean(&markdown::to_html(markdown::events(text)));
        assert!(html.contains("style=\"text-align: center\""));
        assert!(html.contains("style=\"text-align: right\""));
    }

    #[test]
    fn other_cell_styles_are_reported() {
        assert_eq!(
            inspect("<table><tr><td style=\"color: red\">x</td></tr></table>"),
            vec![Removal::Attribute { tag: "td".into(), name: "style".into() }]
        );
    }

    #[test]
    fn script_tags_are_reported_once() {
        assert_eq!(
            inspect("hi <script>alert(1)</script>"),
            vec![Removal::Tag { name: "script".into() }]
        );
    }

    #[test]
    fn event_handlers_and_styles_are_reported() {
        let removed = inspect("<img src=\"x.png\" onerror=alert(1) style='color:red'>");
        assert_eq!(
            removed,
            vec![
                Removal::Attribute { tag: "img".into(), name: "onerror".into() },
                Removal::Attribute { tag: "img".into(), name: "style".into() },
            ]
        );
    }

    #[test]
    fn attributes_on_a_following_line_are_reported() {
        assert_eq!(
            inspect("<div\nonclick=\"alert(1)\">hi</div>"),
            vec![Removal::Attribute { tag: "div".into(), name: "onclick".into() }]
        );
        assert_eq!(
            inspect("<DIV\n  ONCLICK=alert(1)\n>hi</DIV>"),
            vec![Removal::Attribute { tag: "div".into(), name: "onclick".into() }]
        );
    }

    #[test]
    fn encoded_link_schemes_are_reported() {
        assert_eq!(
            inspect("<a href=\"&#106;avascript:alert(1)\">x</a>"),
            vec![Removal::Url { url: "javascript:alert(1)".into() }]
        );
        assert_eq!(inspect("<a href=\"java&Tab;script:alert(1)\">x</a>").len(), 1);
    }

    #[test]
    fn dangerous_link_schemes_are_reported() {
        let removed = inspect("[click](javascript:alert(1))");
        assert!(matches!(
            removed.as_slice(),
            [Removal::Url { url }] if url.starts_with("javascript:")
        ));
        assert_eq!(inspect("<a href=\"java\tscript:alert(1)\">x</a>").len(), 1);
        assert!(inspect("[rel](docs/page.md) [abs](mailto:a@b.c)").is_empty());
    }

    #[test]
    fn non_checkbox_inputs_are_reported() {
        assert_eq!(
            inspect("<input type=\"password\">"),
            vec![Removal::Attribute { tag: "input".into(), name: "type".into() }]
        );
    }

    #[test]
    fn comments_are_not_reported() {
        assert!(inspect("a <!-- note --> b").is_empty());
    }

    #[test]
    fn anything_reported_is_missing_from_the_cleaned_html() {
        let sanitizer = Sanitizer::new();
        let samples = [
            "<div\nonclick=\"alert(1)\">hi</div>",
            "<a href=\"&#106;avascript:alert(1)\">x</a>",
            "<p onclick=\"x()\">hi<script>alert(1)</script></p>",
            "<img src=\"x.png\" onerror=alert(1)>",
        ];
        for text in samples {
            let html = markdown::to_html(markdown::events(text));
            assert!(!sanitizer.inspect(&html).is_empty(), "{text}");
            let cleaned = sanitizer.clean(&html);
            assert!(!cleaned.contains("onclick"));
            assert!(!cleaned.contains("onerror"));
            assert!(!cleaned.contains("javascript"));
            assert!(!cleaned.contains("<script"));
        }
    }

    #[test]
    fn cleaner_strips_what_inspector_reports() {
        let sanitizer = Sanitizer::new();
        let html = sanitizer.clean("<p onclick=\"x()\">hi<script>alert(1)</script></p><a href=\"javascript:x\">l</a>");
        assert!(!html.contains("script"));
        assert!(!html.contains("onclick"));
        assert!(!html.contains("javascript"));
        assert!(html.contains("<p>hi</p>"));
    }
}
