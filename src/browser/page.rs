//! A fetched and parsed page.

use std::fmt;
use std::rc::Rc;

use scraper::{ElementRef, Html};
use url::Url;

use super::form::Form;
use super::xpath::{XPath, XPathError, XPathNode, XPathValue};
use super::{normalize_space, BrowserError};

/// Elements whose text never shows up on screen.
const HIDDEN_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements whose boundaries separate words in the rendered text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "caption", "dd", "details",
    "dialog", "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "legend", "li", "main", "nav", "ol", "option",
    "p", "pre", "section", "summary", "table", "tbody", "td", "tfoot", "th", "thead", "title",
    "tr", "ul",
];

/// A document returned by the [`WebClient`](super::WebClient).
///
/// Cloning is cheap: clones share the parsed document. Not `Send`: the
/// parsed DOM uses non-atomic string buffers.
#[derive(Clone)]
pub struct Page {
    inner: Rc<PageData>,
}

struct PageData {
    url: Url,
    status: u16,
    content_type: Option<String>,
    source: String,
    document: Html,
}

impl Page {
    /// Parse `source` as the page found at `url`.
    pub fn parse(url: Url, status: u16, content_type: Option<String>, source: &str) -> Self {
        Self {
            inner: Rc::new(PageData {
                url,
                status,
                content_type,
                source: source.to_string(),
                document: Html::parse_document(source),
            }),
        }
    }

    /// Final URL of the page, after redirects.
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.inner.status
    }

    /// `Content-Type` header, if the server sent one.
    pub fn content_type(&self) -> Option<&str> {
        self.inner.content_type.as_deref()
    }

    /// Raw response body.
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// Parsed DOM.
    pub fn document(&self) -> &Html {
        &self.inner.document
    }

    /// Normalised `<title>` text.
    pub fn title(&self) -> Option<String> {
        self.elements()
            .find(|el| el.value().name() == "title")
            .map(|el| normalize_space(&el.text().collect::<String>()))
    }

    /// Visible text with whitespace normalised.
    ///
    /// Block-level boundaries (paragraphs, list items, table cells, `<br>`)
    /// separate words; inline markup does not.
    pub fn text(&self) -> String {
        let mut raw = String::new();
        collect_text(self.document().root_element(), &mut raw);
        normalize_space(&raw)
    }

    /// Whether the visible text contains `needle` (whitespace-normalised).
    pub fn contains_text(&self, needle: &str) -> bool {
        self.text().contains(&normalize_space(needle))
    }

    /// Nodes selected by the XPath expression `expr`.
    ///
    /// # Errors
    ///
    /// Returns the parse error, or [`XPathError::NotANodeSet`] if `expr`
    /// evaluates to a number, string or boolean.
    pub fn xpath(&self, expr: &str) -> Result<Vec<XPathNode<'_>>, XPathError> {
        XPath::parse(expr)?.select(self.document())
    }

    /// Value of the XPath expression `expr`, of whatever type it produces.
    ///
    /// # Errors
    ///
    /// Returns the parse or evaluation error.
    pub fn evaluate_xpath(&self, expr: &str) -> Result<XPathValue<'_>, XPathError> {
        XPath::parse(expr)?.evaluate(self.document())
    }

    /// First `<a>` whose normalised text equals `text`.
    pub fn anchor_by_text(&self, text: &str) -> Option<ElementRef<'_>> {
        let wanted = normalize_space(text);
        self.elements().find(|el| {
            el.value().name() == "a" && normalize_space(&el.text().collect::<String>()) == wanted
        })
    }

    /// Element whose `id` attribute equals `id`.
    pub fn element_by_id(&self, id: &str) -> Option<ElementRef<'_>> {
        self.elements().find(|el| el.value().id() == Some(id))
    }

    /// Every form on the page, in document order.
    pub fn forms(&self) -> Vec<Form> {
        self.elements()
            .filter(|el| el.value().name() == "form")
            .map(|el| Form::from_element(el, self))
            .collect()
    }

    /// Form whose `name` (or, failing that, `id`) equals `name`.
    pub fn form_by_name(&self, name: &str) -> Option<Form> {
        self.elements()
            .filter(|el| el.value().name() == "form")
            .find(|el| el.value().attr("name") == Some(name))
            .or_else(|| {
                self.elements()
                    .find(|el| el.value().name() == "form" && el.value().id() == Some(name))
            })
            .map(|el| Form::from_element(el, self))
    }

    /// Form enclosing `element`, if any.
    pub fn owning_form(&self, element: ElementRef<'_>) -> Option<Form> {
        element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "form")
            .map(|el| Form::from_element(el, self))
    }

    /// Resolve `href` against the page URL.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::InvalidUrl`] if `href` cannot be resolved.
    pub fn resolve(&self, href: &str) -> Result<Url, BrowserError> {
        self.url()
            .join(href)
            .map_err(|source| BrowserError::InvalidUrl {
                url: href.to_string(),
                source,
            })
    }

    fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.document()
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
    }
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            let name = el.value().name();
            if HIDDEN_TEXT_ELEMENTS.contains(&name) {
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push(' ');
            }
            collect_text(el, out);
            if block {
                out.push(' ');
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("url", &self.url().as_str())
            .field("status", &self.status())
            .field("content_type", &self.content_type())
            .finish_non_exhaustive()
    }
}
