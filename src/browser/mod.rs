//! Browser-emulation client.
//!
//! [`WebClient`] fetches and parses pages, follows links and submits forms
//! over plain HTTP. There is no script execution or rendering: a click on
//! a link is a `GET` of its resolved `href`, a click on a submit control is
//! a form submission, and a click on any other input or button leaves the
//! page as it is.

use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::BrowserConfig;

pub mod form;
pub mod page;
pub mod xpath;

pub use form::{FieldKind, Form, FormField, FormMethod, Submitter, SubmitterKind};
pub use page::Page;
pub use xpath::{XPath, XPathError, XPathNode, XPathValue};

/// Browser-emulation failure.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// The request failed at the transport level.
    #[error("request to {url} failed: {source}")]
    Request {
        /// Requested URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a 4xx/5xx status.
    #[error("{status} for {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Final URL after redirects.
        url: String,
    },
    /// No anchor with the given text.
    #[error("couldn't find a link with text '{text}' on page {page}")]
    LinkNotFound {
        /// Link text searched for.
        text: String,
        /// URL of the page searched.
        page: String,
    },
    /// Following a link failed.
    #[error("clicking on link '{text}' on page {page} failed because of: {source}")]
    Click {
        /// Link text.
        text: String,
        /// URL of the page the link is on.
        page: String,
        /// What went wrong.
        #[source]
        source: Box<BrowserError>,
    },
    /// No submit input with the given value and no button with the given name.
    #[error("couldn't find a button with text/name '{value}' on form '{form}'")]
    ButtonNotFound {
        /// Value or name searched for.
        value: String,
        /// Name of the form searched.
        form: String,
    },
    /// No input or button with the given id in a form.
    #[error("couldn't find a button with id '{id}' on form '{form}'")]
    ControlNotFound {
        /// Id searched for.
        id: String,
        /// Name of the form searched.
        form: String,
    },
    /// No element with the given id.
    #[error("couldn't find an element with id '{id}' on page {page}")]
    ElementNotFound {
        /// Id searched for.
        id: String,
        /// URL of the page searched.
        page: String,
    },
    /// The element exists but clicking it does nothing this client can emulate.
    #[error("element '{id}' (<{tag}>) is not a link, input or button")]
    NotClickable {
        /// Element id.
        id: String,
        /// Element tag name.
        tag: String,
    },
    /// A submit control outside any form.
    #[error("button '{id}' is not inside a form")]
    NoOwningForm {
        /// Element id.
        id: String,
    },
    /// No settable field with the given name.
    #[error("couldn't find a field named '{name}' on form '{form}'")]
    FieldNotFound {
        /// Field name searched for.
        name: String,
        /// Name of the form searched.
        form: String,
    },
    /// A URL or href could not be parsed or resolved.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// Parse error.
        #[source]
        source: url::ParseError,
    },
    /// An XPath expression failed to parse.
    #[error("invalid XPath: {0}")]
    XPath(#[from] XPathError),
}

/// Collapse runs of whitespace to single spaces and trim the ends.
pub(crate) fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Blocking HTTP client that navigates like a browser without scripting.
///
/// Cookies persist across requests made through the same client. Idle
/// connections are not pooled, so every request opens a fresh connection
/// and a paused server is observed immediately.
///
/// Must not be created or used from inside an async runtime.
#[derive(Debug, Clone)]
pub struct WebClient {
    inner: Client,
    fail_on_error_status: bool,
}

impl WebClient {
    /// Client with default [`BrowserConfig`] settings.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Client`] if the TLS backend fails to initialise.
    pub fn new() -> Result<Self, BrowserError> {
        Self::with_options(&BrowserConfig::default())
    }

    /// Client configured from `[browser]`.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Client`] if the TLS backend fails to initialise.
    pub fn with_options(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let inner = Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .pool_max_idle_per_host(0)
            .build()
            .map_err(BrowserError::Client)?;
        Ok(Self {
            inner,
            fail_on_error_status: config.fail_on_error_status,
        })
    }

    /// Fetch and parse the page at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::InvalidUrl`], [`BrowserError::Request`], or
    /// [`BrowserError::Status`] for 4xx/5xx when configured to fail on them.
    pub fn get_page(&self, url: &str) -> Result<Page, BrowserError> {
        let url = Url::parse(url).map_err(|source| BrowserError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        self.fetch(url)
    }

    /// Fetch and parse the page at an already parsed `url`.
    ///
    /// # Errors
    ///
    /// See [`WebClient::get_page`].
    pub fn fetch(&self, url: Url) -> Result<Page, BrowserError> {
        let response = self
            .inner
            .get(url.clone())
            .send()
            .map_err(|source| BrowserError::Request {
                url: url.to_string(),
                source,
            })?;
        self.read_page(response)
    }

    /// Click the first link whose normalised text equals `text`.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::LinkNotFound`] if there is no such link and
    /// [`BrowserError::Click`] if following it fails.
    pub fn click_link(&self, page: &Page, text: &str) -> Result<Page, BrowserError> {
        let anchor = page
            .anchor_by_text(text)
            .ok_or_else(|| BrowserError::LinkNotFound {
                text: text.to_string(),
                page: page.to_string(),
            })?;
        let href = anchor.value().attr("href").map(str::to_string);

        self.follow(page, href.as_deref())
            .map_err(|source| BrowserError::Click {
                text: text.to_string(),
                page: page.to_string(),
                source: Box::new(source),
            })
    }

    /// Click the element with the given `id`.
    ///
    /// Anchors are followed; submit inputs and buttons submit their form as
    /// it appears on `page`; other inputs and buttons return `page`.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::ElementNotFound`] if no element has the id,
    /// [`BrowserError::NotClickable`] for other elements, or the error of the
    /// resulting navigation.
    pub fn click_button(&self, page: &Page, id: &str) -> Result<Page, BrowserError> {
        let element = page
            .element_by_id(id)
            .ok_or_else(|| BrowserError::ElementNotFound {
                id: id.to_string(),
                page: page.to_string(),
            })?;

        let tag = element.value().name();
        if tag == "a" {
            return self.follow(page, element.value().attr("href"));
        }

        let control =
            Submitter::from_element(element).ok_or_else(|| BrowserError::NotClickable {
                id: id.to_string(),
                tag: tag.to_string(),
            })?;
        if !control.kind.submits() {
            return Ok(page.clone());
        }
        let form = page
            .owning_form(element)
            .ok_or_else(|| BrowserError::NoOwningForm { id: id.to_string() })?;
        self.submit(&form, Some(&control))
    }

    /// Click a control of `form`: first an `<input>` whose value is
    /// `value`, then a `<button>` whose name is `value`.
    ///
    /// The form is submitted with its current, possibly edited, values. A
    /// control that does not submit returns the form's page.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::ButtonNotFound`] if neither lookup matches, or
    /// the error of the submission.
    pub fn click_form_button(&self, form: &Form, value: &str) -> Result<Page, BrowserError> {
        let control = form
            .input_by_value(value)
            .or_else(|| form.button_by_name(value))
            .ok_or_else(|| BrowserError::ButtonNotFound {
                value: value.to_string(),
                form: form.name().to_string(),
            })?;
        self.click_control(form, control)
    }

    /// Click the control of `form` whose id is `id`.
    ///
    /// Like [`WebClient::click_form_button`], the form is submitted with its
    /// current values, so fields set on `form` are sent.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::ControlNotFound`] if the form has no such
    /// control, or the error of the submission.
    pub fn click_form_button_by_id(&self, form: &Form, id: &str) -> Result<Page, BrowserError> {
        let control = form
            .submitter_by_id(id)
            .ok_or_else(|| BrowserError::ControlNotFound {
                id: id.to_string(),
                form: form.name().to_string(),
            })?;
        self.click_control(form, control)
    }

    fn click_control(&self, form: &Form, control: &Submitter) -> Result<Page, BrowserError> {
        if !control.kind.submits() {
            debug!(kind = ?control.kind, "control does not submit");
            return Ok(form.page().clone());
        }
        self.submit(form, Some(control))
    }

    /// Submit `form`, as if `submitter` was clicked.
    ///
    /// # Errors
    ///
    /// Returns the error of the resulting request.
    pub fn submit(&self, form: &Form, submitter: Option<&Submitter>) -> Result<Page, BrowserError> {
        let pairs = form.data_set(submitter);
        let mut url = form.action().clone();
        url.set_fragment(None);
        debug!(%url, method = ?form.method(), fields = pairs.len(), "submitting form");

        let request = match form.method() {
            FormMethod::Get => {
                if pairs.is_empty() {
                    url.set_query(None);
                } else {
                    url.query_pairs_mut().clear().extend_pairs(&pairs);
                }
                self.inner.get(url.clone())
            }
            FormMethod::Post => self.inner.post(url.clone()).form(&pairs),
        };

        let response = request.send().map_err(|source| BrowserError::Request {
            url: url.to_string(),
            source,
        })?;
        self.read_page(response)
    }

    fn follow(&self, page: &Page, href: Option<&str>) -> Result<Page, BrowserError> {
        let Some(href) = href.map(str::trim) else {
            return Ok(page.clone());
        };
        if href.starts_with('#') || href.starts_with("javascript:") {
            return Ok(page.clone());
        }
        self.fetch(page.resolve(href)?)
    }

    fn read_page(&self, response: Response) -> Result<Page, BrowserError> {
        let url = response.url().clone();
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let source = response.text().map_err(|source| BrowserError::Request {
            url: url.to_string(),
            source,
        })?;
        debug!(%url, status = status.as_u16(), "fetched page");

        if self.fail_on_error_status && (status.is_client_error() || status.is_server_error()) {
            return Err(BrowserError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(Page::parse(url, status.as_u16(), content_type, &source))
    }
}
