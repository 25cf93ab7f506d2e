//! Process-scoped functional-test fixture.
//!
//! A [`FixtureScope`] lazily starts one [`Container`] (embedded server plus
//! everything a test needs to talk to it) and hands the same instance to
//! every test that asks for it.
//!
//! ```no_run
//! use std::sync::LazyLock;
//!
//! use webrig::config::HarnessConfig;
//! use webrig::fixture::FixtureScope;
//!
//! static SCOPE: LazyLock<FixtureScope> =
//!     LazyLock::new(|| FixtureScope::new(HarnessConfig::default()));
//!
//! fn home_page_loads() {
//!     let container = SCOPE.setup().expect("server starts");
//!     let client = container.web_client().expect("client");
//!     let page = client.get_page(container.base_uri().as_str()).expect("page");
//!     webrig::assertions::assert_text_present(&page, "Welcome");
//! }
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::assertions;
use crate::browser::{BrowserError, Page, WebClient};
use crate::config::HarnessConfig;
use crate::logging::{self, LoggingGuard};
use crate::port::{self, PortError};
use crate::server::context::{ContextBuilder, DefaultContext};
use crate::server::{PauseableServer, ServerError, ServerState};

/// Fixture failure.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// No port could be selected.
    #[error(transparent)]
    Port(#[from] PortError),
    /// The server could not be built, started or transitioned.
    #[error(transparent)]
    Server(#[from] ServerError),
    /// The browser client could not be built.
    #[error(transparent)]
    Browser(#[from] BrowserError),
    /// The server came up but does not report itself as running.
    #[error("server on port {port} failed to start")]
    NotStarted {
        /// Port the server was started on.
        port: u16,
    },
    /// The base URI could not be formed.
    #[error("invalid base URI '{uri}': {source}")]
    BaseUri {
        /// The offending URI text.
        uri: String,
        /// Parse error.
        #[source]
        source: url::ParseError,
    },
    /// A previous setup panicked while holding the scope lock.
    #[error("fixture scope lock poisoned")]
    LockPoisoned,
}

/// A running embedded server and the settings tests use to reach it.
#[derive(Debug)]
pub struct Container {
    config: HarnessConfig,
    server: PauseableServer,
    base_uri: Url,
    _logging: Option<LoggingGuard>,
}

impl Container {
    /// Install logging from `[logging]`, select a port, build the context
    /// and start the server on it.
    ///
    /// # Errors
    ///
    /// Returns the first failing step: port selection, context build, server
    /// construction, bind, or the post-start check.
    pub fn start(config: HarnessConfig, builder: &dyn ContextBuilder) -> Result<Self, HarnessError> {
        let logging = logging::init(&config.logging);
        let port = port::select_port(&config.server)?;
        let context = builder.build_context(&config)?;

        let mut uri = format!("http://{}:{port}{}", config.server.host, context.context_path());
        if !uri.ends_with('/') {
            uri.push('/');
        }
        let base_uri = Url::parse(&uri).map_err(|source| HarnessError::BaseUri { uri, source })?;

        let addr = SocketAddr::new(config.server.bind_address, port);
        let server = PauseableServer::new(addr, context.into_router(), config.server.worker_threads)?;
        if server.start()? != ServerState::Running || !server.is_running() {
            return Err(HarnessError::NotStarted { port });
        }

        info!(%base_uri, "functional test server started");
        Ok(Self {
            config,
            server,
            base_uri,
            _logging: logging,
        })
    }

    /// Base URI of the hosted application, ending in `/`.
    pub fn base_uri(&self) -> &Url {
        &self.base_uri
    }

    /// Resolve `path` against the base URI.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::InvalidUrl`] if `path` cannot be resolved.
    pub fn url(&self, path: &str) -> Result<Url, BrowserError> {
        self.base_uri
            .join(path.trim_start_matches('/'))
            .map_err(|source| BrowserError::InvalidUrl {
                url: path.to_string(),
                source,
            })
    }

    /// Port the server listens on.
    pub fn port(&self) -> u16 {
        self.server.port()
    }

    /// Configuration the container was started with.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The embedded server.
    pub fn server(&self) -> &PauseableServer {
        &self.server
    }

    /// A fresh client configured from `[browser]`, with its own cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Client`] if the client cannot be built.
    pub fn web_client(&self) -> Result<WebClient, BrowserError> {
        WebClient::with_options(&self.config.browser)
    }

    /// Pause (`true`) or resume (`false`) the server's listener.
    ///
    /// # Errors
    ///
    /// Returns the failed transition's error.
    pub fn pause_server(&self, paused: bool) -> Result<ServerState, HarnessError> {
        Ok(self.server.pause(paused)?)
    }

    /// Assert that `page` shows the configured validation error banner.
    ///
    /// # Panics
    ///
    /// If the banner is absent.
    #[track_caller]
    pub fn assert_error_text_present(&self, page: &Page) {
        assertions::assert_text_present(page, &self.config.assertions.error_text);
    }

    /// Assert that `page` does not show the configured validation error banner.
    ///
    /// # Panics
    ///
    /// If the banner is present.
    #[track_caller]
    pub fn assert_error_text_not_present(&self, page: &Page) {
        assertions::assert_text_not_present(page, &self.config.assertions.error_text);
    }
}

/// Lazily started, shared [`Container`].
///
/// Typically held in a `static` so every test in a binary shares one server.
pub struct FixtureScope {
    config: HarnessConfig,
    builder: Box<dyn ContextBuilder>,
    container: Mutex<Option<Arc<Container>>>,
}

impl FixtureScope {
    /// Scope whose context comes from `[webapp]`.
    pub fn new(config: HarnessConfig) -> Self {
        Self::with_builder(config, DefaultContext)
    }

    /// Scope whose context comes from `builder`.
    pub fn with_builder(config: HarnessConfig, builder: impl ContextBuilder + 'static) -> Self {
        Self {
            config,
            builder: Box::new(builder),
            container: Mutex::new(None),
        }
    }

    /// Start the container on first use; return the shared one afterwards.
    ///
    /// A failed start leaves the scope empty, so the next call retries.
    ///
    /// # Errors
    ///
    /// Returns the [`Container::start`] error.
    pub fn setup(&self) -> Result<Arc<Container>, HarnessError> {
        let mut slot = self
            .container
            .lock()
            .map_err(|_| HarnessError::LockPoisoned)?;
        if let Some(container) = slot.as_ref() {
            return Ok(Arc::clone(container));
        }

        let container = Container::start(self.config.clone(), self.builder.as_ref())
            .map(Arc::new)
            .inspect_err(|e| warn!(error = %e, "fixture setup failed"))?;
        *slot = Some(Arc::clone(&container));
        Ok(container)
    }

    /// Release the scope's handle. The server stops once no test holds one.
    pub fn teardown(&self) {
        let released = match self.container.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if released.is_some() {
            info!("fixture torn down");
        }
    }

    /// Whether the scope currently holds a container.
    pub fn is_started(&self) -> bool {
        match self.container.lock() {
            Ok(slot) => slot.is_some(),
            Err(poisoned) => poisoned.get_ref().is_some(),
        }
    }
}

impl std::fmt::Debug for FixtureScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureScope")
            .field("config", &self.config)
            .field("started", &self.is_started())
            .finish()
    }
}
