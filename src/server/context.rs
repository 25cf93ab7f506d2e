//! Web application context: what the embedded server hosts.
//!
//! A context is a mount path, a main resource directory, an optional
//! overlay directory consulted for files the main directory lacks, and
//! optional dynamic routes that take precedence over static resources.

use std::path::{Path, PathBuf};

use axum::Router;
use tower_http::services::ServeDir;
use tracing::debug;

use super::ServerError;
use crate::config::{HarnessConfig, WebAppConfig};

/// The hosted web application.
#[derive(Debug, Clone)]
pub struct WebAppContext {
    context_path: String,
    root: PathBuf,
    overlay: Option<PathBuf>,
    routes: Router,
}

impl WebAppContext {
    /// Create a context serving `root` at `context_path`.
    ///
    /// The context path is normalised to a leading slash and no trailing slash
    /// (except for the root path `/`).
    pub fn new(context_path: &str, root: impl Into<PathBuf>) -> Self {
        Self {
            context_path: normalize_context_path(context_path),
            root: root.into(),
            overlay: None,
            routes: Router::new(),
        }
    }

    /// Build the context described by `[webapp]`.
    ///
    /// The overlay is added only if its directory exists.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::MissingResourceBase`] if the root directory
    /// does not exist.
    pub fn from_config(config: &WebAppConfig) -> Result<Self, ServerError> {
        if !config.root.is_dir() {
            return Err(ServerError::MissingResourceBase(config.root.clone()));
        }
        let context = Self::new(&config.context_path, config.root.clone());
        if config.overlay.is_dir() {
            debug!(overlay = %config.overlay.display(), "adding overlay resources");
            return Ok(context.with_overlay(config.overlay.clone()));
        }
        Ok(context)
    }

    /// Serve files missing from the root out of `dir`.
    pub fn with_overlay(mut self, dir: impl Into<PathBuf>) -> Self {
        self.overlay = Some(dir.into());
        self
    }

    /// Add dynamic routes; they are matched before static resources.
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    /// Mount path of the application, e.g. `/` or `/app`.
    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    /// Main resource directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Overlay resource directory, if any.
    pub fn overlay(&self) -> Option<&Path> {
        self.overlay.as_deref()
    }

    /// Assemble the router served by the embedded server.
    pub fn into_router(self) -> Router {
        let main = ServeDir::new(&self.root);
        let app = match self.overlay {
            Some(overlay) => self
                .routes
                .fallback_service(main.fallback(ServeDir::new(overlay))),
            None => self.routes.fallback_service(main),
        };

        if self.context_path == "/" {
            app
        } else {
            Router::new().nest(&self.context_path, app)
        }
    }
}

fn normalize_context_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Hook supplying the web application context.
///
/// The default implementation derives the context from `[webapp]`;
/// implementors override it to add routes or point at other directories.
pub trait ContextBuilder: Send + Sync {
    /// Build the context hosted by the embedded server.
    ///
    /// # Errors
    ///
    /// Returns an error if the context cannot be assembled.
    fn build_context(&self, config: &HarnessConfig) -> Result<WebAppContext, ServerError> {
        WebAppContext::from_config(&config.webapp)
    }
}

/// [`ContextBuilder`] with the default, configuration-driven behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultContext;

impl ContextBuilder for DefaultContext {}
