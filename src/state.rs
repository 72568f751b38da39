//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::engine::mupdf::MupdfEngine;
use crate::resolver::DocumentResolver;
use crate::session::SessionCache;

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    dispatcher: Dispatcher,
}

impl AppState {
    /// Build the session cache, resolver and MuPDF engine from `config`
    pub fn new(config: Config) -> Result<Self, StateError> {
        let resolver = DocumentResolver::new(&config.resolver)?;
        let cache = SessionCache::new(config.session.ttl);
        let engine = Arc::new(MupdfEngine::new(config.engine.max_open_documents));

        let dispatcher = Dispatcher::new(cache, resolver, engine);
        Ok(Self::with_dispatcher(config, dispatcher))
    }

    pub fn with_dispatcher(config: Config, dispatcher: Dispatcher) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, dispatcher }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the operation dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }
}
