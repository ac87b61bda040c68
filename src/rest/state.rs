//! Shared state for the form server.

use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::form::MultiStepForm;
use crate::rest::sessions::SessionStore;
use crate::view::{HandlebarsViews, ViewError, ViewRenderer};

/// Declares steps, hooks and data on a freshly built form
pub type FormDefinition = Arc<dyn Fn(&mut MultiStepForm) -> anyhow::Result<()> + Send + Sync>;

/// Template used when the configured templates directory does not exist
const EMBEDDED_FORM_VIEW: &str = include_str!("../../templates/form.hbs");

/// Shared state for the form routes
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    /// Absent when the form should only answer with JSON
    pub views: Option<Arc<dyn ViewRenderer>>,
    pub config: Arc<Config>,
    pub definition: FormDefinition,
}

impl AppState {
    pub fn new(config: Config, definition: FormDefinition) -> Self {
        Self {
            sessions: SessionStore::new(),
            views: None,
            config: Arc::new(config),
            definition,
        }
    }

    /// State with views loaded from the configured templates directory
    pub fn with_configured_views(config: Config, definition: FormDefinition) -> Self {
        let views = match load_views(&config) {
            Ok(views) => Some(Arc::new(views) as Arc<dyn ViewRenderer>),
            Err(e) => {
                tracing::warn!("Failed to load views, serving JSON only: {}", e);
                None
            }
        };
        Self {
            views,
            ..Self::new(config, definition)
        }
    }

    pub fn with_views(mut self, views: Arc<dyn ViewRenderer>) -> Self {
        self.views = Some(views);
        self
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("views", &self.views.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Templates from disk, or the embedded form view when the directory is missing
pub fn load_views(config: &Config) -> Result<HandlebarsViews, ViewError> {
    let dir = config.templates_path();
    if dir.is_dir() {
        return HandlebarsViews::from_dir(&dir, &config.views.extension);
    }

    tracing::info!(
        "Templates directory {} not found, using embedded views",
        dir.display()
    );
    embedded_views(&config.views.default_view)
}

pub fn embedded_views(name: &str) -> Result<HandlebarsViews, ViewError> {
    let mut views = HandlebarsViews::new();
    views.register(name, EMBEDDED_FORM_VIEW)?;
    Ok(views)
}
