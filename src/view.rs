//! View collaborator: named templates rendered with a JSON context.

use std::path::Path;

use handlebars::Handlebars;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while loading or rendering views
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("view '{0}' is not registered")]
    NotFound(String),
    #[error("failed to register view '{name}': {source}")]
    Template {
        name: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },
    #[error("failed to render view '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: Box<handlebars::RenderError>,
    },
    #[error("invalid templates pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders a named view into a document
pub trait ViewRenderer: Send + Sync {
    fn render(&self, view: &str, data: &Value) -> Result<String, ViewError>;

    fn has_view(&self, view: &str) -> bool;
}

/// Handlebars-backed views
pub struct HandlebarsViews {
    handlebars: Handlebars<'static>,
}

impl Default for HandlebarsViews {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlebarsViews {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.handlebars.get_templates().keys().collect();
        names.sort();
        f.debug_struct("HandlebarsViews")
            .field("views", &names)
            .finish()
    }
}

impl HandlebarsViews {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Missing keys render empty so templates can probe optional data
        handlebars.set_strict_mode(false);
        Self { handlebars }
    }

    /// Register a view from a template string
    pub fn register(&mut self, name: &str, template: &str) -> Result<(), ViewError> {
        self.handlebars
            .register_template_string(name, template)
            .map_err(|e| ViewError::Template {
                name: name.to_string(),
                source: Box::new(e),
            })
    }

    /// Register every `*.{extension}` file under `dir`, named by file stem
    pub fn load_dir(&mut self, dir: &Path, extension: &str) -> Result<usize, ViewError> {
        let pattern = dir.join(format!("**/*.{extension}"));
        let mut count = 0;

        for path in glob::glob(&pattern.to_string_lossy())?.flatten() {
            let name = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .with_extension("")
                .to_string_lossy()
                .replace('\\', "/");
            let template = std::fs::read_to_string(&path)?;
            self.register(&name, &template)?;
            debug!("Registered view '{}' from {}", name, path.display());
            count += 1;
        }

        info!("Loaded {} views from {}", count, dir.display());
        Ok(count)
    }

    /// Views loaded from a directory
    pub fn from_dir(dir: &Path, extension: &str) -> Result<Self, ViewError> {
        let mut views = Self::new();
        views.load_dir(dir, extension)?;
        Ok(views)
    }
}

impl ViewRenderer for HandlebarsViews {
    fn render(&self, view: &str, data: &Value) -> Result<String, ViewError> {
        if !self.has_view(view) {
            return Err(ViewError::NotFound(view.to_string()));
        }
        self.handlebars
            .render(view, data)
            .map_err(|e| ViewError::Render {
                name: view.to_string(),
                source: Box::new(e),
            })
    }

    fn has_view(&self, view: &str) -> bool {
        self.handlebars.has_template(view)
    }
}
