//! Errors returned by form dispatch.

use thiserror::Error;

use crate::validation::ValidationErrors;
use crate::view::ViewError;

/// Everything that can stop a form from producing its own response
#[derive(Debug, Error)]
pub enum FormError {
    /// Submitted data failed the step rules; not fatal, the host answers 422
    /// or redirects back with the errors
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// A hook, before-save or completion callback failed
    #[error("form callback failed: {0}")]
    Hook(#[source] anyhow::Error),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error("view '{view}' is configured but no renderer was provided")]
    MissingRenderer { view: String },
}

impl FormError {
    pub fn is_validation(&self) -> bool {
        matches!(self, FormError::Validation(_))
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            FormError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_is_summary() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "The name field is required.");
        let err = FormError::from(errors);

        assert!(err.is_validation());
        assert_eq!(err.to_string(), "The name field is required.");
        assert!(err.validation_errors().unwrap().has("name"));
    }

    #[test]
    fn test_hook_error_keeps_source() {
        let err = FormError::Hook(anyhow::anyhow!("payment gateway down"));
        assert!(!err.is_validation());
        assert_eq!(err.to_string(), "form callback failed: payment gateway down");
    }
}
