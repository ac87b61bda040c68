//! Session-backed multi-step forms.
//!
//! Declare numbered steps with validation rules, optional before/after hooks
//! and response data on a [`MultiStepForm`], then hand it each request. The
//! form tracks the committed step in the session, validates and saves
//! submissions, advances, and answers with a rendered view, a redirect or a
//! JSON payload. The [`rest`] module serves a form over axum.

pub mod config;
pub mod error;
pub mod form;
pub mod logging;
pub mod request;
pub mod rest;
pub mod session;
pub mod validation;
pub mod view;

pub use error::FormError;
pub use form::{
    DataValue, FormResponse, HookKey, MultiStepForm, RequestKind, StepConfig, FORM_STEP,
};
pub use request::{FormRequest, InboundRequest};
pub use session::{MemorySession, Session};
pub use validation::{Rule, ValidationErrors};
pub use view::{HandlebarsViews, ViewRenderer};
