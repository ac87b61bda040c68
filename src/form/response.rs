//! Responses produced by dispatch.
//!
//! | Request | JSON wanted, or no view | HTML with a view |
//! |---|---|---|
//! | show | `{data, form}` | rendered view |
//! | modify / reset / navigate | `{data, form}` | redirect back |
//! | hook short-circuit | the hook's response, untouched | same |

use serde_json::{json, Value};

/// What the host should send back
#[derive(Debug, Clone, PartialEq)]
pub enum FormResponse {
    /// A rendered view
    Html(String),
    /// `{data, form}` payload
    Json(Value),
    /// Redirect to the referring page
    Redirect(String),
    /// Literal response built by application code, usually a hook
    Content {
        status: u16,
        content_type: String,
        body: String,
    },
}

impl FormResponse {
    /// Plain-text 200 response
    pub fn text(body: impl Into<String>) -> Self {
        FormResponse::Content {
            status: 200,
            content_type: "text/plain; charset=utf-8".to_string(),
            body: body.into(),
        }
    }

    /// Literal response with an explicit status and content type
    pub fn content(status: u16, content_type: &str, body: impl Into<String>) -> Self {
        FormResponse::Content {
            status,
            content_type: content_type.to_string(),
            body: body.into(),
        }
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        FormResponse::Redirect(location.into())
    }

    /// The `{data, form}` payload shared by show and modification responses
    pub fn payload(data: Value, form: Value) -> Self {
        FormResponse::Json(json!({ "data": data, "form": form }))
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, FormResponse::Redirect(_))
    }

    pub fn status(&self) -> u16 {
        match self {
            FormResponse::Redirect(_) => 302,
            FormResponse::Content { status, .. } => *status,
            FormResponse::Html(_) | FormResponse::Json(_) => 200,
        }
    }

    /// JSON body, when this is a payload response
    pub fn json(&self) -> Option<&Value> {
        match self {
            FormResponse::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Text body for HTML and literal responses
    pub fn body_text(&self) -> Option<&str> {
        match self {
            FormResponse::Html(body) | FormResponse::Content { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// How the current client wants to be answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    View,
    Json,
}

impl Representation {
    /// Views only when one is configured and the client did not ask for JSON
    pub fn select(has_view: bool, wants_json: bool) -> Self {
        if has_view && !wants_json {
            Representation::View
        } else {
            Representation::Json
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_representation_table() {
        assert_eq!(Representation::select(true, false), Representation::View);
        assert_eq!(Representation::select(true, true), Representation::Json);
        assert_eq!(Representation::select(false, false), Representation::Json);
        assert_eq!(Representation::select(false, true), Representation::Json);
    }

    #[test]
    fn test_payload_shape() {
        let response = FormResponse::payload(json!({"title": "x"}), json!({"form_step": 1}));
        let body = response.json().unwrap();
        assert_eq!(body["data"]["title"], "x");
        assert_eq!(body["form"]["form_step"], 1);
        assert_eq!(response.status(), 200);
    }

    #[test]
    fn test_literal_responses() {
        let text = FormResponse::text("OK");
        assert_eq!(text.body_text(), Some("OK"));
        assert_eq!(text.status(), 200);

        let created = FormResponse::content(201, "application/json", "{}");
        assert_eq!(created.status(), 201);

        let back = FormResponse::redirect("/form");
        assert!(back.is_redirect());
        assert_eq!(back.status(), 302);
    }
}
