//! Three-step account sign-up served by the binary.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::form::{DataValue, MultiStepForm, StepConfig};
use crate::rest::state::FormDefinition;

const ROLES: [&str; 3] = ["admin", "editor", "viewer"];

/// Steps, data and hooks of the sign-up form
pub fn define(form: &mut MultiStepForm) -> anyhow::Result<()> {
    form.data("title", "Create your account")
        .data("roles", json!(ROLES))
        .data(
            "status",
            DataValue::lazy(|form| form.session().flashed("status").unwrap_or(Value::Null)),
        )
        .add_step(
            1,
            StepConfig::new()
                .rule("name", "required|string|max:100")?
                .rule("email", "required|email")?
                .message("email.email", "Please enter a valid email address.")
                .data("description", "Tell us who you are."),
        )
        .add_step(
            2,
            StepConfig::new()
                .rule("role", &format!("required|in:{}", ROLES.join(",")))?
                .rule("experience", "nullable|integer|min:0|max:60")?
                .data("description", "Pick the role you will work in."),
        )
        .add_step(
            3,
            StepConfig::new()
                .rule("terms", "accepted")?
                .message("accepted", "You must accept the terms to finish.")
                .data("description", "Review your details and confirm."),
        )
        .before_save(|mut data| {
            if let Some(Value::String(email)) = data.get_mut("email") {
                *email = email.trim().to_lowercase();
            }
            Ok(data)
        })
        .on_complete(|form| {
            let email = form.get_value("email", Value::Null);
            let role = form.get_value("role", Value::Null);
            tracing::info!(%email, %role, "Sign-up completed");
            form.session_mut()
                .flash("status", json!("Thanks, your account has been created."));
            Ok(None)
        });
    Ok(())
}

pub fn definition() -> FormDefinition {
    Arc::new(define)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::InboundRequest;
    use crate::session::{MemorySession, Session};

    #[test]
    fn test_definition_declares_three_steps() {
        let mut form = MultiStepForm::new(InboundRequest::get("http://localhost/"), MemorySession::new());
        define(&mut form).unwrap();

        assert_eq!(form.last_step(), 3);
        assert!(form.step_config(Some(1)).unwrap().rules.contains_key("email"));
        assert!(form.step_config(Some(3)).unwrap().rules.contains_key("terms"));
    }

    #[test]
    fn test_email_is_normalised_before_save() {
        let request = InboundRequest::post("http://localhost/")
            .json()
            .field("form_step", 1)
            .field("name", "Jane")
            .field("email", "Jane@Example.COM");
        let mut form = MultiStepForm::new(request, MemorySession::new());
        define(&mut form).unwrap();
        form.namespaced("signup");

        form.handle().unwrap();
        assert_eq!(form.session().get("signup.email"), Some(json!("jane@example.com")));
        assert_eq!(form.current_step(), 2);
    }

    #[test]
    fn test_cannot_finish_without_accepting_terms() {
        let mut session = MemorySession::new();
        session.put("signup.form_step", json!(3));
        let request = InboundRequest::post("http://localhost/")
            .json()
            .field("form_step", 3);
        let mut form = MultiStepForm::new(request, session);
        define(&mut form).unwrap();
        form.namespaced("signup");

        let err = form.handle().unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.first("terms"), Some("You must accept the terms to finish."));
        assert_eq!(form.current_step(), 3);
    }
}
