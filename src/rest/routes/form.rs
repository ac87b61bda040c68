//! The form endpoint: one handler for every method.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::debug;

use crate::error::FormError;
use crate::form::{FormResponse, MultiStepForm, Representation};
use crate::request::FormRequest;
use crate::rest::error::ApiError;
use crate::rest::extract::inbound_request;
use crate::rest::sessions::{session_cookie, session_id_or_new};
use crate::rest::state::AppState;
use crate::session::{ERRORS_KEY, OLD_INPUT_KEY};

/// Run the configured form against the request.
///
/// Validation failures answer 422 for JSON clients; HTML clients are sent
/// back with the errors and their input flashed for the next request.
pub async fn handle(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let cookie_name = state.config.session.cookie_name.clone();
    let session_id = session_id_or_new(&headers, &cookie_name);

    let request = inbound_request(method, &uri, &headers, &body)?;
    let submitted = request.all_input().clone();
    let back = request.previous_url();

    let session = state.sessions.load(&session_id).await;
    let mut form = MultiStepForm::new(request, session);
    form.configure(&state.config.form);
    if let Some(views) = &state.views {
        form.renderer(Arc::clone(views))
            .view(&state.config.views.default_view);
    }
    (state.definition)(&mut form)?;

    let representation = form.representation();
    let result = form.handle();
    let mut session = form.into_session();

    let response = match result {
        Ok(response) => response.into_response(),
        Err(FormError::Validation(errors)) if representation == Representation::View => {
            debug!(fields = errors.len(), "Redirecting back with validation errors");
            session.flash(OLD_INPUT_KEY, Value::Object(submitted));
            session.flash(ERRORS_KEY, errors.to_json()["errors"].clone());
            FormResponse::redirect(back).into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    };

    state.sessions.store(&session_id, session.all()).await;

    Ok(with_session_cookie(response, &cookie_name, &session_id))
}

fn with_session_cookie(mut response: Response, cookie_name: &str, session_id: &str) -> Response {
    if let Some(cookie) = session_cookie(cookie_name, session_id) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}
