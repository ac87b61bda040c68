//! Converting dispatch results into HTTP responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};

use crate::form::FormResponse;

impl IntoResponse for FormResponse {
    fn into_response(self) -> Response {
        match self {
            FormResponse::Html(body) => Html(body).into_response(),
            FormResponse::Json(value) => Json(value).into_response(),
            FormResponse::Redirect(location) => {
                (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
            }
            FormResponse::Content {
                status,
                content_type,
                body,
            } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
                let mut response = (status, body).into_response();
                if let Ok(value) = HeaderValue::from_str(&content_type) {
                    response.headers_mut().insert(header::CONTENT_TYPE, value);
                }
                response
            }
        }
    }
}
