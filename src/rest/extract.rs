//! Turning axum request parts into an [`InboundRequest`].

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, Uri};
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::request::InboundRequest;
use crate::rest::error::ApiError;

/// Build the form's view of an HTTP request.
///
/// Query fields and body fields are merged, the body winning. JSON bodies
/// must be objects; anything else is parsed as url-encoded form data.
pub fn inbound_request(
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<InboundRequest, ApiError> {
    let query = uri.query().map(parse_urlencoded).unwrap_or_default();

    let body = if body.is_empty() {
        Map::new()
    } else if is_json_body(headers) {
        match serde_json::from_slice::<Value>(body)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(ApiError::BadRequest(
                    "JSON body must be an object".to_string(),
                ))
            }
        }
    } else {
        parse_urlencoded(&String::from_utf8_lossy(body))
    };

    Ok(InboundRequest::from_parts(
        method,
        full_url(uri, headers),
        headers,
        query,
        body,
    ))
}

/// Absolute URL of the request, using the `Host` header
pub fn full_url(uri: &Uri, headers: &HeaderMap) -> String {
    if uri.scheme().is_some() {
        return uri.to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    format!("http://{host}{path}")
}

fn is_json_body(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
}

/// Later duplicates win
fn parse_urlencoded(input: &str) -> Map<String, Value> {
    form_urlencoded::parse(input.as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::FormRequest;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_form_body_overrides_query() {
        let uri: Uri = "/form?form_step=1&tab=a".parse().unwrap();
        let headers = headers(&[
            (header::HOST, "example.test"),
            (header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
        ]);
        let body = Bytes::from_static(b"form_step=2&name=Jane+Doe");

        let request = inbound_request(Method::POST, &uri, &headers, &body).unwrap();
        assert_eq!(request.input("form_step"), Some(&json!("2")));
        assert_eq!(request.input("name"), Some(&json!("Jane Doe")));
        assert_eq!(request.input("tab"), Some(&json!("a")));
        assert_eq!(request.full_url(), "http://example.test/form?form_step=1&tab=a");
        assert!(!request.wants_json());
    }

    #[test]
    fn test_json_body() {
        let uri: Uri = "/form".parse().unwrap();
        let headers = headers(&[(header::CONTENT_TYPE, "application/json")]);
        let body = Bytes::from_static(br#"{"form_step": 1, "agree": true}"#);

        let request = inbound_request(Method::POST, &uri, &headers, &body).unwrap();
        assert_eq!(request.input("form_step"), Some(&json!(1)));
        assert_eq!(request.input("agree"), Some(&json!(true)));
        assert!(request.wants_json());
        assert_eq!(request.full_url(), "http://localhost/form");
    }

    #[test]
    fn test_json_body_must_be_object() {
        let uri: Uri = "/form".parse().unwrap();
        let headers = headers(&[(header::CONTENT_TYPE, "application/json")]);
        let body = Bytes::from_static(b"[1, 2]");

        assert!(matches!(
            inbound_request(Method::POST, &uri, &headers, &body),
            Err(ApiError::BadRequest(_))
        ));
    }
}
