//! Request classification.

use axum::http::Method;

use crate::form::cursor::step_number;
use crate::form::FORM_STEP;
use crate::request::FormRequest;

/// The four request kinds, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// DELETE, or any request carrying a truthy `reset` flag
    Reset,
    /// POST, PUT or PATCH
    Modify,
    /// GET asking for a step other than the committed one
    Navigate,
    /// Anything else
    Show,
}

impl RequestKind {
    /// Classify `request` given the committed step.
    ///
    /// `requested_step` is only consulted for GET requests whose `form_step`
    /// parses as a step number; anything else is shown as is.
    pub fn classify(request: &dyn FormRequest, current_step: u32, requested_step: u32) -> Self {
        let method = request.method();

        if *method == Method::DELETE || request.boolean("reset") {
            RequestKind::Reset
        } else if [Method::POST, Method::PUT, Method::PATCH].contains(method) {
            RequestKind::Modify
        } else if *method == Method::GET
            && request.input(FORM_STEP).and_then(step_number).is_some()
            && requested_step != current_step
        {
            RequestKind::Navigate
        } else {
            RequestKind::Show
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Reset => "reset",
            RequestKind::Modify => "modify",
            RequestKind::Navigate => "navigate",
            RequestKind::Show => "show",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::InboundRequest;

    const URL: &str = "http://localhost/";

    #[test]
    fn test_delete_and_reset_flag_win() {
        let delete = InboundRequest::delete(URL);
        assert_eq!(RequestKind::classify(&delete, 1, 1), RequestKind::Reset);

        let post_reset = InboundRequest::post(URL).field("reset", "1").field("form_step", 1);
        assert_eq!(RequestKind::classify(&post_reset, 1, 1), RequestKind::Reset);

        let get_reset = InboundRequest::get(URL).field("reset", "true").field("form_step", 2);
        assert_eq!(RequestKind::classify(&get_reset, 1, 2), RequestKind::Reset);
    }

    #[test]
    fn test_modification_methods() {
        for method in [Method::POST, Method::PUT, Method::PATCH] {
            let request = InboundRequest::new(method, URL);
            assert_eq!(RequestKind::classify(&request, 1, 1), RequestKind::Modify);
        }
    }

    #[test]
    fn test_navigation_needs_a_different_step() {
        let same = InboundRequest::get(URL).field("form_step", "2");
        assert_eq!(RequestKind::classify(&same, 2, 2), RequestKind::Show);

        let other = InboundRequest::get(URL).field("form_step", "1");
        assert_eq!(RequestKind::classify(&other, 2, 1), RequestKind::Navigate);

        let blank = InboundRequest::get(URL).field("form_step", "");
        assert_eq!(RequestKind::classify(&blank, 2, 1), RequestKind::Show);
    }

    #[test]
    fn test_malformed_step_is_not_navigation() {
        let garbage = InboundRequest::get(URL).field("form_step", "abc");
        assert_eq!(RequestKind::classify(&garbage, 2, 1), RequestKind::Show);
    }

    #[test]
    fn test_plain_get_and_other_methods_show() {
        assert_eq!(
            RequestKind::classify(&InboundRequest::get(URL), 1, 1),
            RequestKind::Show
        );
        assert_eq!(
            RequestKind::classify(&InboundRequest::new(Method::HEAD, URL), 1, 1),
            RequestKind::Show
        );
    }
}
