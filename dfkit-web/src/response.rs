//! Response state accumulated by a controller before it is turned into an
//! HTTP response.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::error;

/// Where a redirect points and with which status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub location: String,
    pub status: StatusCode,
}

impl RedirectTarget {
    pub fn new(location: impl Into<String>, status: StatusCode) -> Self {
        Self {
            location: location.into(),
            status,
        }
    }

    /// 302 Found
    pub fn found(location: impl Into<String>) -> Self {
        Self::new(location, StatusCode::FOUND)
    }

    /// 301 Moved Permanently
    pub fn permanent(location: impl Into<String>) -> Self {
        Self::new(location, StatusCode::MOVED_PERMANENTLY)
    }
}

impl IntoResponse for RedirectTarget {
    fn into_response(self) -> Response {
        match HeaderValue::try_from(self.location.as_str()) {
            Ok(location) => (self.status, [(header::LOCATION, location)]).into_response(),
            Err(_) => {
                error!(location = %self.location, "Redirect location is not a valid header value");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Body the controller has set explicitly
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseBody {
    #[default]
    Empty,
    Json(Value),
    Content(String),
}

/// The response half of a controller
#[derive(Debug, Clone)]
pub struct ResponseState {
    pub status: StatusCode,
    pub body: ResponseBody,
    pub redirect: Option<RedirectTarget>,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            body: ResponseBody::Empty,
            redirect: None,
        }
    }
}

impl ResponseState {
    pub fn redirect(&mut self, target: RedirectTarget) {
        self.redirect = Some(target);
    }

    pub fn set_json_content(&mut self, value: Value) {
        self.body = ResponseBody::Json(value);
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.body = ResponseBody::Content(content.into());
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_response_sets_location() {
        let response = RedirectTarget::found("/account/login").into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/account/login"
        );
    }

    #[test]
    fn test_invalid_location_is_server_error() {
        let response = RedirectTarget::found("/bad\nheader").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_state_defaults() {
        let mut state = ResponseState::default();
        assert_eq!(state.status, StatusCode::OK);
        assert!(!state.is_redirect());

        state.redirect(RedirectTarget::permanent("https://example.com/"));
        assert!(state.is_redirect());
        assert_eq!(
            state.redirect.as_ref().map(|r| r.status),
            Some(StatusCode::MOVED_PERMANENTLY)
        );
    }
}
