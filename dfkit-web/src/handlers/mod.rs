//! HTTP request handlers for the demo application
//!
//! Page handlers extract a [`Controller`](crate::Controller) and return it;
//! the controller turns itself into the response.

pub mod account;
pub mod api;
pub mod health;
pub mod index;
pub mod navigation;

pub use account::*;
pub use api::*;
pub use health::*;
pub use index::*;
pub use navigation::*;

use crate::{Controller, WebError, WebResult};
use axum::http::Uri;

/// Session namespace holding the signed-in user
pub const AUTH_NAMESPACE: &str = "auth";
pub const USER_KEY: &str = "user";

/// Fallback for unmatched routes
pub async fn not_found(uri: Uri) -> WebError {
    WebError::NotFound(format!("No route for {}", uri.path()))
}

pub(crate) fn current_user(ctl: &Controller) -> Option<String> {
    ctl.session().get_str(AUTH_NAMESPACE, USER_KEY)
}

/// Make the signed-in user available to the layout
pub(crate) fn assign_current_user(ctl: &mut Controller) -> WebResult<()> {
    if let Some(user) = current_user(ctl) {
        ctl.assign("user", user)?;
    }
    Ok(())
}
