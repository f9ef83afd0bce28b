//! Sign-in flow
//!
//! The login form remembers where the visitor came from, and a successful
//! sign-in sends them back there.

use super::{assign_current_user, current_user, AUTH_NAMESPACE, USER_KEY};
use crate::{Controller, FlashLevel, WebResult};
use serde_json::json;
use tracing::info;

/// Referrer namespace for the sign-in flow
pub const LOGIN_REFERRER: &str = "login";

/// `GET /account/login`
pub async fn login_form(mut ctl: Controller) -> WebResult<Controller> {
    ctl.store_referrer(LOGIN_REFERRER, true);

    let username = ctl.param_or("username", "").to_string();
    ctl.assign("username", username)?;
    assign_current_user(&mut ctl)?;
    Ok(ctl)
}

/// `POST /account/login`
pub async fn login(mut ctl: Controller) -> WebResult<Controller> {
    let username = ctl.param_or("username", "").trim().to_string();

    if username.is_empty() {
        if ctl.is_ajax() {
            ctl.set_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
            ctl.render_json(&json!({ "error": "username is required" }))?;
        } else {
            ctl.alert("Please enter a username.", FlashLevel::Warning);
            ctl.redirect_to_route("login")?;
        }
        return Ok(ctl);
    }

    // new id on privilege change
    ctl.session().regenerate();
    ctl.session().set(AUTH_NAMESPACE, USER_KEY, username.as_str());
    info!(user = %username, "User signed in");

    if ctl.is_ajax() {
        ctl.clear_stored_referrer(LOGIN_REFERRER);
        ctl.render_json(&json!({ "user": username }))?;
    } else {
        ctl.flash(format!("Welcome back, {}!", username), FlashLevel::Success);
        ctl.redirect_to_stored_referrer(LOGIN_REFERRER, None);
    }
    Ok(ctl)
}

/// `GET /account/logout`
pub async fn logout(mut ctl: Controller) -> WebResult<Controller> {
    if ctl.session().remove(AUTH_NAMESPACE, USER_KEY).is_some() {
        ctl.flash("You have been signed out.", FlashLevel::Info);
    }
    ctl.redirect_to_route("home")?;
    Ok(ctl)
}

/// `GET /account/settings`, served over https only in production
pub async fn settings(mut ctl: Controller) -> WebResult<Controller> {
    ctl.force_secure()?;

    if current_user(&ctl).is_none() {
        ctl.alert("Please sign in first.", FlashLevel::Info);
        ctl.redirect_to_route("login")?;
        return Ok(ctl);
    }

    assign_current_user(&mut ctl)?;
    Ok(ctl)
}
