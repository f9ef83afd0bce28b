//! Redirect-only endpoints

use crate::{Controller, RouteSpec, WebResult};

/// `GET /back`: return to the referring page, or `fallback`
pub async fn back(mut ctl: Controller) -> Controller {
    let fallback = ctl.param("fallback").map(str::to_string);
    ctl.redirect_to_referrer(fallback.as_deref());
    ctl
}

/// `GET /go/{controller}/{action}`: redirect to the conventional URL of the
/// captured controller and action.
pub async fn go(mut ctl: Controller) -> WebResult<Controller> {
    ctl.redirect_from_here(RouteSpec::default())?;
    Ok(ctl)
}
