//! JSON endpoints

use crate::{Controller, WebResult};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub environment: String,
    pub ajax: bool,
    pub controller: String,
    pub action: String,
}

/// `GET /api/status`
pub async fn status(mut ctl: Controller) -> WebResult<Controller> {
    let body = StatusResponse {
        status: "ok",
        environment: ctl.environment().to_string(),
        ajax: ctl.is_ajax(),
        controller: ctl.dispatcher().controller().to_string(),
        action: ctl.dispatcher().action().to_string(),
    };
    ctl.render_json(&body)?;
    Ok(ctl)
}
