//! Home page

use super::assign_current_user;
use crate::{Controller, WebResult};

/// Renders `index/index`
pub async fn index(mut ctl: Controller) -> WebResult<Controller> {
    assign_current_user(&mut ctl)?;
    Ok(ctl)
}
