//! Route definitions for the demo application
//!
//! Each page route carries the [`ActionName`] its controller runs as, which
//! picks the default template and feeds `redirect_from_here`.

use crate::{dispatcher::ActionName, handlers, url_helper::RouteTable, AppState};
use axum::{
    routing::{get, MethodRouter},
    Extension, Router,
};

fn served_by(
    route: MethodRouter<AppState>,
    controller: &str,
    action: &str,
) -> MethodRouter<AppState> {
    route.layer(Extension(ActionName::new(controller, action)))
}

/// Page routes
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", served_by(get(handlers::index), "index", "index"))
        .route(
            "/account/login",
            served_by(
                get(handlers::login_form).post(handlers::login),
                "account",
                "login",
            ),
        )
        .route(
            "/account/logout",
            served_by(get(handlers::logout), "account", "logout"),
        )
        .route(
            "/account/settings",
            served_by(get(handlers::settings), "account", "settings"),
        )
        .route("/back", served_by(get(handlers::back), "navigation", "back"))
        // controller and action come from the captures
        .route("/go/{controller}/{action}", get(handlers::go))
}

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/status", served_by(get(handlers::status), "api", "status"))
}

/// Create all routes combined
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .merge(page_routes())
        .nest("/api", api_routes())
        .route("/health", get(handlers::health_check))
}

/// Named routes for `redirect_to_route`
pub fn route_table() -> RouteTable {
    RouteTable::new()
        .with("home", "/")
        .with("login", "/account/login")
        .with("logout", "/account/logout")
        .with("settings", "/account/settings")
        .with("back", "/back")
        .with("status", "/api/status")
}
