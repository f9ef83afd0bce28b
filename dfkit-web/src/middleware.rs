//! Session middleware
//!
//! Loads the session named by the session cookie, exposes it to handlers as a
//! request extension and writes it back once the handler has run.

use crate::{session::Session, AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{debug, error, warn};

/// Attach a [`Session`] to the request and persist it afterwards.
///
/// A cookie is only issued once a new or regenerated session holds data, so
/// anonymous requests that never touch the session stay cookie-free.
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_name = state.config.app.session.cookie_name.clone();
    let session = load_session(&state, &jar, &cookie_name).await;

    request.extensions_mut().insert(session.clone());
    let response = next.run(request).await;

    let id = session.id();
    let previous_id = session.previous_id();
    if let Some(old) = &previous_id {
        destroy_session(&state, old).await;
        debug!(session_id = %id, "Session moved to a new id");
    }

    if session.is_invalidated() {
        destroy_session(&state, &id).await;
        debug!(session_id = %id, "Session invalidated");
        let jar = jar.remove(Cookie::build((cookie_name, "")).path("/"));
        return (jar, response).into_response();
    }

    let regenerated = previous_id.is_some();
    if regenerated && session.is_empty() {
        let jar = jar.remove(Cookie::build((cookie_name, "")).path("/"));
        return (jar, response).into_response();
    }

    let issue_cookie = (session.is_new() || regenerated) && !session.is_empty();
    if session.is_modified() || issue_cookie {
        if let Err(e) = state.sessions.save(&id, session.snapshot()).await {
            error!(session_id = %id, error = %e, "Failed to save session");
            return response;
        }
    }

    if issue_cookie {
        let cookie = Cookie::build((cookie_name, id))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(state.config.app.environment.is_production());
        return (jar.add(cookie), response).into_response();
    }

    response
}

async fn destroy_session(state: &AppState, id: &str) {
    if let Err(e) = state.sessions.destroy(id).await {
        warn!(session_id = %id, error = %e, "Failed to destroy session");
    }
}

async fn load_session(state: &AppState, jar: &CookieJar, cookie_name: &str) -> Session {
    let Some(cookie) = jar.get(cookie_name) else {
        return Session::fresh();
    };

    match state.sessions.load(cookie.value()).await {
        Ok(Some(data)) => Session::existing(cookie.value(), data),
        Ok(None) => {
            debug!("Session cookie does not match a live session");
            Session::fresh()
        }
        Err(e) => {
            warn!(error = %e, "Failed to load session, starting a new one");
            Session::fresh()
        }
    }
}
