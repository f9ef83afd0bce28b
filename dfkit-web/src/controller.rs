//! Per-request controller helpers
//!
//! A [`Controller`] is extracted by handlers and bundles the request, the
//! dispatch target, the URL helper, the session and the pending response.
//! Handlers call its helpers and return it; turning it into a response
//! performs the redirect, writes the JSON body or renders the template.
//!
//! ```ignore
//! async fn login_form(mut ctl: Controller) -> Controller {
//!     ctl.store_referrer("login", true);
//!     ctl.render(Some("account/login"));
//!     ctl
//! }
//! ```

use crate::{
    dispatcher::{ActionName, Dispatcher},
    request::RequestContext,
    response::{RedirectTarget, ResponseBody, ResponseState},
    session::{missing_session, Session},
    url_helper::{RouteSpec, UrlHelper},
    view::{render_error, ViewContext, ViewRenderer, ViewState},
    AppState, WebError, WebResult,
};
use axum::{
    extract::{
        rejection::RawPathParamsRejection, FromRequest, FromRequestParts, RawPathParams, Request,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use dfkit_core::{AppEnvironment, FlashLevel};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Referrer namespace used when the caller has no particular flow in mind
pub const DEFAULT_REFERRER_NAMESPACE: &str = "default";

const REFERRER_NAMESPACE_PREFIX: &str = "referrer_";
const REFERRER_KEY: &str = "url";

fn referrer_namespace(namespace: &str) -> String {
    format!("{}{}", REFERRER_NAMESPACE_PREFIX, namespace)
}

/// Controller base for one request
pub struct Controller {
    environment: AppEnvironment,
    views: Arc<dyn ViewRenderer>,
    request: RequestContext,
    dispatcher: Dispatcher,
    url: UrlHelper,
    session: Session,
    view: ViewState,
    response: ResponseState,
}

impl Controller {
    pub fn new(
        state: &AppState,
        request: RequestContext,
        dispatcher: Dispatcher,
        session: Session,
    ) -> Self {
        let url = UrlHelper::from_request(&state.config.app, &request, state.routes.clone());

        Self {
            environment: state.config.app.environment,
            views: state.views.clone(),
            request,
            dispatcher,
            url,
            session,
            view: ViewState::default(),
            response: ResponseState::default(),
        }
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn url(&self) -> &UrlHelper {
        &self.url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn environment(&self) -> AppEnvironment {
        self.environment
    }

    /* Parameters */

    /// Route parameter first, then query string, then body.
    ///
    /// An empty route parameter falls through to the request.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.dispatcher
            .param(name)
            .filter(|value| !value.is_empty())
            .or_else(|| self.request.get(name))
    }

    pub fn param_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.param(name).unwrap_or(default)
    }

    /// Parse a parameter; a value that does not parse is a bad request.
    pub fn param_as<T>(&self, name: &str) -> WebResult<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.param(name)
            .map(|value| {
                value.parse::<T>().map_err(|e| {
                    WebError::BadRequest(format!("Invalid value for parameter '{}': {}", name, e))
                })
            })
            .transpose()
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.param(name).is_some()
    }

    /* Rendering */

    /// Render `template` instead of the default `<controller>/<action>`.
    /// `None` leaves the choice unchanged.
    pub fn render(&mut self, template: Option<&str>) {
        if let Some(template) = template {
            self.view.pick(template);
        }
    }

    pub fn do_not_render(&mut self) {
        self.view.disable();
    }

    /// Set a template variable
    pub fn assign<T: Serialize>(&mut self, key: &str, value: T) -> WebResult<()> {
        self.view.set_var(key, serde_json::to_value(value)?);
        Ok(())
    }

    pub fn render_json<T: Serialize>(&mut self, data: &T) -> WebResult<()> {
        self.do_not_render();
        self.response.set_json_content(serde_json::to_value(data)?);
        Ok(())
    }

    /// Raw HTML body, sent when no template is rendered
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.response.set_content(content);
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.status = status;
    }

    pub fn is_ajax(&self) -> bool {
        self.request.is_ajax()
    }

    /* Redirection */

    /// Redirect with 302 Found
    pub fn redirect(&mut self, url: impl Into<String>) {
        self.redirect_with_status(url, StatusCode::FOUND);
    }

    pub fn redirect_with_status(&mut self, url: impl Into<String>, status: StatusCode) {
        self.do_not_render();
        let target = RedirectTarget::new(url, status);
        debug!(location = %target.location, status = status.as_u16(), "Redirecting");
        self.response.redirect(target);
    }

    pub fn redirect_to_route(&mut self, route: impl Into<RouteSpec>) -> WebResult<()> {
        self.redirect_to_route_with_status(route, StatusCode::FOUND)
    }

    pub fn redirect_to_route_with_status(
        &mut self,
        route: impl Into<RouteSpec>,
        status: StatusCode,
    ) -> WebResult<()> {
        self.do_not_render();
        let url = self.url.route(&route.into())?;
        self.redirect_with_status(url, status);
        Ok(())
    }

    /// Redirect to a route built on top of the current dispatch target and
    /// route parameters.
    pub fn redirect_from_here(&mut self, route: impl Into<RouteSpec>) -> WebResult<()> {
        self.redirect_from_here_with_status(route, StatusCode::FOUND)
    }

    pub fn redirect_from_here_with_status(
        &mut self,
        route: impl Into<RouteSpec>,
        status: StatusCode,
    ) -> WebResult<()> {
        self.do_not_render();
        let url = self.url.route_from_here(&route.into(), &self.dispatcher)?;
        self.redirect_with_status(url, status);
        Ok(())
    }

    /// Send plain-HTTP requests in production to the https URL with a 301.
    ///
    /// Returns `Err(WebError::Halted)` in that case; propagate it with `?`
    /// so nothing after the call runs.
    pub fn force_secure(&mut self) -> WebResult<()> {
        if !self.environment.is_production() || self.request.is_secure() {
            return Ok(());
        }

        self.do_not_render();
        let url = format!(
            "https://{}{}",
            self.request.http_host(),
            self.request.uri()
        );
        let target = RedirectTarget::permanent(url);
        self.response.redirect(target.clone());

        info!(location = %target.location, "Halting insecure request");
        Err(WebError::Halted(target))
    }

    /* Referrer storage */

    /// Remember the referrer in the session under `namespace`.
    ///
    /// An existing value is kept unless `loose` is set and the referrer is a
    /// different page than the current one.
    pub fn store_referrer(&self, namespace: &str, loose: bool) {
        let slot = referrer_namespace(namespace);
        let stored = self.session.get(&slot, REFERRER_KEY).is_some();
        let referrer = self.url.referrer();

        if !stored || (loose && referrer != Some(self.url.current())) {
            match referrer {
                Some(url) => {
                    debug!(namespace, referrer = url, "Storing referrer");
                    self.session.set(&slot, REFERRER_KEY, url);
                }
                None => {
                    self.session.remove(&slot, REFERRER_KEY);
                }
            }
        }
    }

    pub fn stored_referrer(&self, namespace: &str) -> Option<String> {
        self.session
            .get_str(&referrer_namespace(namespace), REFERRER_KEY)
    }

    pub fn clear_stored_referrer(&self, namespace: &str) {
        self.session
            .remove(&referrer_namespace(namespace), REFERRER_KEY);
    }

    /// Redirect to the stored referrer and forget it. A blank value falls
    /// back to `default_url`, then to the base URL.
    pub fn redirect_to_stored_referrer(&mut self, namespace: &str, default_url: Option<&str>) {
        let referrer = self.stored_referrer(namespace);
        self.clear_stored_referrer(namespace);

        let target = match referrer {
            Some(url) if !url.trim().is_empty() => url,
            _ => self.fallback_url(default_url),
        };
        self.redirect(target);
    }

    /// Redirect to the `Referer` header, else `default`, else the base URL.
    pub fn redirect_to_referrer(&mut self, default: Option<&str>) {
        let fallback = self.fallback_url(default);
        let target = self.url.referrer_or(&fallback);
        self.redirect(target);
    }

    fn fallback_url(&self, default: Option<&str>) -> String {
        default
            .filter(|url| !url.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.url.base_url().to_string())
    }

    /* Notifications */

    /// Queue a message for the next rendered page
    pub fn flash(&self, message: impl Into<String>, level: FlashLevel) {
        self.alert(message, level);
    }

    pub fn alert(&self, message: impl Into<String>, level: FlashLevel) {
        self.session.push_flash(message, level);
    }

    fn finish(self) -> WebResult<Response> {
        let Controller {
            views,
            dispatcher,
            url,
            session,
            view,
            response,
            ..
        } = self;

        if let Some(target) = response.redirect {
            return Ok(target.into_response());
        }

        let status = response.status;
        let content = match response.body {
            ResponseBody::Json(value) => return Ok((status, Json(value)).into_response()),
            ResponseBody::Content(content) => Some(content),
            ResponseBody::Empty => None,
        };

        if !view.is_disabled() {
            let picked = view.picked_template().map(str::to_string);
            let template = picked
                .clone()
                .unwrap_or_else(|| dispatcher.default_template());

            if views.has_template(&template) {
                let context = ViewContext {
                    template: template.clone(),
                    vars: view.into_vars(),
                    flash: session.take_flash(),
                    base_url: url.base_url().to_string(),
                    current_url: url.current().to_string(),
                };
                let html = views.render(&template, &context)?;
                return Ok((status, Html(html)).into_response());
            }

            if picked.is_some() {
                return Err(render_error("Template does not exist", &template));
            }
        }

        Ok(match content {
            Some(content) => (status, Html(content)).into_response(),
            None => status.into_response(),
        })
    }
}

impl IntoResponse for Controller {
    fn into_response(self) -> Response {
        match self.finish() {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }
}

impl FromRequest<AppState> for Controller {
    type Rejection = WebError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();

        let params: BTreeMap<String, String> =
            match RawPathParams::from_request_parts(&mut parts, state).await {
                Ok(raw) => raw
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect(),
                // no captures on this route
                Err(RawPathParamsRejection::MissingPathParams(_)) => BTreeMap::new(),
                Err(e) => {
                    return Err(WebError::BadRequest(format!(
                        "Invalid path parameter: {}",
                        e.body_text()
                    )))
                }
            };
        let action = parts.extensions.get::<ActionName>().cloned();
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(missing_session)?;

        let bytes = axum::body::to_bytes(body, state.config.body_limit)
            .await
            .map_err(|e| WebError::BadRequest(format!("Failed to read request body: {}", e)))?;
        let request = RequestContext::from_parts(
            &parts,
            &bytes,
            state.config.app.trust_forwarded_proto,
        )?;

        Ok(Controller::new(
            state,
            request,
            Dispatcher::new(params, action),
            session,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{session::MemorySessionStore, url_helper::RouteTable, WebConfig};
    use axum::{
        body::Body,
        http::{header, Request as HttpRequest},
    };
    use dfkit_core::DfError;
    use serde_json::json;

    struct StubViews;

    impl ViewRenderer for StubViews {
        fn has_template(&self, name: &str) -> bool {
            matches!(name, "index/index" | "account/login")
        }

        fn render(&self, name: &str, context: &ViewContext) -> WebResult<String> {
            Ok(format!(
                "{}|{}|{}",
                name,
                serde_json::Value::Object(context.vars.clone()),
                context.flash.len()
            ))
        }
    }

    fn state(environment: AppEnvironment) -> AppState {
        let mut config = WebConfig::default();
        config.app.environment = environment;
        AppState::with_parts(
            config,
            Arc::new(MemorySessionStore::default()),
            Arc::new(RouteTable::new().with("login", "/account/login")),
            Arc::new(StubViews),
        )
    }

    async fn controller_for(
        state: &AppState,
        request: HttpRequest<Body>,
        session: Session,
    ) -> Controller {
        let mut request = request;
        request.extensions_mut().insert(session);
        Controller::from_request(request, state).await.unwrap()
    }

    fn get(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .uri(uri)
            .header(header::HOST, "shop.test")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_param_lookup_order() {
        let state = state(AppEnvironment::Development);
        let ctl = controller_for(&state, get("/orders?id=query&page=2"), Session::fresh()).await;

        assert_eq!(ctl.param("page"), Some("2"));
        assert_eq!(ctl.param_or("missing", "fallback"), "fallback");
        assert_eq!(ctl.param_as::<u32>("page").unwrap(), Some(2));
        assert!(ctl.param_as::<u32>("id").is_err());
        assert!(ctl.has_param("id"));
        assert!(!ctl.has_param("missing"));
    }

    #[tokio::test]
    async fn test_empty_query_value_counts_as_present() {
        let state = state(AppEnvironment::Development);
        let ctl = controller_for(&state, get("/search?q="), Session::fresh()).await;

        assert_eq!(ctl.param("q"), Some(""));
        assert!(ctl.has_param("q"));
    }

    #[tokio::test]
    async fn test_redirect_disables_rendering() {
        let state = state(AppEnvironment::Development);
        let mut ctl = controller_for(&state, get("/"), Session::fresh()).await;

        ctl.redirect("/account/login");
        let response = ctl.into_response();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/account/login"
        );
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_redirect_to_route_uses_route_table() {
        let state = state(AppEnvironment::Development);
        let mut ctl = controller_for(&state, get("/"), Session::fresh()).await;

        ctl.redirect_to_route_with_status("login", StatusCode::SEE_OTHER)
            .unwrap();
        let response = ctl.into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "http://shop.test/account/login"
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_error() {
        let state = state(AppEnvironment::Development);
        let mut ctl = controller_for(&state, get("/"), Session::fresh()).await;

        assert!(ctl.redirect_to_route("nowhere").is_err());
    }

    #[tokio::test]
    async fn test_render_json() {
        let state = state(AppEnvironment::Development);
        let mut ctl = controller_for(&state, get("/"), Session::fresh()).await;

        ctl.render_json(&json!({ "ok": true })).unwrap();
        let response = ctl.into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_string(response).await, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_default_template_rendered_with_flash() {
        let state = state(AppEnvironment::Development);
        let session = Session::fresh();
        session.push_flash("Saved", FlashLevel::Success);

        let mut ctl = controller_for(&state, get("/"), session.clone()).await;
        ctl.assign("title", "Home").unwrap();
        let body = body_string(ctl.into_response()).await;

        assert_eq!(body, r#"index/index|{"title":"Home"}|1"#);
        assert!(session.pending_flash().is_empty());
    }

    #[tokio::test]
    async fn test_missing_picked_template_is_error() {
        let state = state(AppEnvironment::Development);
        let mut ctl = controller_for(&state, get("/"), Session::fresh()).await;

        ctl.render(Some("nope/missing"));
        match ctl.finish() {
            Err(WebError::Core(DfError::Render { template, .. })) => {
                assert_eq!(template.as_deref(), Some("nope/missing"));
            }
            other => panic!("expected a render error, got {:?}", other.map(|r| r.status())),
        }

        let mut ctl = controller_for(&state, get("/"), Session::fresh()).await;
        ctl.render(Some("nope/missing"));
        assert_eq!(
            ctl.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_render_none_keeps_default_and_content_fallback() {
        let state = state(AppEnvironment::Development);
        let mut request = get("/orders");
        request
            .extensions_mut()
            .insert(ActionName::new("orders", "list"));
        let mut ctl = controller_for(&state, request, Session::fresh()).await;
        assert_eq!(ctl.dispatcher().default_template(), "orders/list");

        // no orders/list template: the raw content is sent
        ctl.render(None);
        ctl.set_content("<p>orders</p>");
        ctl.set_status(StatusCode::ACCEPTED);
        let response = ctl.into_response();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_string(response).await, "<p>orders</p>");
    }

    #[tokio::test]
    async fn test_force_secure_in_production() {
        let state = state(AppEnvironment::Production);
        let mut ctl = controller_for(&state, get("/account/settings?tab=2"), Session::fresh()).await;

        let result = ctl.force_secure();
        match result {
            Err(WebError::Halted(target)) => {
                assert_eq!(target.status, StatusCode::MOVED_PERMANENTLY);
                assert_eq!(target.location, "https://shop.test/account/settings?tab=2");
            }
            _ => panic!("expected the request to halt"),
        }
    }

    #[tokio::test]
    async fn test_force_secure_is_noop_outside_production() {
        let state = state(AppEnvironment::Development);
        let mut ctl = controller_for(&state, get("/account/settings"), Session::fresh()).await;

        assert!(ctl.force_secure().is_ok());
        assert_eq!(ctl.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_store_referrer_strict_and_loose() {
        let state = state(AppEnvironment::Development);
        let session = Session::fresh();
        let with_referer = |referer: &str| {
            HttpRequest::builder()
                .uri("/account/login")
                .header(header::HOST, "shop.test")
                .header(header::REFERER, referer)
                .body(Body::empty())
                .unwrap()
        };

        let ctl = controller_for(&state, with_referer("http://shop.test/cart"), session.clone()).await;
        ctl.store_referrer("login", false);
        assert_eq!(ctl.stored_referrer("login").as_deref(), Some("http://shop.test/cart"));

        // strict mode keeps the first value
        let ctl = controller_for(&state, with_referer("http://shop.test/catalog"), session.clone()).await;
        ctl.store_referrer("login", false);
        assert_eq!(ctl.stored_referrer("login").as_deref(), Some("http://shop.test/cart"));

        // loose mode ignores a reload of the same page
        let ctl = controller_for(&state, with_referer("http://shop.test/account/login"), session.clone()).await;
        ctl.store_referrer("login", true);
        assert_eq!(ctl.stored_referrer("login").as_deref(), Some("http://shop.test/cart"));

        // loose mode overwrites with a different page
        let ctl = controller_for(&state, with_referer("http://shop.test/catalog"), session.clone()).await;
        ctl.store_referrer("login", true);
        assert_eq!(ctl.stored_referrer("login").as_deref(), Some("http://shop.test/catalog"));
        assert!(ctl.stored_referrer(DEFAULT_REFERRER_NAMESPACE).is_none());
    }

    #[tokio::test]
    async fn test_redirect_to_stored_referrer_clears_slot() {
        let state = state(AppEnvironment::Development);
        let session = Session::fresh();
        session.set("referrer_checkout", "url", "http://shop.test/cart");

        let mut ctl = controller_for(&state, get("/account/login"), session.clone()).await;
        ctl.redirect_to_stored_referrer("checkout", None);
        let response = ctl.into_response();

        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "http://shop.test/cart"
        );
        assert!(session.get("referrer_checkout", "url").is_none());
    }

    #[tokio::test]
    async fn test_redirect_to_stored_referrer_fallbacks() {
        let state = state(AppEnvironment::Development);
        let session = Session::fresh();
        session.set("referrer_default", "url", "   ");

        let mut ctl = controller_for(&state, get("/"), session.clone()).await;
        ctl.redirect_to_stored_referrer(DEFAULT_REFERRER_NAMESPACE, Some("/orders"));
        assert_eq!(
            ctl.into_response().headers().get(header::LOCATION).unwrap(),
            "/orders"
        );

        let mut ctl = controller_for(&state, get("/"), session).await;
        ctl.redirect_to_stored_referrer(DEFAULT_REFERRER_NAMESPACE, None);
        assert_eq!(
            ctl.into_response().headers().get(header::LOCATION).unwrap(),
            "http://shop.test"
        );
    }

    #[tokio::test]
    async fn test_redirect_to_referrer() {
        let state = state(AppEnvironment::Development);
        let request = HttpRequest::builder()
            .uri("/back")
            .header(header::HOST, "shop.test")
            .header(header::REFERER, "http://shop.test/catalog")
            .body(Body::empty())
            .unwrap();

        let mut ctl = controller_for(&state, request, Session::fresh()).await;
        ctl.redirect_to_referrer(Some("/elsewhere"));
        assert_eq!(
            ctl.into_response().headers().get(header::LOCATION).unwrap(),
            "http://shop.test/catalog"
        );

        let mut ctl = controller_for(&state, get("/back"), Session::fresh()).await;
        ctl.redirect_to_referrer(None);
        assert_eq!(
            ctl.into_response().headers().get(header::LOCATION).unwrap(),
            "http://shop.test"
        );
    }

    #[tokio::test]
    async fn test_flash_and_alert_share_queue() {
        let state = state(AppEnvironment::Development);
        let session = Session::fresh();
        let ctl = controller_for(&state, get("/"), session.clone()).await;

        ctl.flash("Saved", FlashLevel::Success);
        ctl.alert("Careful", FlashLevel::Warning);

        let pending = session.pending_flash();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].message, "Careful");
    }

    #[tokio::test]
    async fn test_missing_session_is_rejected() {
        let state = state(AppEnvironment::Development);
        let result = Controller::from_request(get("/"), &state).await;
        assert!(matches!(
            result,
            Err(WebError::Core(DfError::Session { .. }))
        ));
    }
}
