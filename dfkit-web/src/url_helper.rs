//! URL building: named routes, conventional `/controller/action` paths,
//! the current URL and the HTTP referrer.

use crate::dispatcher::{Dispatcher, DEFAULT_ACTION, DEFAULT_CONTROLLER, DEFAULT_MODULE};
use crate::request::RequestContext;
use crate::WebResult;
use dfkit_core::{DfConfig, DfError, DfResult, ErrorContext};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Description of a route to build a URL for.
///
/// With a `name`, the pattern registered in the [`RouteTable`] is used.
/// Without one, the URL follows `/<module>/<controller>/<action>/<key>/<value>`,
/// leaving out the default module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSpec {
    pub name: Option<String>,
    pub module: Option<String>,
    pub controller: Option<String>,
    pub action: Option<String>,
    pub params: BTreeMap<String, String>,
}

impl RouteSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn action(controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            controller: Some(controller.into()),
            action: Some(action.into()),
            ..Self::default()
        }
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }
}

impl From<&str> for RouteSpec {
    fn from(name: &str) -> Self {
        RouteSpec::named(name)
    }
}

impl From<String> for RouteSpec {
    fn from(name: String) -> Self {
        RouteSpec::named(name)
    }
}

/// Named route patterns such as `/orders/{id}`
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, String>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.insert(name, pattern);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, pattern: impl Into<String>) {
        self.routes.insert(name.into(), pattern.into());
    }

    pub fn pattern(&self, name: &str) -> Option<&str> {
        self.routes.get(name).map(String::as_str)
    }

    /// Build the path for a named route.
    ///
    /// Placeholders are filled from `params`; parameters the pattern does
    /// not use are appended as a query string.
    pub fn build(&self, name: &str, params: &BTreeMap<String, String>) -> DfResult<String> {
        let pattern = self
            .pattern(name)
            .ok_or_else(|| url_error(format!("Unknown route '{}'", name), None))?;

        let mut path = String::with_capacity(pattern.len());
        let mut used = BTreeSet::new();
        let mut rest = pattern;

        while let Some(start) = rest.find('{') {
            path.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after.find('}').ok_or_else(|| {
                url_error(
                    format!("Unterminated placeholder in route '{}'", name),
                    Some(pattern),
                )
            })?;

            let key = &after[..end];
            let value = params.get(key).ok_or_else(|| {
                url_error(
                    format!("Missing parameter '{}' for route '{}'", key, name),
                    Some(pattern),
                )
            })?;
            path.push_str(&urlencoding::encode(value));
            used.insert(key);
            rest = &after[end + 1..];
        }
        path.push_str(rest);

        let query: Vec<String> = params
            .iter()
            .filter(|(key, _)| !used.contains(key.as_str()))
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .collect();
        if !query.is_empty() {
            path.push('?');
            path.push_str(&query.join("&"));
        }

        Ok(path)
    }
}

fn url_error(message: String, url: Option<&str>) -> DfError {
    DfError::Url {
        message,
        url: url.map(str::to_string),
        context: ErrorContext::new("url").with_operation("route"),
    }
}

fn conventional_path(spec: &RouteSpec) -> String {
    let module = spec.module.as_deref().unwrap_or(DEFAULT_MODULE);
    let controller = spec.controller.as_deref().unwrap_or(DEFAULT_CONTROLLER);
    let action = spec.action.as_deref().unwrap_or(DEFAULT_ACTION);

    if module == DEFAULT_MODULE
        && controller == DEFAULT_CONTROLLER
        && action == DEFAULT_ACTION
        && spec.params.is_empty()
    {
        return "/".to_string();
    }

    let mut segments = Vec::new();
    if module != DEFAULT_MODULE {
        segments.push(urlencoding::encode(module).into_owned());
    }
    segments.push(urlencoding::encode(controller).into_owned());
    segments.push(urlencoding::encode(action).into_owned());
    for (key, value) in &spec.params {
        segments.push(urlencoding::encode(key).into_owned());
        segments.push(urlencoding::encode(value).into_owned());
    }

    format!("/{}", segments.join("/"))
}

/// URL helper bound to one request
#[derive(Debug, Clone)]
pub struct UrlHelper {
    base_url: String,
    current: String,
    referrer: Option<String>,
    routes: Arc<RouteTable>,
}

impl UrlHelper {
    pub fn new(
        base_url: impl Into<String>,
        current: impl Into<String>,
        referrer: Option<String>,
        routes: Arc<RouteTable>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            current: current.into(),
            referrer,
            routes,
        }
    }

    /// Base URL comes from configuration, else from the request's scheme and host.
    pub fn from_request(
        config: &DfConfig,
        request: &RequestContext,
        routes: Arc<RouteTable>,
    ) -> Self {
        let origin = format!("{}://{}", request.scheme(), request.http_host());
        let base_url = config
            .base_url()
            .map(str::to_string)
            .unwrap_or_else(|| origin.clone());
        let current = format!("{}{}", origin, request.uri());

        Self::new(
            base_url,
            current,
            request.referer().map(str::to_string),
            routes,
        )
    }

    /// Site base URL, without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of the current request
    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref()
    }

    pub fn referrer_or(&self, default: &str) -> String {
        self.referrer
            .clone()
            .unwrap_or_else(|| default.to_string())
    }

    /// Prefix a site-relative path with the base URL; absolute URLs pass through.
    pub fn absolute(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Absolute URL for a route
    pub fn route(&self, spec: &RouteSpec) -> WebResult<String> {
        let path = match &spec.name {
            Some(name) => self.routes.build(name, &spec.params)?,
            None => conventional_path(spec),
        };
        Ok(self.absolute(&path))
    }

    /// Like [`route`](Self::route), with the current dispatch target and
    /// route parameters filling whatever `spec` leaves unset.
    pub fn route_from_here(&self, spec: &RouteSpec, dispatcher: &Dispatcher) -> WebResult<String> {
        let mut params = dispatcher.route_params();
        params.extend(spec.params.clone());

        let merged = RouteSpec {
            name: spec.name.clone(),
            module: spec
                .module
                .clone()
                .or_else(|| Some(dispatcher.module().to_string())),
            controller: spec
                .controller
                .clone()
                .or_else(|| Some(dispatcher.controller().to_string())),
            action: spec
                .action
                .clone()
                .or_else(|| Some(dispatcher.action().to_string())),
            params,
        };

        self.route(&merged)
    }
}
