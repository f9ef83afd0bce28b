//! Route dispatch information for the current request

use std::collections::BTreeMap;

pub const DEFAULT_MODULE: &str = "default";
pub const DEFAULT_CONTROLLER: &str = "index";
pub const DEFAULT_ACTION: &str = "index";

/// Captures that name the dispatch target instead of carrying a parameter
const RESERVED_PARAMS: [&str; 3] = ["module", "controller", "action"];

/// Module/controller/action a route is served by.
///
/// Attach it to a route with `axum::Extension`:
///
/// ```ignore
/// .route("/account/login", get(login).layer(Extension(ActionName::new("account", "login"))))
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionName {
    pub module: String,
    pub controller: String,
    pub action: String,
}

impl ActionName {
    pub fn new(controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self::in_module(DEFAULT_MODULE, controller, action)
    }

    pub fn in_module(
        module: impl Into<String>,
        controller: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            controller: controller.into(),
            action: action.into(),
        }
    }
}

/// Resolved dispatch target plus route parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatcher {
    module: String,
    controller: String,
    action: String,
    params: BTreeMap<String, String>,
}

impl Dispatcher {
    /// Names come from `action` when given, otherwise from captures named
    /// `module`, `controller` and `action`, otherwise from the defaults.
    pub fn new(params: BTreeMap<String, String>, action: Option<ActionName>) -> Self {
        let capture = |key: &str, default: &str| {
            params
                .get(key)
                .filter(|value| !value.is_empty())
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        let (module, controller, action) = match action {
            Some(name) => (name.module, name.controller, name.action),
            None => (
                capture("module", DEFAULT_MODULE),
                capture("controller", DEFAULT_CONTROLLER),
                capture("action", DEFAULT_ACTION),
            ),
        };

        Self {
            module,
            controller,
            action,
            params,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn controller(&self) -> &str {
        &self.controller
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Route parameters other than the dispatch target names
    pub fn route_params(&self) -> BTreeMap<String, String> {
        self.params
            .iter()
            .filter(|(key, _)| !RESERVED_PARAMS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Template rendered when the action does not pick one
    pub fn default_template(&self) -> String {
        format!("{}/{}", self.controller, self.action)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(BTreeMap::new(), None)
    }
}
