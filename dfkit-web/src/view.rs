//! View layer: which template to render and with what variables

use crate::{WebError, WebResult};
use dfkit_core::{DfError, ErrorContext, FlashMessage};
use serde::Serialize;
use serde_json::{Map, Value};

/// Rendering decisions taken by the controller
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    template: Option<String>,
    disabled: bool,
    vars: Map<String, Value>,
}

impl ViewState {
    /// Use `template` instead of the dispatcher's default
    pub fn pick(&mut self, template: impl Into<String>) {
        self.template = Some(template.into());
    }

    pub fn disable(&mut self) {
        self.disabled = true;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn picked_template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: Value) {
        self.vars.insert(key.into(), value);
    }

    pub fn var(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn into_vars(self) -> Map<String, Value> {
        self.vars
    }
}

/// Everything a template receives
#[derive(Debug, Clone, Serialize)]
pub struct ViewContext {
    pub template: String,
    pub vars: Map<String, Value>,
    pub flash: Vec<FlashMessage>,
    pub base_url: String,
    pub current_url: String,
}

impl ViewContext {
    /// String variable, or empty when unset or not a string
    pub fn str_var(&self, key: &str) -> String {
        match self.vars.get(key) {
            Some(Value::String(value)) => value.clone(),
            _ => String::new(),
        }
    }

    pub fn bool_var(&self, key: &str) -> bool {
        matches!(self.vars.get(key), Some(Value::Bool(true)))
    }
}

/// Template backend used by controllers
pub trait ViewRenderer: Send + Sync {
    fn has_template(&self, name: &str) -> bool;

    fn render(&self, name: &str, context: &ViewContext) -> WebResult<String>;
}

/// Render failure for `template`
pub fn render_error(message: impl Into<String>, template: &str) -> WebError {
    WebError::Core(DfError::Render {
        message: message.into(),
        template: Some(template.to_string()),
        context: ErrorContext::new("view")
            .with_operation("render")
            .with_metadata("template", template),
    })
}
