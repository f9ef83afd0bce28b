//! Template system for server-side rendering
//!
//! Askama templates for the bundled pages, looked up by `<controller>/<action>`
//! name through [`TemplateRegistry`].

use crate::{
    view::{render_error, ViewContext, ViewRenderer},
    WebResult,
};
use askama::Template;
use dfkit_core::FlashMessage;

/// Home page template
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub title: String,
    pub base_url: String,
    pub user: String,
    pub flash: Vec<FlashMessage>,
    pub version: String,
}

/// Login form template
#[derive(Template)]
#[template(path = "account/login.html")]
pub struct LoginTemplate {
    pub title: String,
    pub base_url: String,
    pub user: String,
    pub flash: Vec<FlashMessage>,
    pub username: String,
    pub action_url: String,
}

/// Account settings template
#[derive(Template)]
#[template(path = "account/settings.html")]
pub struct SettingsTemplate {
    pub title: String,
    pub base_url: String,
    pub user: String,
    pub flash: Vec<FlashMessage>,
}

impl IndexTemplate {
    pub fn new(context: &ViewContext) -> Self {
        Self {
            title: "dfkit".to_string(),
            base_url: context.base_url.clone(),
            user: context.str_var("user"),
            flash: context.flash.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl LoginTemplate {
    pub fn new(context: &ViewContext) -> Self {
        Self {
            title: "Sign in - dfkit".to_string(),
            base_url: context.base_url.clone(),
            user: context.str_var("user"),
            flash: context.flash.clone(),
            username: context.str_var("username"),
            action_url: format!("{}/account/login", context.base_url),
        }
    }
}

impl SettingsTemplate {
    pub fn new(context: &ViewContext) -> Self {
        Self {
            title: "Settings - dfkit".to_string(),
            base_url: context.base_url.clone(),
            user: context.str_var("user"),
            flash: context.flash.clone(),
        }
    }
}

/// Maps template names to the askama templates above
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry;

impl TemplateRegistry {
    pub const NAMES: [&'static str; 3] = ["index/index", "account/login", "account/settings"];

    pub fn new() -> Self {
        Self
    }
}

impl ViewRenderer for TemplateRegistry {
    fn has_template(&self, name: &str) -> bool {
        Self::NAMES.contains(&name)
    }

    fn render(&self, name: &str, context: &ViewContext) -> WebResult<String> {
        let rendered = match name {
            "index/index" => IndexTemplate::new(context).render(),
            "account/login" => LoginTemplate::new(context).render(),
            "account/settings" => SettingsTemplate::new(context).render(),
            _ => return Err(render_error("Unknown template", name)),
        };

        rendered.map_err(|e| render_error(format!("Failed to render: {}", e), name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfkit_core::FlashLevel;
    use serde_json::{json, Map};

    fn context(template: &str) -> ViewContext {
        let mut vars = Map::new();
        vars.insert("user".to_string(), json!("ada"));
        ViewContext {
            template: template.to_string(),
            vars,
            flash: vec![FlashMessage::new("Signed in <b>", FlashLevel::Error)],
            base_url: "http://shop.test".to_string(),
            current_url: "http://shop.test/".to_string(),
        }
    }

    #[test]
    fn test_registered_templates_render() {
        let registry = TemplateRegistry::new();
        for name in TemplateRegistry::NAMES {
            assert!(registry.has_template(name));
            let html = registry.render(name, &context(name)).unwrap();
            assert!(html.contains("ada"), "{} should show the user", name);
        }
        assert!(!registry.has_template("orders/list"));
        assert!(registry.render("orders/list", &context("orders/list")).is_err());
    }

    #[test]
    fn test_flash_is_escaped_with_css_class() {
        let html = TemplateRegistry::new()
            .render("index/index", &context("index/index"))
            .unwrap();
        assert!(html.contains("flash-danger"));
        assert!(html.contains("Signed in"));
        assert!(!html.contains("<b>"));
    }
}
