//! Integration test helpers
//!
//! Spawns the demo application on a random port and talks to it with a
//! cookie-keeping client that does not follow redirects.

#![allow(dead_code)]

use dfkit_web::{AppEnvironment, WebConfig};
use std::sync::LazyLock;
use tokio::net::TcpListener;

// tracing is initialised once per test binary
static TRACING: LazyLock<()> = LazyLock::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(std::io::sink)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
});

/// Running test application
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_with_referer(&self, path: &str, referer: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("Referer", referer)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_ajax<Body>(&self, path: &str, body: &Body) -> reqwest::Response
    where
        Body: serde::Serialize,
    {
        self.client
            .post(self.url(path))
            .header("X-Requested-With", "XMLHttpRequest")
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

pub fn test_config(environment: AppEnvironment) -> WebConfig {
    let mut config = WebConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        dev_mode: true,
        ..WebConfig::default()
    };
    config.app.environment = environment;
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config(AppEnvironment::Development)).await
}

pub async fn spawn_app_with(config: WebConfig) -> TestApp {
    LazyLock::force(&TRACING);

    let state = dfkit_web::AppState::new(config).unwrap();
    let app = dfkit_web::create_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .cookie_store(true)
        .build()
        .unwrap();

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        port,
        client,
    }
}

/// Assert a redirect with the given status and `Location`
pub fn assert_redirect(response: &reqwest::Response, status: u16, location: &str) {
    assert_eq!(response.status().as_u16(), status);
    assert_eq!(
        response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok()),
        Some(location)
    );
}
