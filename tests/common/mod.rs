#![allow(dead_code)]

use async_trait::async_trait;
use once_cell::sync::Lazy;
use relay::app::App;
use relay::constants::credentials as names;
use relay::errors::UpstreamError;
use relay::mcp::content::ToolResult;
use relay::services::config::Config;
use relay::services::credentials::{CredentialStore, MemoryCredentialStore};
use relay::services::logger::{LogLevel, Logger};
use relay::services::upstream::{Upstream, UpstreamRequest};
use reqwest::Method;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

pub static ENV_LOCK: Lazy<AsyncMutex<()>> = Lazy::new(|| AsyncMutex::new(()));

pub const TOKEN: &str = "test-token";

pub fn tmp_dir(prefix: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()))
}

pub fn quiet_logger() -> Logger {
    Logger::with_level("test", LogLevel::Error)
}

pub fn test_config() -> Config {
    Config {
        tasks_base_url: "https://tasks.test/api".to_string(),
        calendar_base_url: "https://calendar.test/v3".to_string(),
        graphql_endpoint: "https://graph.test/graphql".to_string(),
        weather_base_url: "https://weather.test/data/2.5".to_string(),
        weather_api_key: Some("weather-key".to_string()),
        ..Config::default()
    }
}

pub fn stocked_store() -> Arc<dyn CredentialStore> {
    Arc::new(
        MemoryCredentialStore::new()
            .with_token(names::TASKS_SERVICE, names::TASKS_ACCOUNT, TOKEN)
            .with_token(names::CALENDAR_SERVICE, names::CALENDAR_ACCOUNT, TOKEN)
            .with_token(names::GRAPHQL_SERVICE, names::GRAPHQL_ACCOUNT, TOKEN),
    )
}

pub fn build_app(config: Config, store: Arc<dyn CredentialStore>, upstream: Arc<FakeUpstream>) -> App {
    App::initialize(quiet_logger(), Arc::new(config), store, upstream).expect("app")
}

pub fn app_with(upstream: Arc<FakeUpstream>) -> App {
    build_app(test_config(), stocked_store(), upstream)
}

pub fn text(result: &ToolResult) -> String {
    result.joined_text()
}

struct Route {
    method: Method,
    path: String,
    replies: VecDeque<Result<Value, UpstreamError>>,
}

/// Scripted upstream. Routes match on method and URL path; the last reply of a
/// route repeats. Every request is recorded in arrival order.
#[derive(Default)]
pub struct FakeUpstream {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<UpstreamRequest>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn on(&self, method: Method, path: &str, reply: Result<Value, UpstreamError>) -> &Self {
        let mut routes = self.routes.lock().expect("routes");
        match routes
            .iter_mut()
            .find(|route| route.method == method && route.path == path)
        {
            Some(route) => route.replies.push_back(reply),
            None => routes.push(Route {
                method,
                path: path.to_string(),
                replies: VecDeque::from([reply]),
            }),
        }
        self
    }

    pub fn ok(&self, method: Method, path: &str, body: Value) -> &Self {
        self.on(method, path, Ok(body))
    }

    pub fn http_error(&self, method: Method, path: &str, status: u16, body: &str) -> &Self {
        self.on(
            method,
            path,
            Err(UpstreamError::Http {
                status,
                body: body.to_string(),
            }),
        )
    }

    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().expect("requests").clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().iter().map(|req| path_of(&req.url)).collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

fn path_of(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<Value, UpstreamError> {
        self.requests.lock().expect("requests").push(request.clone());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let path = path_of(&request.url);
        let mut routes = self.routes.lock().expect("routes");
        let Some(route) = routes
            .iter_mut()
            .find(|route| route.method == request.method && route.path == path)
        else {
            return Err(UpstreamError::Http {
                status: 404,
                body: format!("no fixture for {} {}", request.method, path),
            });
        };
        if route.replies.len() > 1 {
            route.replies.pop_front().expect("reply")
        } else {
            route.replies.front().cloned().expect("reply")
        }
    }
}
