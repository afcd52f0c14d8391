//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::Method;
use tokio::net::TcpListener;

use webguard::config::{SecretString, ServerConfig};
use webguard::http::{
    AppState, EngineError, HttpServer, ScriptContext, ScriptEngine, ScriptRequest, ScriptResponse,
};
use webguard::lifecycle::Shutdown;
use webguard::pln::PropValue;

pub const SECRET: &str = "integration-test-secret";

/// Body size of `/large`, above the default request body limit.
pub const LARGE_BODY: usize = 3 * 1024 * 1024;

/// Engine with fixed pages and a counter of evaluations.
#[derive(Default)]
pub struct TestEngine {
    pub calls: AtomicUsize,
}

impl ScriptEngine for TestEngine {
    fn evaluate(&self, request: &ScriptRequest, ctx: &ScriptContext<'_>) -> Result<ScriptResponse, EngineError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match (&request.method, request.path()) {
            (&Method::GET, "/login") => {
                if let Some(session) = ctx.session {
                    session.lock().set("user_id", 42);
                }
                Ok(ScriptResponse::text("logged in"))
            }
            (&Method::GET, "/whoami") => {
                let user = ctx
                    .session
                    .and_then(|s| s.lock().get("user_id").and_then(|v| v.as_i64()))
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "anonymous".to_string());
                Ok(ScriptResponse::text(user))
            }
            (&Method::GET, "/form") => Ok(ScriptResponse::html(format!(
                "<form method=\"post\"><input type=\"hidden\" name=\"_csrf\" value=\"{}\"></form>",
                ctx.csrf_token.unwrap_or_default()
            ))),
            (&Method::POST, "/submit") => Ok(ScriptResponse::text("accepted")),
            (&Method::POST, "/upload") => {
                let title = request.prop("title").and_then(PropValue::as_text).unwrap_or("untitled");
                Ok(ScriptResponse::text(format!("uploaded {title}")))
            }
            (&Method::POST, "/logout") => {
                if let Some(session) = ctx.session {
                    session.lock().clear();
                }
                Ok(ScriptResponse::text("logged out"))
            }
            (&Method::GET, "/large") => Ok(ScriptResponse::text("x".repeat(LARGE_BODY))),
            (_, "/page") => Ok(ScriptResponse::html(format!("<p>render {n}</p>"))),
            (&Method::GET, "/boom") => Err(EngineError::Script("boom".to_string())),
            (&Method::GET, "/literal") => {
                let payload = request
                    .prop("record")
                    .and_then(PropValue::as_verified)
                    .unwrap_or("untrusted");
                Ok(ScriptResponse::text(payload))
            }
            _ => Err(EngineError::NotFound),
        }
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub engine: Arc<TestEngine>,
    pub state: AppState,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Serve `config` on an ephemeral port with the test engine.
pub async fn start_server(config: ServerConfig) -> TestServer {
    start_server_with_secret(config, Some(SecretString::new(SECRET))).await
}

pub async fn start_server_with_secret(config: ServerConfig, secret: Option<SecretString>) -> TestServer {
    let engine = Arc::new(TestEngine::default());
    let state = AppState::new(config, secret, engine.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(state.clone());
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestServer {
        addr,
        engine,
        state,
        shutdown,
    }
}

/// Client without proxies, redirects or a cookie jar.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// `name=value` of the first Set-Cookie for `name`.
pub fn set_cookie(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{name}=")))
        .map(str::to_string)
}
