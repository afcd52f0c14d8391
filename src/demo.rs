//! Built-in demonstration engine.
//!
//! Serves a handful of pages exercising every trust-boundary service:
//! - `GET /` visit counter, flash message, CSRF-protected form, cached fragment
//! - `POST /message` stores a flash message and redirects home
//! - `POST /logout` clears the session
//! - `GET /api/record` returns a signed literal
//! - `GET|POST /api/echo` shows the decoded props

use std::time::Duration;

use axum::http::Method;
use serde_json::json;

use crate::http::engine::{EngineError, ScriptContext, ScriptEngine, ScriptRequest, ScriptResponse};
use crate::pln::PropValue;
use crate::security::csrf::{escape_html, CSRF_FIELD};

const FOOTER_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
pub struct DemoEngine;

impl DemoEngine {
    pub fn new() -> Self {
        Self
    }

    fn home(&self, ctx: &ScriptContext<'_>) -> ScriptResponse {
        let (visits, flash) = match ctx.session {
            Some(handle) => {
                let mut session = handle.lock();
                let visits = session.get("visits").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
                session.set("visits", visits);
                (Some(visits), session.get_flash("notice"))
            }
            None => (None, None),
        };

        let visits = match visits {
            Some(n) => format!("<p>Visits this session: {n}</p>"),
            None => "<p>Sessions are disabled.</p>".to_string(),
        };
        let flash = flash
            .map(|message| format!("<p class=\"flash\">{}</p>", escape_html(&message)))
            .unwrap_or_default();
        let csrf = ctx
            .csrf_token
            .map(|token| format!("<input type=\"hidden\" name=\"{CSRF_FIELD}\" value=\"{token}\">"))
            .unwrap_or_default();

        let footer = match ctx.fragments.get("footer") {
            Some(html) => html,
            None => {
                let html = format!("<footer>webguard {}</footer>", env!("CARGO_PKG_VERSION"));
                ctx.fragments.set("footer", html.clone(), FOOTER_TTL);
                html
            }
        };

        ScriptResponse::html(format!(
            "<!DOCTYPE html>\n<html><body>\n<h1>webguard</h1>\n{flash}{visits}\n\
             <form method=\"post\" action=\"/message\">{csrf}\
             <input name=\"message\"><button>Send</button></form>\n\
             <form method=\"post\" action=\"/logout\">{csrf}<button>Log out</button></form>\n\
             {footer}\n</body></html>\n"
        ))
    }

    fn message(&self, request: &ScriptRequest, ctx: &ScriptContext<'_>) -> ScriptResponse {
        if let Some(handle) = ctx.session {
            let text = request
                .prop("message")
                .and_then(PropValue::as_text)
                .unwrap_or("(empty)");
            handle.lock().flash("notice", text);
        }
        ScriptResponse::redirect("/")
    }

    fn logout(&self, ctx: &ScriptContext<'_>) -> ScriptResponse {
        if let Some(handle) = ctx.session {
            handle.lock().clear();
        }
        ScriptResponse::redirect("/")
    }

    fn record(&self, ctx: &ScriptContext<'_>) -> Result<ScriptResponse, EngineError> {
        let codec = ctx
            .literals
            .ok_or_else(|| EngineError::Script("signed literals are disabled".to_string()))?;
        Ok(ScriptResponse::json(json!({
            "record": codec.wrap("{id: 1, created: @2024-01-15}"),
        })))
    }

    fn echo(&self, request: &ScriptRequest) -> ScriptResponse {
        let props: serde_json::Map<String, serde_json::Value> = request
            .props
            .iter()
            .map(|(name, value)| (name.clone(), describe(value)))
            .collect();
        ScriptResponse::json(json!({
            "method": request.method.as_str(),
            "path": request.path(),
            "props": props,
        }))
    }
}

fn describe(value: &PropValue) -> serde_json::Value {
    match value {
        PropValue::Text(text) => json!({ "text": text }),
        PropValue::Json(json) => json!({ "json": json }),
        PropValue::Verified(payload) => json!({ "verified": payload }),
        PropValue::Object(map) => json!({
            "object": map.iter().map(|(k, v)| (k.clone(), describe(v))).collect::<serde_json::Map<_, _>>(),
        }),
        PropValue::List(items) => json!({ "list": items.iter().map(describe).collect::<Vec<_>>() }),
    }
}

impl ScriptEngine for DemoEngine {
    fn evaluate(&self, request: &ScriptRequest, ctx: &ScriptContext<'_>) -> Result<ScriptResponse, EngineError> {
        match (&request.method, request.path()) {
            (&Method::GET, "/") => Ok(self.home(ctx)),
            (&Method::POST, "/message") => Ok(self.message(request, ctx)),
            (&Method::POST, "/logout") => Ok(self.logout(ctx)),
            (&Method::GET, "/api/record") => self.record(ctx),
            (&Method::GET | &Method::POST, "/api/echo") => Ok(self.echo(request)),
            _ => Err(EngineError::NotFound),
        }
    }
}
