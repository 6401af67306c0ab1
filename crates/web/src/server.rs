//! Web server implementation

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use viewkit_common::markup::escape_html;
use viewkit_common::{render_collection, Markup, OptionSet, SampleButton};

use crate::config::WebConfig;
use crate::layout::{error_page, page};
use crate::preview::{PreviewError, PreviewRegistry};
use crate::previews;

/// Web server state
#[derive(Clone)]
pub struct WebServer {
    state: Arc<WebServerState>,
}

struct WebServerState {
    cfg: WebConfig,
    previews: PreviewRegistry,
}

pub async fn serve(cfg: WebConfig) -> anyhow::Result<()> {
    let addr = cfg.listen;
    WebServer::new(cfg).serve(addr).await
}

impl WebServer {
    /// Create a new web server with the shipped previews
    pub fn new(cfg: WebConfig) -> Self {
        Self::with_previews(cfg, previews::registry())
    }

    pub fn with_previews(cfg: WebConfig, previews: PreviewRegistry) -> Self {
        Self {
            state: Arc::new(WebServerState { cfg, previews }),
        }
    }

    pub fn config(&self) -> &WebConfig {
        &self.state.cfg
    }

    /// Create router
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/sample", get(sample_handler));

        if self.state.cfg.previews.enabled {
            router = router
                .route("/previews", get(preview_index_handler))
                .route("/previews/:component/:scenario", get(preview_handler));
        }

        router
            .fallback(not_found_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the web server
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener).await
    }

    /// Serve on an already-bound listener
    pub async fn serve_listener(self, listener: TcpListener) -> anyhow::Result<()> {
        info!("Web server listening on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

impl Default for WebServer {
    fn default() -> Self {
        Self::new(WebConfig::default())
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "viewkit-web"
    }))
}

async fn sample_handler(State(state): State<Arc<WebServerState>>) -> Response {
    let sample = &state.cfg.sample;

    match render_collection::<SampleButton>(&sample.buttons) {
        Ok(buttons) => {
            let body = Markup::from_trusted(format!(
                "<h1>{}</h1>\n<div class=\"card\" id=\"samples\">{}</div>",
                escape_html(&sample.title),
                Markup::concat(&buttons)
            ));
            Html(page(&sample.title, &body).into_string()).into_response()
        }
        Err(e) => {
            error!(error = %e, "sample page render failed");
            html_error(StatusCode::INTERNAL_SERVER_ERROR, "Render failed", &e.to_string())
        }
    }
}

async fn preview_index_handler(State(state): State<Arc<WebServerState>>) -> Response {
    let mut body = String::from("<h1>Previews</h1>\n");

    for (component, scenarios) in state.previews.components() {
        body.push_str(&format!(
            "<div class=\"card preview-component\" id=\"{id}\">\n<h2>{id}</h2>\n<ul>\n",
            id = escape_html(component)
        ));
        for scenario in scenarios {
            let params = scenario
                .params
                .iter()
                .map(|p| format!("<code>{}</code>", escape_html(p.name)))
                .collect::<Vec<_>>()
                .join(" ");
            body.push_str(&format!(
                "<li><a class=\"preview-link\" href=\"/previews/{component}/{name}\">{name}</a> <span class=\"hint\">{description}</span> {params}</li>\n",
                component = escape_html(component),
                name = escape_html(scenario.name),
                description = escape_html(scenario.description),
                params = params,
            ));
        }
        body.push_str("</ul>\n</div>\n");
    }

    Html(page("Previews", &Markup::from_trusted(body)).into_string()).into_response()
}

async fn preview_handler(
    State(state): State<Arc<WebServerState>>,
    Path((component, scenario)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let overrides: OptionSet = params.into_iter().collect();

    match state.previews.preview(&component, &scenario, &overrides) {
        Ok(markup) => {
            let class = state
                .cfg
                .previews
                .container_class
                .as_deref()
                .map(|c| format!(" class=\"{}\"", escape_html(c)))
                .unwrap_or_default();
            let body = Markup::from_trusted(format!(
                "<div data-preview=\"{}/{}\"{}>{}</div>",
                escape_html(&component),
                escape_html(&scenario),
                class,
                markup
            ));
            let title = format!("{} / {}", component, scenario);
            Html(page(&title, &body).into_string()).into_response()
        }
        Err(e) => {
            let status = match &e {
                PreviewError::UnknownComponent(_) | PreviewError::UnknownScenario { .. } => {
                    StatusCode::NOT_FOUND
                }
                PreviewError::Render(_) => StatusCode::UNPROCESSABLE_ENTITY,
                PreviewError::Panicked { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            html_error(status, "Preview failed", &e.to_string())
        }
    }
}

async fn not_found_handler(uri: Uri) -> Response {
    html_error(StatusCode::NOT_FOUND, "Not found", uri.path())
}

fn html_error(status: StatusCode, title: &str, message: &str) -> Response {
    (status, Html(error_page(title, message).into_string())).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use viewkit_common::markup::{expect_css_count, expect_text};

    async fn get(router: Router, uri: &str) -> (StatusCode, Markup) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, Markup::from_trusted(String::from_utf8(bytes.to_vec()).unwrap()))
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get(WebServer::default().router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_str().contains("\"status\":\"ok\""));
    }

    #[tokio::test]
    async fn test_sample_page_renders_buttons_in_order() {
        let (status, body) = get(WebServer::default().router(), "/sample").await;
        assert!(status.is_success());
        assert!(expect_css_count(&body, "#samples div.sample-button", 2).is_ok());

        let buttons = body.select("div.sample-button").unwrap();
        assert_eq!(buttons[0].attr("data-counter"), Some("1"));
        assert_eq!(buttons[1].attr("data-counter"), Some("2"));
        assert!(expect_text(&body, "div.sample-button a", "Click me").is_ok());
    }

    #[tokio::test]
    async fn test_sample_page_with_invalid_button_fails_cleanly() {
        let mut cfg = WebConfig::default();
        cfg.sample.buttons.push(OptionSet::new().with("url", "/broken"));

        let (status, body) = get(WebServer::new(cfg).router(), "/sample").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.as_str().contains("text"));
    }

    #[tokio::test]
    async fn test_preview_defaults() {
        let (status, body) = get(WebServer::default().router(), "/previews/SampleButton/default").await;
        assert_eq!(status, StatusCode::OK);
        assert!(expect_text(&body, "[data-preview] a", "Click me").is_ok());
        assert_eq!(body.select("[data-preview] a").unwrap()[0].attr("href"), Some("#"));
    }

    #[tokio::test]
    async fn test_preview_overrides_from_query() {
        let (status, body) = get(
            WebServer::default().router(),
            "/previews/SampleButton/default?text=Buy%20now&url=%2Fcheckout",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(expect_text(&body, "[data-preview] a", "Buy now").is_ok());
        assert_eq!(
            body.select("[data-preview] a").unwrap()[0].attr("href"),
            Some("/checkout")
        );
    }

    #[tokio::test]
    async fn test_preview_container_class() {
        let mut cfg = WebConfig::default();
        cfg.previews.container_class = Some("w-1/2 border".to_string());

        let (_, body) = get(WebServer::new(cfg).router(), "/previews/SampleButton/default").await;
        let container = &body.select("[data-preview]").unwrap()[0];
        assert!(container.has_class("border"));
    }

    #[tokio::test]
    async fn test_unknown_preview_is_not_found() {
        let (status, _) = get(WebServer::default().router(), "/previews/SampleButton/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get(WebServer::default().router(), "/previews/Nope/default").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_preview_index_lists_scenarios() {
        let (status, body) = get(WebServer::default().router(), "/previews").await;
        assert_eq!(status, StatusCode::OK);
        let links = body.select("#SampleButton a.preview-link").unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].attr("href"), Some("/previews/SampleButton/default"));
    }

    #[tokio::test]
    async fn test_previews_can_be_disabled() {
        let mut cfg = WebConfig::default();
        cfg.previews.enabled = false;

        let (status, _) = get(WebServer::new(cfg).router(), "/previews/SampleButton/default").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_fallback() {
        let (status, body) = get(WebServer::default().router(), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("p.error"));
    }
}
