use crate::render::{LinkMode, PageOptions, render_document};
use crate::{Catalog, Event, Topic};
use axum::{
    Json, Router,
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, info};

type SharedState = Arc<AppState>;

/// Loaded once at startup; every request clones `catalog` before applying
/// its own events.
pub struct AppState {
    pub catalog: Catalog,
    pub page: PageOptions,
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub title: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            title: PageOptions::default().title,
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(config: WebConfig, catalog: Catalog) -> Result<(), WebError> {
    info!(
        %config.addr,
        source = catalog.provenance().label(),
        topics = catalog.collection().len(),
        "Binding HTTP listener"
    );
    let state = Arc::new(AppState {
        catalog,
        page: PageOptions {
            title: config.title.clone(),
            link_mode: LinkMode::Query,
        },
    });
    let router = build_router(state);
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(page))
        .route("/api/topics", get(api_topics))
        .route("/api/topics/:id", get(api_topic))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// View state and at most one event, as carried by rendered links.
///
/// `open` repeats once per expanded block, so it is read from the raw query
/// rather than through `Query`.
#[derive(Debug, Default)]
struct PageParams {
    q: Option<String>,
    open: Vec<String>,
    toggle: Option<String>,
    focus: Option<String>,
}

impl PageParams {
    fn from_query(raw: Option<&str>) -> Self {
        let mut params = Self::default();
        let pairs = form_urlencoded::parse(raw.unwrap_or_default().as_bytes());
        for (key, value) in pairs {
            match key.as_ref() {
                "q" => params.q = Some(value.into_owned()),
                "open" => params.open.push(value.into_owned()),
                "toggle" => params.toggle = Some(value.into_owned()),
                "focus" => params.focus = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    fn event(&self) -> Option<Event> {
        self.toggle
            .clone()
            .map(Event::Toggle)
            .or_else(|| self.focus.clone().map(Event::Focus))
    }
}

fn restore_view(seed: &Catalog, params: &PageParams) -> Catalog {
    let mut catalog = seed.clone();
    if let Some(query) = params.q.as_deref() {
        catalog.filter(query);
    }
    for id in &params.open {
        if let Err(err) = catalog.expand(id) {
            debug!(%err, "Ignoring unknown open topic");
        }
    }
    if let Some(event) = params.event() {
        match catalog.dispatch(event) {
            Ok(effect) => debug!(?effect, "Applied page event"),
            Err(err) => debug!(%err, "Ignoring event for unknown topic"),
        }
    }
    catalog
}

async fn page(
    State(state): State<SharedState>,
    RawQuery(query): RawQuery,
) -> Result<Html<String>, ApiError> {
    let params = PageParams::from_query(query.as_deref());
    let catalog = restore_view(&state.catalog, &params);
    render_document(&catalog, &state.page)
        .map(Html)
        .map_err(|err| {
            error!(%err, "Failed to render catalog page");
            ApiError::internal("Failed to render catalog page")
        })
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

async fn api_topics(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<Topic>> {
    let query = params.q.as_deref().unwrap_or_default();
    let topics = state
        .catalog
        .collection()
        .search(query)
        .into_iter()
        .cloned()
        .collect();
    Json(topics)
}

async fn api_topic(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Topic>, ApiError> {
    state
        .catalog
        .collection()
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No topic with id {id:?}")))
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "topic-catalog",
        "source": state.catalog.provenance().label(),
        "topics": state.catalog.collection().len(),
    }))
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use crate::{TopicCollection, fallback_collection};
    use axum::{body, body::Body, http::Request};
    use tower::ServiceExt;

    fn test_router() -> Router {
        router_for(Catalog::new(fallback_collection()))
    }

    fn router_for(catalog: Catalog) -> Router {
        let state = Arc::new(AppState {
            catalog,
            page: PageOptions {
                title: "Electronics".to_string(),
                link_mode: LinkMode::Query,
            },
        });
        build_router(state)
    }

    async fn get_text(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn home_renders_all_topics_collapsed() {
        let (status, html) = get_text(test_router(), "/").await;
        assert!(status.is_success());
        assert_eq!(html.matches("class=\"topic-btn\"").count(), 3);
        assert!(!html.contains("course-list open"));
        assert!(html.contains("href=\"?focus=basics#topic-basics\""));
    }

    #[tokio::test]
    async fn focus_expands_single_block() {
        let uri = "/?open=analog&open=microcontrollers&focus=basics";
        let (_, html) = get_text(test_router(), uri).await;
        assert_eq!(html.matches("course-list open").count(), 1);
        assert!(html.contains("href=\"?open=basics&amp;toggle=analog#topic-analog\""));
    }

    #[tokio::test]
    async fn toggle_flips_block_from_link() {
        let (_, html) = get_text(test_router(), "/?open=analog&toggle=analog").await;
        assert!(!html.contains("course-list open"));
        let (_, html) = get_text(test_router(), "/?toggle=analog").await;
        assert_eq!(html.matches(">Close</span>").count(), 1);
    }

    #[tokio::test]
    async fn only_opening_links_carry_a_fragment() {
        let (_, html) = get_text(test_router(), "/?toggle=analog").await;
        assert!(html.contains("href=\"?open=analog&amp;toggle=analog\">"));
        assert!(html.contains("href=\"?open=analog&amp;toggle=basics#topic-basics\">"));
    }

    #[tokio::test]
    async fn open_ids_with_commas_survive_navigation() {
        let collection = TopicCollection::new(vec![
            Topic {
                id: "a,b".to_string(),
                name: "Comma".to_string(),
                description: "id with a comma".to_string(),
                links: Vec::new(),
            },
            Topic {
                id: "c".to_string(),
                name: "Plain".to_string(),
                description: "plain id".to_string(),
                links: Vec::new(),
            },
        ])
        .unwrap();
        let router = router_for(Catalog::new(collection));

        let (_, html) = get_text(router.clone(), "/?toggle=a%2Cb").await;
        assert_eq!(html.matches("course-list open").count(), 1);
        assert!(html.contains("href=\"?open=a%2Cb&amp;toggle=c#topic-c\""));

        let (_, html) = get_text(router, "/?open=a%2Cb&toggle=c").await;
        assert_eq!(html.matches("course-list open").count(), 2);
    }

    #[test]
    fn page_params_collect_every_open_value() {
        let params = PageParams::from_query(Some("q=ohm+law&open=a%2Cb&open=c&focus=c"));
        assert_eq!(params.q.as_deref(), Some("ohm law"));
        assert_eq!(params.open, ["a,b", "c"]);
        assert_eq!(params.event(), Some(Event::Focus("c".to_string())));
        assert!(PageParams::from_query(None).open.is_empty());
    }

    #[tokio::test]
    async fn search_query_hides_blocks() {
        let (_, html) = get_text(test_router(), "/?q=arduino").await;
        assert_eq!(html.matches("class=\"topic-btn\"").count(), 1);
        assert_eq!(html.matches("\" hidden>").count(), 2);
        assert!(html.contains("value=\"arduino\""));
    }

    #[tokio::test]
    async fn unknown_event_target_is_ignored() {
        let (status, html) = get_text(test_router(), "/?toggle=missing&open=nope").await;
        assert!(status.is_success());
        assert!(!html.contains("course-list open"));
    }

    #[tokio::test]
    async fn api_topics_filters_case_insensitively() {
        let (status, body) = get_text(test_router(), "/api/topics?q=OHM").await;
        assert!(status.is_success());
        let topics: Vec<Topic> = serde_json::from_str(&body).unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].id, "basics");
    }

    #[tokio::test]
    async fn api_topic_unknown_is_not_found() {
        let (status, body) = get_text(test_router(), "/api/topics/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("error"));
        let (status, body) = get_text(test_router(), "/api/topics/analog").await;
        assert!(status.is_success());
        let topic: Topic = serde_json::from_str(&body).unwrap();
        assert_eq!(topic.name, "Analog Electronics");
    }

    #[tokio::test]
    async fn healthz_reports_source() {
        let (_, body) = get_text(test_router(), "/healthz").await;
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["source"], "loaded");
        assert_eq!(value["topics"], 3);
    }
}
