//! ==============================================================================
//! server.rs - web shell around the refresh core
//! ==============================================================================
//!
//! routes:
//!     GET  /             dashboard page (static html, polls the api)
//!     GET  /api/payload  latest render payload, null before the first live tick
//!     GET  /api/filter   current display filter
//!     PUT  /api/filter   replace the display filter, wakes the timer loop
//!     GET  /download     the csv log as an attachment
//!
//! the shell never calls the orchestrator itself. it only publishes the
//! filter and reads back whatever the timer loop last produced.
//!
//! ==============================================================================

use crate::domain::{DisplayFilter, RenderPayload};
use crate::store::DurableLog;

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tower_http::cors::CorsLayer;

const DASHBOARD_HTML: &str = include_str!("../static/dashboard.html");

/// name offered to the browser, whatever the log is called on disk
const DOWNLOAD_NAME: &str = "sensor_data.csv";

/// state shared between the timer loop and the http handlers
#[derive(Clone)]
pub struct ShellState {
    pub payload: Arc<RwLock<Option<RenderPayload>>>,
    pub filter: Arc<RwLock<DisplayFilter>>,
    /// signalled when the filter changes so the next refresh happens right away
    pub filter_changed: Arc<Notify>,
    pub log: DurableLog,
}

impl ShellState {
    pub fn new(log: DurableLog) -> Self {
        Self {
            payload: Arc::new(RwLock::new(None)),
            filter: Arc::new(RwLock::new(DisplayFilter::default())),
            filter_changed: Arc::new(Notify::new()),
            log,
        }
    }
}

pub fn router(state: ShellState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/payload", get(payload_handler))
        .route("/api/filter", get(get_filter_handler).put(put_filter_handler))
        .route("/download", get(download_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(bind: &str, state: ShellState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Dashboard live at http://{}", bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn dashboard_handler() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn payload_handler(State(state): State<ShellState>) -> Json<Option<RenderPayload>> {
    Json(state.payload.read().await.clone())
}

async fn get_filter_handler(State(state): State<ShellState>) -> Json<DisplayFilter> {
    Json(*state.filter.read().await)
}

async fn put_filter_handler(
    State(state): State<ShellState>,
    body: Result<Json<DisplayFilter>, JsonRejection>,
) -> Result<Json<DisplayFilter>, (StatusCode, String)> {
    let Json(filter) = body.map_err(|e| (StatusCode::BAD_REQUEST, e.body_text()))?;

    *state.filter.write().await = filter;
    state.filter_changed.notify_one();
    tracing::debug!(live = ?filter.live, window = %filter.window, "Display filter updated");
    Ok(Json(filter))
}

async fn download_handler(
    State(state): State<ShellState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let log = state.log.clone();
    let bytes = tokio::task::spawn_blocking(move || log.export())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("task join error: {}", e)))?
        .map_err(|e| {
            tracing::error!("CSV export failed: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", DOWNLOAD_NAME)),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LiveMode, Reading, Record, SourceMode, TimeWindow};
    use crate::store::tests::scratch_path;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::NaiveDate;
    use tower::ServiceExt;

    fn state(tag: &str) -> (ShellState, std::path::PathBuf) {
        let path = scratch_path(tag);
        (ShellState::new(DurableLog::open(&path).unwrap()), path)
    }

    async fn body_string(resp: axum::response::Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_payload_null_before_first_tick() {
        let (state, path) = state("srv-null");
        let resp = router(state)
            .oneshot(Request::builder().uri("/api/payload").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "null");
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_payload_published() {
        let (state, path) = state("srv-payload");
        let at = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        *state.payload.write().await = Some(RenderPayload {
            series: vec![
                Record { timestamp: Some(at), temperature: 22.0, humidity: 41.0 },
                Record { timestamp: None, temperature: 23.0, humidity: 42.0 },
            ],
            current_temp: "Temperature: --".into(),
            current_hum: "Humidity: --".into(),
            avg_temp: "Avg Temp: --".into(),
            avg_hum: "Avg Hum: --".into(),
            max_temp: "Max Temp: --".into(),
            min_temp: "Min Temp: --".into(),
            alert_text: String::new(),
            filter: DisplayFilter::default(),
            source: SourceMode::Simulated,
            generated_at: at,
        });

        let resp = router(state)
            .oneshot(Request::builder().uri("/api/payload").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(json["current_temp"], "Temperature: --");
        assert_eq!(json["source"], "simulated");
        assert_eq!(json["filter"]["window"], "all");
        // the chart places points by timestamp; unparseable ones come through as null
        assert_eq!(json["series"][0]["timestamp"], "2025-03-01T12:00:00");
        assert!(json["series"][1]["timestamp"].is_null());
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_put_filter() {
        let (state, path) = state("srv-filter");
        let app = router(state.clone());

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/filter")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"live":"off","window":"30"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            *state.filter.read().await,
            DisplayFilter { live: LiveMode::Off, window: TimeWindow::Minutes(30) }
        );

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/filter")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"live":"on","window":"forever"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        // only the offered ranges are accepted
        for window in ["45", "4294967295", "0"] {
            let body = format!(r#"{{"live":"on","window":"{}"}}"#, window);
            let resp = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("PUT")
                        .uri("/api/filter")
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "window {}", window);
        }

        // rejected updates leave the filter alone
        assert_eq!(
            *state.filter.read().await,
            DisplayFilter { live: LiveMode::Off, window: TimeWindow::Minutes(30) }
        );
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_download_csv() {
        let (state, path) = state("srv-download");
        let at = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(8, 30, 0).unwrap();
        state.log.append(&Reading { timestamp: at, temperature: 21.5, humidity: 44.0 }).unwrap();

        let resp = router(state)
            .oneshot(Request::builder().uri("/download").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert_eq!(disposition, "attachment; filename=\"sensor_data.csv\"");
        assert_eq!(
            body_string(resp).await,
            "Timestamp,Temperature,Humidity\n2025-03-01 08:30:00,21.5,44.0\n"
        );
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_dashboard_page() {
        let (state, path) = state("srv-page");
        let resp = router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let page = body_string(resp).await;
        assert!(page.contains("/api/payload"));
        assert!(page.contains("Date.parse(r.timestamp)"));
        std::fs::remove_file(&path).ok();
    }
}
