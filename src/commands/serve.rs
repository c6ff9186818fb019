//! The `taskstat serve` HTTP endpoint. Each request to `/` runs a sync for the date range in the
//! request and answers with the per-day summary.

use crate::api::Mode;
use crate::commands::sync::sync;
use crate::commands::Out;
use crate::config::Config;
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{parse_date, DateRange, SummaryTable};
use crate::Result;
use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    mode: Mode,
}

/// The date range of a request, from the JSON body or the query string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeParams {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    Invalid(String),
    Configuration(String),
    Upstream(String),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(value: Error) -> Self {
        let message = value.to_string();
        match value.error_type() {
            ErrorType::Configuration => ApiError::Configuration(message),
            ErrorType::IssueSource | ErrorType::Spreadsheet | ErrorType::Auth => {
                ApiError::Upstream(message)
            }
            ErrorType::Filesystem | ErrorType::Service => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Configuration(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "configuration", message)
            }
            ApiError::Upstream(message) => (StatusCode::BAD_GATEWAY, "upstream", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        if status.is_server_error() {
            error!("Request failed: {message}");
        } else {
            warn!("Request rejected: {message}");
        }
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

/// Builds the HTTP routes. `GET /` and `POST /` both run a sync.
pub fn router(config: Config, mode: Mode) -> Router {
    let state = AppState {
        config: Arc::new(config),
        mode,
    };
    Router::new()
        .route("/health", get(health))
        .route("/", get(run_sync).post(run_sync))
        .with_state(state)
}

/// Handles `taskstat serve`: listens on `host:port` until interrupted.
pub async fn serve(config: Config, mode: Mode, host: &str, port: u16) -> Result<Out<()>> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Unable to listen on {host}:{port}"))
        .pub_result(ErrorType::Service)?;
    let addr = listener
        .local_addr()
        .context("Unable to read the listening address")
        .pub_result(ErrorType::Service)?;
    info!("Listening on http://{addr}");

    axum::serve(listener, router(config, mode))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Unable to listen for the shutdown signal: {e}");
            }
        })
        .await
        .context("The HTTP server failed")
        .pub_result(ErrorType::Service)?;
    Ok("Server stopped".into())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn run_sync(
    State(state): State<AppState>,
    Query(query): Query<RangeParams>,
    body: Bytes,
) -> std::result::Result<Json<SummaryTable>, ApiError> {
    let range = request_range(query, &body)?;
    info!("Sync requested for {} to {}", range.start(), range.end());
    let out = sync(&state.config, state.mode, range, false).await?;
    info!("{}", out.message());
    let report = out
        .into_structure()
        .ok_or_else(|| ApiError::Internal("The sync returned no report".to_string()))?;
    Ok(Json(report.summary))
}

/// Values in the JSON body win over the query string.
fn request_range(query: RangeParams, body: &[u8]) -> std::result::Result<DateRange, ApiError> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        RangeParams::default()
    } else {
        serde_json::from_slice::<RangeParams>(body)
            .map_err(|e| ApiError::Invalid(format!("The request body is not valid JSON: {e}")))?
    };
    let start = from_body.start_date.or(query.start_date);
    let end = from_body.end_date.or(query.end_date);
    let start = required_date("startDate", start)?;
    let end = required_date("endDate", end)?;
    DateRange::new(start, end).map_err(|e| ApiError::Invalid(e.to_string()))
}

fn required_date(
    name: &str,
    value: Option<String>,
) -> std::result::Result<chrono::NaiveDate, ApiError> {
    let value = value.ok_or_else(|| ApiError::Invalid(format!("'{name}' is required")))?;
    parse_date(&value)
        .ok_or_else(|| ApiError::Invalid(format!("'{name}' is not a date: '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DateKey;
    use crate::test::{june, s, TestEnv};
    use axum::body::{self, Body};
    use axum::http::Request;
    use tower::util::ServiceExt;

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let env = TestEnv::new().await;
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(router(env.config(), Mode::Testing), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_post_runs_sync() {
        let env = TestEnv::new().await;
        let app = router(env.config(), Mode::Testing);
        let (status, json) = send(
            app,
            post(r#"{"startDate": "2024-06-01", "endDate": "2024-06-30"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["Jun 5, 2024"],
            json!({"totalTasks": 1, "doneTasks": 0, "totalBugs": 1, "totalUs": 1, "doneUs": 1})
        );
        assert_eq!(json.as_object().unwrap().len(), 4);

        // The sheet was written.
        let rows = env.tab("June 2024");
        assert_eq!(rows[1], s(&["06/03/2024", "1", "1", "0", "0", "0"]));
        let summary: SummaryTable = serde_json::from_value(json).unwrap();
        assert!(summary.get(&DateKey::from(june(3))).is_some());
    }

    #[tokio::test]
    async fn test_get_with_query_string() {
        let env = TestEnv::new().await;
        let request = Request::builder()
            .uri("/?startDate=2024-06-06&endDate=2024-06-06")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(router(env.config(), Mode::Testing), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            json!({"Jun 6, 2024": {"totalTasks": 0, "doneTasks": 1, "totalBugs": 0, "totalUs": 1, "doneUs": 0}})
        );
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let env = TestEnv::new().await;
        for body in [
            "",
            "not json",
            r#"{"startDate": "2024-06-01"}"#,
            r#"{"startDate": "2024-06-01", "endDate": "someday"}"#,
            r#"{"startDate": "2024-06-30", "endDate": "2024-06-01"}"#,
        ] {
            let (status, json) = send(router(env.config(), Mode::Testing), post(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(json["error"], "invalid_request");
        }
        // Nothing was written.
        assert_eq!(env.tab("June 2024")[1], s(&["06/03/2024"]));
    }

    #[tokio::test]
    async fn test_configuration_error_is_422() {
        let env = TestEnv::new().await;
        env.set_tab("June 2024", vec![s(&["Day", "Total Issues"]), s(&["06/05/2024"])]);
        let (status, json) = send(
            router(env.config(), Mode::Testing),
            post(r#"{"startDate": "2024-06-01", "endDate": "2024-06-30"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"], "configuration");
        assert!(json["message"].as_str().unwrap().contains("'Date'"));
    }

    #[tokio::test]
    async fn test_missing_tab_is_502() {
        let env = TestEnv::new().await;
        env.remove_tab("June 2024");
        let (status, json) = send(
            router(env.config(), Mode::Testing),
            post(r#"{"startDate": "2024-06-01", "endDate": "2024-06-30"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"], "upstream");
    }
}
