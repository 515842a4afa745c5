pub mod analysis;
pub mod config;
pub mod github;
pub mod metrics;
pub mod normalize;
pub mod querier;
pub mod records;
pub mod report;
pub mod scoring;
pub mod timestamp;
pub mod trends;
pub mod types;

use analysis::{AnalysisError, AnalysisReport, RawRepositoryPayload};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use config::AppConfig;
use querier::AnalysisQuerier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use types::RepoId;

/// Name given to uploaded snapshots that carry no repository name.
const SNAPSHOT_NAME: &str = "local/snapshot";

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Shared application state accessible to all request handlers.
pub struct AppState {
    /// Service for querying repository analyses.
    pub querier: AnalysisQuerier,
    /// Application configuration loaded from environment variables.
    pub config: AppConfig,
}

impl AppState {
    /// Initializes the application state, including the analysis querier.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let querier = AnalysisQuerier::new(&config)?;
        Ok(Self { querier, config })
    }
}

type ApiError = (StatusCode, String);

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/repos/popular", get(get_popular_repos))
        .route("/api/repos/{owner}/{repo}/analysis", get(get_repo_analysis))
        .route("/api/repos/{owner}/{repo}/report", get(get_repo_report))
        .route("/api/analysis", get(get_analysis_by_url))
        .route("/api/analyze", post(analyze_payload))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "repoquality-backend",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn get_popular_repos(State(state): State<Arc<AppState>>) -> Json<Vec<RepoId>> {
    Json(state.config.popular_repos.clone())
}

pub async fn get_repo_analysis(
    Path(repo_id): Path<RepoId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let report = fetch_report(&state, repo_id).await?;
    Ok(Json(report.as_ref().clone()))
}

pub async fn get_repo_report(
    Path(repo_id): Path<RepoId>,
    State(state): State<Arc<AppState>>,
) -> Result<String, ApiError> {
    let report = fetch_report(&state, repo_id).await?;
    Ok(report::render_markdown(&report, chrono::Utc::now()))
}

#[derive(Deserialize)]
pub struct AnalysisQuery {
    pub url: String,
}

pub async fn get_analysis_by_url(
    Query(query): Query<AnalysisQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let repo_id = RepoId::from_github_url(&query.url).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid GitHub URL. Expected https://github.com/owner/repo".to_string(),
        )
    })?;
    let report = fetch_report(&state, repo_id).await?;
    Ok(Json(report.as_ref().clone()))
}

/// Analyzes an uploaded snapshot of raw GitHub payloads without touching the network.
pub async fn analyze_payload(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RawRepositoryPayload>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let data = payload.into_repository_data(SNAPSHOT_NAME);
    match analysis::analyze(&data, state.querier.options()) {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            tracing::warn!("Rejected snapshot analysis: {}", e);
            Err(analysis_error_response(&e))
        }
    }
}

async fn fetch_report(
    state: &AppState,
    repo_id: RepoId,
) -> Result<Arc<AnalysisReport>, ApiError> {
    match state.querier.get(repo_id.clone()).await {
        Ok(report) => {
            tracing::debug!(repo_id = %repo_id, "Returning analysis");
            Ok(report)
        }
        Err(e) => {
            tracing::error!("Failed to analyze {}: {}", repo_id, e);

            if let Some(analysis_error) = e.downcast_ref::<AnalysisError>() {
                return Err(analysis_error_response(analysis_error));
            }

            if let Some(octocrab::Error::GitHub { source, .. }) =
                e.downcast_ref::<octocrab::Error>()
            {
                let message = source.message.to_lowercase();
                if message.contains("rate limit") {
                    return Err((
                        StatusCode::TOO_MANY_REQUESTS,
                        "GitHub Rate Limit Exceeded".to_string(),
                    ));
                }
                if message.contains("not found") {
                    return Err((StatusCode::NOT_FOUND, "Repository Not Found".to_string()));
                }
            }

            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            ))
        }
    }
}

fn analysis_error_response(error: &AnalysisError) -> ApiError {
    (StatusCode::UNPROCESSABLE_ENTITY, error.to_string())
}
