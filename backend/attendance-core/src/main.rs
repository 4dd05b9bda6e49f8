// src/main.rs
use anyhow::{Context, Result};
use axum::http::{header, StatusCode as AxumStatusCode};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod attendance;
mod config;
mod message_fetcher;
mod monthly;
mod name_resolver;
mod rate_limit;
mod report_service;
mod slack_client;
mod xlsx_report;

#[cfg(test)]
mod slack_mock;

use config::{AppConfig, SlackConfig, TARGET_TIMEZONE};
use report_service::AttendanceReportService;
use slack_client::{SlackClient, SlackError};
use xlsx_report::{render_workbook, report_file_name, XLSX_CONTENT_TYPE};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    #[error("{0}")]
    Slack(#[from] SlackError),
    #[error("Spreadsheet rendering failed: {0}")]
    Render(#[from] rust_xlsxwriter::XlsxError),
    #[error("Report generation timed out after {0} seconds")]
    Timeout(u64),
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Error occurred: {:?}", self);
        let status_code = match &self {
            AppError::Slack(slack_err) => match slack_err {
                SlackError::ConfigError(_) => AxumStatusCode::INTERNAL_SERVER_ERROR,
                SlackError::RateLimitExceeded => AxumStatusCode::TOO_MANY_REQUESTS,
                SlackError::ApiError { .. }
                | SlackError::HttpStatus { .. }
                | SlackError::Request(_)
                | SlackError::Json(_)
                | SlackError::InvalidTimestamp(_) => AxumStatusCode::BAD_GATEWAY,
                SlackError::UrlParse(_) => AxumStatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Timeout(_) => AxumStatusCode::GATEWAY_TIMEOUT,
            AppError::TlsConfig(_) | AppError::Render(_) => AxumStatusCode::INTERNAL_SERVER_ERROR,
        };
        let payload = ErrorPayload {
            error: format!("Failed to generate the attendance report: {}", self),
        };
        (status_code, Json(payload)).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub report_service: Arc<AttendanceReportService>,
    pub report_timeout: Duration,
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    time: String,
    slack_configured: bool,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/report/export", get(handle_export_report))
        .route("/status", get(handle_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    info!("Tracing subscriber initialized.");

    let app_config = AppConfig::from_env().context("Loading app configuration failed")?;
    let slack_config = SlackConfig::from_env().context("Loading Slack configuration failed")?;
    if !slack_config.is_configured() {
        warn!("SLACK_BOT_TOKEN or SLACK_CHANNEL_ID is missing; report exports will fail.");
    }
    info!("Configuration loaded.");

    let slack_client = Arc::new(
        SlackClient::new(&slack_config.slack_api_base_url)
            .context("Creating Slack client failed")?,
    );
    let state = AppState {
        report_service: Arc::new(AttendanceReportService::new(slack_client, slack_config)),
        report_timeout: app_config.report_timeout(),
    };
    let app = build_router(state);

    let addr: SocketAddr = app_config
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid BIND_ADDR '{}'", app_config.bind_addr))?;

    match app_config.tls_paths() {
        Some((cert_path, key_path)) => {
            let tls_config = load_tls_config(cert_path, key_path).await?;
            info!("Starting server on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")?;
        }
        None => {
            info!("Starting server on http://{}", addr);
            axum_server::bind(addr)
                .serve(app.into_make_service())
                .await
                .context("HTTP server failed")?;
        }
    }

    Ok(())
}

async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, AppError> {
    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| AppError::TlsConfig(format!("Failed to load TLS cert/key: {}", e)))
}

async fn handle_export_report(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> Result<Response, AppError> {
    info!("Handling /report/export request...");
    let now = Utc::now().with_timezone(&TARGET_TIMEZONE);

    let report = tokio::time::timeout(
        state.report_timeout,
        state.report_service.generate(params.cursor, now),
    )
    .await
    .map_err(|_| AppError::Timeout(state.report_timeout.as_secs()))??;

    let buffer = render_workbook(&report)?;
    let file_name = report_file_name(&now);
    info!(file_name = %file_name, bytes = buffer.len(), "Sending attendance workbook");

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        Bytes::from(buffer),
    )
        .into_response())
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    info!("Handling /status request...");
    Json(StatusResponse {
        status: "ok",
        time: Utc::now().with_timezone(&TARGET_TIMEZONE).to_rfc3339(),
        slack_configured: state.report_service.is_configured(),
    })
}
