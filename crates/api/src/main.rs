use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use budgetwise_core::config::{AnalysisConfig, Settings};
use budgetwise_core::domain::contract::{AnalysisRequest, LabelRequest};
use budgetwise_core::domain::report::{AnalysisReport, LabelReport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let config = AnalysisConfig::from_env();
    tracing::info!(?config, "analysis config loaded");

    let app = router(AppState {
        config: Arc::new(config),
    });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Debug, Clone)]
struct AppState {
    config: Arc<AnalysisConfig>,
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/analysis", post(analyze_expenses))
        .route("/label_categories", post(label_categories))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn analyze_expenses(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let Json(request) = payload.map_err(ApiError::rejected)?;
    tracing::info!(
        expenses = request.expenses.len(),
        all_expenses = request.all_expenses.len(),
        categories = request.categories.len(),
        "analysis request"
    );

    let config = state.config.clone();
    let report = tokio::task::spawn_blocking(move || {
        budgetwise_core::pipeline::analyze(request, &config)
    })
    .await??;

    Ok(Json(report))
}

async fn label_categories(
    State(state): State<AppState>,
    payload: Result<Json<LabelRequest>, JsonRejection>,
) -> Result<Json<LabelReport>, ApiError> {
    let Json(request) = payload.map_err(ApiError::rejected)?;
    tracing::info!(past_expenses = request.past_expenses.len(), "label request");

    let config = state.config.clone();
    let report = tokio::task::spawn_blocking(move || {
        budgetwise_core::pipeline::label(request, &config)
    })
    .await??;

    Ok(Json(report))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            internal: None,
        }
    }

    fn rejected(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Missing required data: {}", rejection.body_text()))
    }
}

impl From<budgetwise_core::Error> for ApiError {
    fn from(err: budgetwise_core::Error) -> Self {
        match err {
            budgetwise_core::Error::InvalidInput(msg) => Self::bad_request(msg),
            other => Self::internal(anyhow::Error::new(other)),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(anyhow::Error::new(err).context("analysis task failed"))
    }
}

impl ApiError {
    fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An internal error occurred".to_string(),
            internal: Some(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.internal {
            sentry_anyhow::capture_anyhow(err);
            tracing::error!(error = %err, "request failed");
        } else {
            tracing::warn!(status = %self.status, message = %self.message, "request rejected");
        }

        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
