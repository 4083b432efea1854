//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    response::{Html, Json, Redirect},
    routing::{get, post},
    Form, Router,
};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::crew::NewsCrew;
use crate::gate::{check_credentials, CredentialName};
use crate::search::{search_news, NewsPipeline, ResultSource, SearchOutcome};

use super::page;
use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Markdown shown in the results pane; overwritten by every search.
    pub results: RwLock<String>,
    /// The live pipeline, used only when both credentials are present
    pub pipeline: Arc<dyn NewsPipeline>,
    /// Credentials the gate found missing at startup. Credentials are fixed
    /// for the process lifetime.
    pub missing_credentials: Vec<CredentialName>,
}

impl AppState {
    pub fn new(config: Config, pipeline: Arc<dyn NewsPipeline>) -> Self {
        let missing_credentials = check_credentials(&config.credentials).missing().to_vec();
        Self {
            config,
            results: RwLock::new(String::new()),
            pipeline,
            missing_credentials,
        }
    }

    pub fn live_search(&self) -> bool {
        self.missing_credentials.is_empty()
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/search", post(search_form))
        .route("/api/search", post(api_search))
        .route("/api/results", get(get_results))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let pipeline: Arc<dyn NewsPipeline> = Arc::new(NewsCrew::new(config.crew.clone())?);

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, pipeline));
    if !state.live_search() {
        tracing::warn!("Live search disabled; searches will return mock results");
    }
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for SIGINT/SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Trim `subject` to the configured length, run the search, and store the
/// result. Empty subjects leave the stored results untouched.
async fn run_search(state: &AppState, subject: &str) -> (String, SearchOutcome) {
    let subject = truncate_chars(subject.trim(), state.config.subject_max_chars);
    let today = chrono::Local::now().date_naive();

    let outcome = search_news(
        &subject,
        &state.config.credentials,
        state.pipeline.as_ref(),
        today,
    )
    .await;

    if outcome.source != ResultSource::Prompt {
        *state.results.write().await = outcome.markdown.clone();
    }

    (subject, outcome)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Search page.
async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let results = state.results.read().await;
    Html(page::render(
        &state.config.app_name,
        state.config.subject_max_chars,
        &results,
    ))
}

/// Form submission from the search page.
async fn search_form(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SearchForm>,
) -> Redirect {
    let (subject, outcome) = run_search(&state, &form.subject).await;
    tracing::debug!("Form search for '{}' answered from {:?}", subject, outcome.source);
    Redirect::to("/")
}

/// JSON search.
async fn api_search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Json<SearchResponse> {
    let (subject, outcome) = run_search(&state, &req.subject).await;
    Json(SearchResponse {
        subject,
        markdown: outcome.markdown,
        source: outcome.source,
    })
}

async fn get_results(State(state): State<Arc<AppState>>) -> Json<ResultsResponse> {
    Json(ResultsResponse {
        markdown: state.results.read().await.clone(),
    })
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        app_name: state.config.app_name.clone(),
        live_search: state.live_search(),
        missing_credentials: state
            .missing_credentials
            .iter()
            .map(|n| n.to_string())
            .collect(),
        subject_max_chars: state.config.subject_max_chars,
    })
}
