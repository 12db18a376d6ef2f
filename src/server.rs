//! # Server Configuration
//!
//! Shared application state, the Axum router and the OpenAPI document for the
//! Beam Analytics API.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::auth_middleware;
use crate::config::AppConfig;
use crate::handlers;
use crate::storage::{self, BlobStore};
use crate::summary::{ChatCompletionsSummarizer, SummaryProvider};
use crate::telemetry::trace_id_middleware;
use crate::tokens::TokenService;
use crate::webhook::WebhookRelay;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub tokens: Arc<TokenService>,
    /// `None` when no object store is configured
    pub storage: Option<Arc<dyn BlobStore>>,
    pub webhook: Arc<WebhookRelay>,
    /// `None` when no AI provider key is configured
    pub summarizer: Option<Arc<dyn SummaryProvider>>,
}

impl AppState {
    /// Wire the token service, webhook relay and AI client from `config`.
    pub fn new(
        config: AppConfig,
        db: DatabaseConnection,
        storage: Option<Arc<dyn BlobStore>>,
    ) -> anyhow::Result<Self> {
        let tokens = TokenService::from_config(&config.jwt).context("Invalid JWT settings")?;
        let webhook = WebhookRelay::new(&config.webhook).context("Failed to build webhook client")?;
        let summarizer = ChatCompletionsSummarizer::from_config(&config.ai)
            .context("Failed to build AI client")?
            .map(|s| Arc::new(s) as Arc<dyn SummaryProvider>);

        Ok(Self {
            config: Arc::new(config),
            db,
            tokens: Arc::new(tokens),
            storage,
            webhook: Arc::new(webhook),
            summarizer,
        })
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes as usize + MULTIPART_OVERHEAD_BYTES;

    let protected = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route("/api/files/upload", post(handlers::files::upload_file))
        .route("/api/files", get(handlers::files::list_files))
        .route("/api/files/", get(handlers::files::list_files))
        .route("/api/files/{id}", get(handlers::files::get_file))
        .route(
            "/api/files/{id}/download",
            get(handlers::files::download_file),
        )
        .route(
            "/api/files/{id}/insights",
            post(handlers::insights::file_insights),
        )
        .route(
            "/api/files/{id}/insights/",
            post(handlers::insights::file_insights),
        )
        .route(
            "/api/files/{id}/ai-summary",
            post(handlers::insights::ai_summary),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let public = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/ingest", get(handlers::ingest::ingest_page))
        .route("/api/sas", post(handlers::ingest::mint_upload_url))
        .route("/api/notify", post(handlers::ingest::notify_upload))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id_middleware))
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config.bind_addr().context("Invalid server address")?;
    let blob_store = storage::build_blob_store(&config.storage, config.is_dev_profile()).await;
    let profile = config.profile.clone();

    let state = AppState::new(config, db, blob_store)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh,
        crate::handlers::auth::me,
        crate::handlers::files::upload_file,
        crate::handlers::files::list_files,
        crate::handlers::files::get_file,
        crate::handlers::files::download_file,
        crate::handlers::insights::file_insights,
        crate::handlers::insights::ai_summary,
        crate::handlers::ingest::ingest_page,
        crate::handlers::ingest::mint_upload_url,
        crate::handlers::ingest::notify_upload,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::HealthStatus,
            crate::models::file::FileResponse,
            crate::auth::CurrentUser,
            crate::error::ApiError,
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::RefreshRequest,
            crate::handlers::auth::TokenResponse,
            crate::handlers::files::UploadFileForm,
            crate::handlers::insights::InsightsRequest,
            crate::handlers::insights::SummaryResponse,
            crate::handlers::ingest::SasForm,
            crate::handlers::ingest::SasResponse,
            crate::handlers::ingest::NotifyForm,
            crate::insights::InsightsReport,
            crate::insights::Chart,
            crate::insights::ColumnSummary,
            crate::insights::charts::HistogramBin,
            crate::insights::charts::BarEntry,
            crate::webhook::RelayOutcome,
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "root", description = "Service metadata"),
        (name = "auth", description = "Registration, login and tokens"),
        (name = "files", description = "Tenant file storage"),
        (name = "insights", description = "Analytics over uploaded files"),
        (name = "ingest", description = "Direct-to-storage uploads and notifications"),
    ),
    info(
        title = "Beam Analytics API",
        description = "Multi-tenant spreadsheet upload and analytics",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
