use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    http::HeaderValue,
    middleware,
    routing::get,
};
use medai_auth::AuthState;
use medai_notifications::{ApprovalNotifier, DisabledMailer, Mailer, SmtpMailer};
use medai_screening::{
    EntityRecognizer, GoogleVisionOcr, HttpEntityRecognizer, ModelRegistry, OcrEngine,
    ScreeningEngine,
};
use medai_storage::DynStorage;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    bootstrap,
    config::{AppConfig, StorageBackend},
    handlers,
    ingest::{DiseaseCatalog, IngestPipeline},
    middleware as app_middleware, routes,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: DynStorage,
    pub auth: AuthState,
    pub pipeline: Arc<IngestPipeline>,
    pub notifier: ApprovalNotifier,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .merge(routes::api_router())
        // Outermost first: request id -> trace -> cors -> compression
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(app_middleware::request_id))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            use tracing::field::Empty;
                            let req_id = req
                                .extensions()
                                .get::<HeaderValue>()
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or("")
                                .to_string();
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri(),
                                http.status_code = Empty,
                                request_id = %req_id
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(cors)
                .layer(CompressionLayer::new()),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub struct MedaiServer {
    addr: SocketAddr,
    app: Router,
}

/// Wires configuration into storage, clients and models.
///
/// Every dependency can be replaced before `build`, which is how the
/// integration tests run the full router without network services.
pub struct ServerBuilder {
    config: AppConfig,
    storage: Option<DynStorage>,
    ocr: Option<Arc<dyn OcrEngine>>,
    ner: Option<Arc<dyn EntityRecognizer>>,
    models: Option<ModelRegistry>,
    mailer: Option<Arc<dyn Mailer>>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            storage: None,
            ocr: None,
            ner: None,
            models: None,
            mailer: None,
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    pub fn with_storage(mut self, storage: DynStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_ner(mut self, ner: Arc<dyn EntityRecognizer>) -> Self {
        self.ner = Some(ner);
        self
    }

    pub fn with_models(mut self, models: ModelRegistry) -> Self {
        self.models = Some(models);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub async fn build_state(self) -> anyhow::Result<AppState> {
        let cfg = self.config;

        let storage = match self.storage {
            Some(storage) => storage,
            None => match cfg.storage.backend {
                StorageBackend::Memory => {
                    tracing::warn!("using in-memory storage, data is lost on restart");
                    medai_db_memory::create_storage()
                }
                StorageBackend::Postgres => {
                    tracing::info!(
                        url = %cfg.postgres.redacted_url(),
                        pool_size = cfg.postgres.pool_size,
                        "connecting to PostgreSQL"
                    );
                    medai_db_postgres::create_storage(cfg.postgres.clone())
                        .await
                        .context("failed to initialize PostgreSQL storage")?
                }
            },
        };

        if let Some(admin) = &cfg.auth.bootstrap_admin {
            bootstrap::ensure_admin(&storage, admin)
                .await
                .context("failed to bootstrap admin")?;
        }

        let catalog = DiseaseCatalog::load(&storage).await;

        let models = match self.models {
            Some(models) => models,
            None => ModelRegistry::load_dir(&cfg.models.dir).with_context(|| {
                format!("failed to load models from {}", cfg.models.dir.display())
            })?,
        };
        tracing::info!(models = models.len(), "screening models ready");

        let ocr: Arc<dyn OcrEngine> = match self.ocr {
            Some(ocr) => ocr,
            None => Arc::new(
                GoogleVisionOcr::new(&cfg.ocr.endpoint, cfg.ocr.api_key.clone(), cfg.ocr.timeout())
                    .context("failed to build OCR client")?,
            ),
        };
        let ner: Arc<dyn EntityRecognizer> = match self.ner {
            Some(ner) => ner,
            None => Arc::new(
                HttpEntityRecognizer::new(
                    &cfg.ner.endpoint,
                    cfg.ner.api_token.clone(),
                    cfg.ner.timeout(),
                )
                .context("failed to build NER client")?,
            ),
        };
        let mailer: Arc<dyn Mailer> = match self.mailer {
            Some(mailer) => mailer,
            None if cfg.smtp.enabled => Arc::new(
                SmtpMailer::new(&cfg.smtp.settings()).context("failed to configure SMTP")?,
            ),
            None => {
                tracing::info!("SMTP disabled, account emails will not be delivered");
                Arc::new(DisabledMailer)
            }
        };

        let issuer = cfg
            .auth
            .token_issuer()
            .context("failed to configure token signing")?;

        let pipeline = IngestPipeline::new(
            ocr,
            ner,
            ScreeningEngine::new(models),
            catalog,
            storage.clone(),
        )
        .with_min_score(cfg.ner.min_score)
        .with_upload_limit(cfg.server.upload_limit_bytes);

        Ok(AppState {
            notifier: ApprovalNotifier::new(mailer, cfg.server.frontend_url.clone()),
            config: Arc::new(cfg),
            storage,
            auth: AuthState::new(Arc::new(issuer)),
            pipeline: Arc::new(pipeline),
        })
    }

    pub async fn build(self) -> anyhow::Result<MedaiServer> {
        let addr = self.config.addr();
        let state = self.build_state().await?;
        Ok(MedaiServer {
            addr,
            app: build_app(state),
        })
    }
}

impl MedaiServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
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
    tracing::info!("shutdown signal received");
}
