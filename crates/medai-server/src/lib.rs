pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod ingest;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod server;

pub use config::{
    AppConfig, AuthConfig, NerConfig, OcrConfig, ServerConfig, SmtpConfig, StorageBackend,
};
pub use ingest::{DiseaseCatalog, IngestError, IngestOutcome, IngestPipeline, Upload};
pub use observability::init_tracing;
pub use server::{AppState, MedaiServer, ServerBuilder, build_app};
