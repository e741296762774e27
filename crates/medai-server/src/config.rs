use medai_auth::{JwtError, RoleSecrets, SigningAlgorithm, TokenIssuer, TokenLifetimes};
use medai_db_postgres::PostgresConfig;
use medai_notifications::SmtpSettings;
use medai_screening::ner::DEFAULT_MIN_SCORE;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub postgres: PostgresConfig,
    /// Token secrets, lifetimes and the bootstrap administrator
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub ner: NerConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.upload_limit_bytes == 0 {
            return Err("server.upload_limit_bytes must be > 0".into());
        }
        if self.server.body_limit_bytes < self.server.upload_limit_bytes {
            return Err("server.body_limit_bytes must be >= server.upload_limit_bytes".into());
        }
        if self.storage.backend == StorageBackend::Postgres {
            self.postgres.validate()?;
        }
        self.auth
            .validate()
            .map_err(|e| format!("auth config error: {e}"))?;
        if self.smtp.enabled
            && (self.smtp.username.as_deref().unwrap_or("").is_empty()
                || self.smtp.password.as_deref().unwrap_or("").is_empty())
        {
            return Err("smtp.enabled=true requires smtp.username and smtp.password".into());
        }
        if !(0.0..=1.0).contains(&self.ner.min_score) {
            return Err("ner.min_score must be within 0.0..=1.0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request body cap, applied before any extractor runs
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// Largest accepted prescription image
    #[serde(default = "default_upload_limit")]
    pub upload_limit_bytes: usize,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// Base of the links placed in account emails
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_body_limit() -> usize {
    8 * 1024 * 1024
}
fn default_upload_limit() -> usize {
    5 * 1024 * 1024
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".into(),
        "http://127.0.0.1:5173".into(),
    ]
}
fn default_frontend_url() -> String {
    "http://localhost:5173".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            upload_limit_bytes: default_upload_limit(),
            cors_origins: default_cors_origins(),
            frontend_url: default_frontend_url(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Administrator created at startup when no account with that username exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub admin_secret: String,
    #[serde(default)]
    pub doctor_secret: String,
    #[serde(default)]
    pub receptionist_secret: String,
    #[serde(default)]
    pub patient_secret: String,
    #[serde(default)]
    pub patient_reset_secret: String,
    /// Receptionist and patient tokens
    #[serde(default = "default_access_minutes")]
    pub access_token_expire_minutes: u32,
    #[serde(default = "default_admin_hours")]
    pub admin_token_hours: u32,
    #[serde(default = "default_doctor_hours")]
    pub doctor_token_hours: u32,
    #[serde(default = "default_reset_minutes")]
    pub reset_token_minutes: u32,
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

fn default_algorithm() -> String {
    "HS256".into()
}
fn default_access_minutes() -> u32 {
    1440
}
fn default_admin_hours() -> u32 {
    6
}
fn default_doctor_hours() -> u32 {
    12
}
fn default_reset_minutes() -> u32 {
    15
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            admin_secret: String::new(),
            doctor_secret: String::new(),
            receptionist_secret: String::new(),
            patient_secret: String::new(),
            patient_reset_secret: String::new(),
            access_token_expire_minutes: default_access_minutes(),
            admin_token_hours: default_admin_hours(),
            doctor_token_hours: default_doctor_hours(),
            reset_token_minutes: default_reset_minutes(),
            bootstrap_admin: None,
        }
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.algorithm
            .parse::<SigningAlgorithm>()
            .map_err(|e| e.to_string())?;
        let secrets = [
            ("admin_secret", &self.admin_secret),
            ("doctor_secret", &self.doctor_secret),
            ("receptionist_secret", &self.receptionist_secret),
            ("patient_secret", &self.patient_secret),
            ("patient_reset_secret", &self.patient_reset_secret),
        ];
        if let Some((name, _)) = secrets.iter().find(|(_, s)| s.trim().is_empty()) {
            return Err(format!("{name} must not be empty"));
        }
        if self.access_token_expire_minutes == 0 {
            return Err("access_token_expire_minutes must be > 0".into());
        }
        if self.admin_token_hours == 0 || self.doctor_token_hours == 0 {
            return Err("token lifetimes must be > 0".into());
        }
        if self.reset_token_minutes == 0 {
            return Err("reset_token_minutes must be > 0".into());
        }
        if let Some(admin) = &self.bootstrap_admin {
            if admin.username.trim().is_empty() || admin.password.is_empty() {
                return Err("bootstrap_admin needs a username and a password".into());
            }
        }
        Ok(())
    }

    pub fn role_secrets(&self) -> RoleSecrets {
        RoleSecrets {
            admin: self.admin_secret.clone(),
            doctor: self.doctor_secret.clone(),
            receptionist: self.receptionist_secret.clone(),
            patient: self.patient_secret.clone(),
            patient_reset: self.patient_reset_secret.clone(),
        }
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access: time::Duration::minutes(i64::from(self.access_token_expire_minutes)),
            admin: time::Duration::hours(i64::from(self.admin_token_hours)),
            doctor: time::Duration::hours(i64::from(self.doctor_token_hours)),
            reset: time::Duration::minutes(i64::from(self.reset_token_minutes)),
        }
    }

    pub fn token_issuer(&self) -> Result<TokenIssuer, JwtError> {
        let algorithm = self.algorithm.parse::<SigningAlgorithm>()?;
        TokenIssuer::new(algorithm, &self.role_secrets(), self.lifetimes())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// When false, emails are logged and dropped
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_smtp_host")]
    pub host: String,
    /// Implicit TLS port
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    465
}
fn default_from_name() -> String {
    "MedAI Hospital".into()
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            from_name: default_from_name(),
        }
    }
}

impl SmtpConfig {
    pub fn settings(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            from_name: self.from_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_remote_timeout")]
    pub timeout_ms: u64,
}

fn default_ocr_endpoint() -> String {
    "https://vision.googleapis.com/v1/images:annotate".into()
}
fn default_remote_timeout() -> u64 {
    30_000
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ocr_endpoint(),
            api_key: None,
            timeout_ms: default_remote_timeout(),
        }
    }
}

impl OcrConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NerConfig {
    #[serde(default = "default_ner_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_remote_timeout")]
    pub timeout_ms: u64,
    /// Entities scored below this are discarded
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

fn default_ner_endpoint() -> String {
    "http://localhost:8090/ner".into()
}
fn default_min_score() -> f64 {
    DEFAULT_MIN_SCORE
}

impl Default for NerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ner_endpoint(),
            api_token: None,
            timeout_ms: default_remote_timeout(),
            min_score: default_min_score(),
        }
    }
}

impl NerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Holds `<disease>/model.json` and `<disease>/scaler.json`
    #[serde(default = "default_models_dir")]
    pub dir: PathBuf,
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: default_models_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "medai.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if path.is_some() {
            return Err(format!("config file not found: {}", pathbuf.display()));
        }
        // Environment variable overrides, e.g., MEDAI__AUTH__ADMIN_SECRET=...
        builder = builder.add_source(
            Environment::with_prefix("MEDAI")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn with_secrets(mut cfg: AppConfig) -> AppConfig {
        cfg.auth.admin_secret = "a".into();
        cfg.auth.doctor_secret = "d".into();
        cfg.auth.receptionist_secret = "r".into();
        cfg.auth.patient_secret = "p".into();
        cfg.auth.patient_reset_secret = "x".into();
        cfg
    }

    #[test]
    fn defaults_need_secrets() {
        let err = AppConfig::default().validate().unwrap_err();
        assert!(err.contains("admin_secret must not be empty"));
        assert!(with_secrets(AppConfig::default()).validate().is_ok());
    }

    #[test]
    fn rejects_zero_values() {
        let mut cfg = with_secrets(AppConfig::default());
        cfg.server.port = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = with_secrets(AppConfig::default());
        cfg.postgres.pool_size = 0;
        assert!(cfg.validate().is_err());
        cfg.storage.backend = StorageBackend::Memory;
        assert!(cfg.validate().is_ok());

        let mut cfg = with_secrets(AppConfig::default());
        cfg.auth.access_token_expire_minutes = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn lifetimes_follow_config() {
        let auth = AuthConfig {
            admin_token_hours: 2,
            ..AuthConfig::default()
        };
        let lifetimes = auth.lifetimes();
        assert_eq!(lifetimes.admin, time::Duration::hours(2));
        assert_eq!(lifetimes.access, time::Duration::minutes(1440));
        assert_eq!(lifetimes.reset, time::Duration::minutes(15));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let mut cfg = with_secrets(AppConfig::default());
        cfg.auth.algorithm = "RS256".into();
        assert!(cfg.validate().is_err());
        cfg.auth.algorithm = "hs512".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9100

[storage]
backend = "memory"

[auth]
admin_secret = "a"
doctor_secret = "d"
receptionist_secret = "r"
patient_secret = "p"
patient_reset_secret = "x"

[auth.bootstrap_admin]
username = "root"
password = "changeme"
"#
        )
        .unwrap();

        let cfg = loader::load_config(file.path().to_str()).unwrap();
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.upload_limit_bytes, 5 * 1024 * 1024);
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(
            cfg.auth.bootstrap_admin.as_ref().map(|a| a.username.as_str()),
            Some("root")
        );
        assert_eq!(cfg.smtp.port, 465);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = loader::load_config(Some("/nonexistent/medai.toml")).unwrap_err();
        assert!(err.contains("not found"));
    }
}
