//! End-to-end tests over HTTP against the in-memory backend.
//!
//! OCR, NER and mail are replaced with in-process doubles so the whole
//! approval and upload workflow runs without external services.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use medai_core::Disease;
use medai_notifications::{EmailMessage, Mailer, NotificationResult};
use medai_screening::model::ThresholdModel;
use medai_screening::{
    EntityRecognizer, GoogleVisionOcr, ModelRegistry, NerEntity, NerError, OcrEngine, OcrError,
    Scaler,
};
use medai_server::config::BootstrapAdmin;
use medai_server::{AppConfig, AppState, ServerBuilder, StorageBackend, build_app};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

const PRESCRIPTION: &str = "Rx No: 20451\nPatient ID: P-77\nPatient Name: Rahima Begum \
    Phone: 01711223344 Age: 52 Female Height: 158 cm Weight: 71.5 kg BP: 150/95";

struct FixedOcr(&'static str);

#[async_trait]
impl OcrEngine for FixedOcr {
    async fn extract_text(&self, _image: &[u8]) -> Result<String, OcrError> {
        Ok(self.0.to_string())
    }
}

struct NoEntities;

#[async_trait]
impl EntityRecognizer for NoEntities {
    async fn recognize(&self, _text: &str) -> Result<Vec<NerEntity>, NerError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    fn recipients(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.to.clone())
            .collect()
    }

    fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.subject.clone())
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> NotificationResult<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.storage.backend = StorageBackend::Memory;
    cfg.auth.admin_secret = "admin-secret".into();
    cfg.auth.doctor_secret = "doctor-secret".into();
    cfg.auth.receptionist_secret = "receptionist-secret".into();
    cfg.auth.patient_secret = "patient-secret".into();
    cfg.auth.patient_reset_secret = "reset-secret".into();
    cfg.auth.bootstrap_admin = Some(BootstrapAdmin {
        username: "root".into(),
        email: Some("root@medai.local".into()),
        password: "root-pass".into(),
    });
    cfg
}

fn obesity_models() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry
        .insert(
            Disease::Obesity,
            Arc::new(ThresholdModel {
                n_features: 5,
                feature: 4,
                threshold: 25.0,
                classes: vec![0, 1],
            }),
            Some(Scaler::Standard {
                mean: vec![0.0; 5],
                scale: vec![1.0; 5],
            }),
        )
        .expect("insert model");
    registry
}

struct TestServer {
    base: String,
    client: reqwest::Client,
    state: AppState,
    mailer: Arc<RecordingMailer>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    async fn start(ocr: Arc<dyn OcrEngine>) -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        let state = ServerBuilder::new()
            .with_config(test_config())
            .with_storage(medai_db_memory::create_storage())
            .with_ocr(ocr)
            .with_ner(Arc::new(NoEntities))
            .with_models(obesity_models())
            .with_mailer(mailer.clone())
            .build_state()
            .await
            .expect("build state");
        let app = build_app(state.clone());

        let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await;
        });

        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            state,
            mailer,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    async fn with_prescription() -> Self {
        Self::start(Arc::new(FixedOcr(PRESCRIPTION))).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        read(req.send().await.expect("send")).await
    }

    async fn post_json(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        read(req.send().await.expect("send")).await
    }

    async fn put_json(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        let req = self.client.put(self.url(path)).bearer_auth(token).json(&body);
        read(req.send().await.expect("send")).await
    }

    async fn form_login(&self, path: &str, username: &str, password: &str) -> (StatusCode, Value) {
        let req = self
            .client
            .post(self.url(path))
            .form(&[("username", username), ("password", password)]);
        read(req.send().await.expect("send")).await
    }

    async fn upload(
        &self,
        path: &str,
        token: Option<&str>,
        mime: &str,
        bytes: Vec<u8>,
    ) -> (StatusCode, Value) {
        let part = Part::bytes(bytes)
            .file_name("rx.png")
            .mime_str(mime)
            .expect("mime");
        let mut req = self
            .client
            .post(self.url(path))
            .multipart(Form::new().part("file", part));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        read(req.send().await.expect("send")).await
    }

    async fn admin_token(&self) -> String {
        let (status, body) = self
            .post_json(
                "/api/admin/login",
                None,
                json!({"username": "root", "password": "root-pass"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        token_of(&body)
    }

    async fn approved_receptionist(&self, admin: &str) -> String {
        let (status, _) = self
            .post_json(
                "/api/receptionist/register",
                None,
                json!({"username": "desk1", "name": "Front Desk", "email": "desk1@medai.local", "password": "desk-pass"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, pending) = self.get("/api/admin/pending", Some(admin)).await;
        let id = pending["receptionists"][0]["id"].as_i64().expect("pending id");
        let (status, _) = self
            .post_json(
                "/api/admin/approve_receptionist",
                Some(admin),
                json!({"user_id": id}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self
            .form_login("/api/receptionist/login", "desk1", "desk-pass")
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        token_of(&body)
    }

    async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
    }
}

async fn read(resp: reqwest::Response) -> (StatusCode, Value) {
    let status = resp.status();
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

fn token_of(body: &Value) -> String {
    assert_eq!(body["token_type"], "bearer");
    body["access_token"].as_str().expect("access_token").to_string()
}

#[tokio::test]
async fn health_endpoints() {
    let server = TestServer::with_prescription().await;

    let (status, body) = server.get("/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "MedAI Server");

    let (status, body) = server.get("/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let (status, _) = server.get("/readyz", None).await;
    assert_eq!(status, StatusCode::OK);

    let resp = server.client.get(server.url("/healthz")).send().await.unwrap();
    assert!(resp.headers().contains_key("x-request-id"));

    let (status, body) = server.get("/api/patient/ping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "service": "patient"}));

    server.shutdown().await;
}

#[tokio::test]
async fn receptionist_waits_for_approval() {
    let server = TestServer::with_prescription().await;

    let register = json!({"username": "desk1", "name": "Front Desk", "email": "desk1@medai.local", "password": "desk-pass"});
    let (status, body) = server
        .post_json("/api/receptionist/register", None, register.clone())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Success"}));

    let (status, body) = server
        .post_json("/api/receptionist/register", None, register)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "User already exists");

    let (status, body) = server
        .form_login("/api/receptionist/login", "desk1", "desk-pass")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "PENDING", "message": "Pending Admin Approval"})
    );

    let (status, body) = server
        .form_login("/api/receptionist/login", "desk1", "wrong")
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid credentials");

    server.shutdown().await;
}

#[tokio::test]
async fn upload_screen_and_review_history() {
    let server = TestServer::with_prescription().await;
    let admin = server.admin_token().await;
    let desk = server.approved_receptionist(&admin).await;

    let (status, me) = server.get("/api/receptionist/me", Some(&desk)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["status"], "APPROVED");
    assert_eq!(me["name"], "Front Desk");

    // Upload and screen
    let (status, outcome) = server
        .upload(
            "/api/receptionist/analyze_and_store",
            Some(&desk),
            "image/png",
            vec![0x89, b'P', b'N', b'G'],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{outcome}");
    assert_eq!(outcome["prescription_serial"], "20451");
    assert_eq!(outcome["patient_id"], "P-77");
    assert_eq!(outcome["patient_identity"]["phone"], "01711223344");
    assert_eq!(outcome["diseases"]["obesity"]["prediction"], 1);

    let (status, body) = server
        .upload(
            "/api/receptionist/analyze_and_store",
            Some(&desk),
            "image/png",
            vec![1, 2, 3],
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "This prescription has already been uploaded");

    // Doctor lookup
    let (status, _) = server
        .post_json(
            "/api/doctor/register",
            None,
            json!({
                "username": "drkhan",
                "password": "doc-pass",
                "full_name": "Dr. Khan",
                "email": "khan@medai.local",
                "specialization": "Cardiology"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server.form_login("/api/doctor/login", "drkhan", "doc-pass").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Account not approved");

    let (_, pending) = server.get("/api/admin/pending", Some(&admin)).await;
    let doctor_id = pending["doctors"][0]["id"].as_i64().unwrap();
    let (status, body) = server
        .post_json(
            "/api/admin/approve_doctor",
            Some(&admin),
            json!({"user_id": doctor_id}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "approved"}));
    assert!(server.mailer.recipients().contains(&"khan@medai.local".to_string()));

    let (_, body) = server.form_login("/api/doctor/login", "drkhan", "doc-pass").await;
    let doctor = token_of(&body);

    let (status, history) = server
        .get("/api/doctor/patients/history?q=01711223344", Some(&doctor))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["total_records"], 1);
    assert_eq!(history["data"][0]["prescription_serial"], "20451");

    let (status, _) = server
        .get("/api/doctor/patients/history?q=P-77&limit=51", Some(&doctor))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = server
        .get("/api/doctor/patients/history?q=P-77", Some(&desk))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Admin overview
    let (status, stats) = server.get("/api/admin/system_stats", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        stats,
        json!({"active_receptionists": 1, "active_doctors": 1, "active_patients": 0})
    );

    let (status, audit) = server.get("/api/admin/audit", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let details: Vec<&str> = audit
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["details"].as_str())
        .collect();
    assert_eq!(details[0], format!("Doctor #{doctor_id} approved"));
    assert!(details.iter().any(|d| d.starts_with("Receptionist #")));

    server.shutdown().await;
}

#[tokio::test]
async fn patient_portal_after_approval() {
    let server = TestServer::with_prescription().await;
    let admin = server.admin_token().await;
    let desk = server.approved_receptionist(&admin).await;
    let (status, _) = server
        .upload(
            "/api/receptionist/analyze_and_store",
            Some(&desk),
            "image/jpeg",
            vec![0xff, 0xd8],
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server
        .post_json(
            "/api/patient/register",
            None,
            json!({"patient_id": "P-77", "name": "Rahima Begum", "email": "", "phone": ""}),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let (status, body) = server
        .post_json(
            "/api/patient/register",
            None,
            json!({"patient_id": "P-77", "name": "Rahima Begum", "email": " ", "password": "pw"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Either email or phone is required");

    let (status, body) = server
        .post_json(
            "/api/patient/register",
            None,
            json!({"patient_id": "P-77", "name": "Rahima Begum", "email": "rahima@example.com", "phone": "01711223344", "password": "pw"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "registered", "message": "Waiting for admin approval"})
    );

    let (status, body) = server
        .form_login("/api/patient/login", "01711223344", "pw")
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Account awaiting admin approval");

    let (_, pending) = server.get("/api/admin/pending", Some(&admin)).await;
    assert_eq!(pending["patients"][0]["patient_id"], "P-77");
    let account_id = pending["patients"][0]["id"].as_i64().unwrap();

    // A token for an unapproved account is turned away
    let early = server.state.auth.issuer.issue_patient(account_id).unwrap();
    let (status, body) = server.get("/api/patient/history", Some(&early)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["detail"],
        "Access Denied: Your account is awaiting Admin approval."
    );

    let (status, _) = server
        .post_json(
            "/api/admin/approve_patient",
            Some(&admin),
            json!({"user_id": account_id}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        server
            .mailer
            .subjects()
            .contains(&"Patient Account Approved".to_string())
    );

    let (status, body) = server.form_login("/api/patient/login", "P-77", "pw").await;
    assert_eq!(status, StatusCode::OK);
    let patient = token_of(&body);

    let (_, me) = server.get("/api/patient/me", Some(&patient)).await;
    assert_eq!(
        me,
        json!({"patient_id": "P-77", "name": "Rahima Begum", "email": "rahima@example.com", "phone": "01711223344"})
    );

    let (status, history) = server
        .get("/api/patient/history?sort_by=risk&order=desc", Some(&patient))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["total_records"], 1);
    assert_eq!(history["has_next"], false);
    assert_eq!(history["data"][0]["predictions"][0]["disease"], "obesity");

    let (status, _) = server
        .get("/api/patient/history?from_date=yesterday", Some(&patient))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, old) = server
        .get("/api/patient/history?to_date=2000-01-01", Some(&patient))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(old["total_records"], 0);

    let (_, summary) = server.get("/api/patient/history/summary", Some(&patient)).await;
    assert_eq!(summary["total_visits"], 1);
    assert_eq!(summary["obesity_positive"], 1);

    let (status, cursor) = server
        .get("/api/patient/history/cursor?limit=5", Some(&patient))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cursor["data"][0]["prescription_serial"], "20451");
    assert_eq!(cursor["next_cursor"], cursor["data"][0]["created_at"]);

    let (_, exported) = server
        .get("/api/patient/history/export/raw", Some(&patient))
        .await;
    assert_eq!(exported["limit"], 1000);

    let (status, detail) = server.get("/api/patient/history/20451", Some(&patient)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["patient"]["patient_id"], "P-77");

    let (status, body) = server.get("/api/patient/history/99999", Some(&patient)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Prescription not found");

    let (status, body) = server
        .put_json(
            "/api/patient/update",
            &patient,
            json!({"name": "Rahima B.", "email": "rahima@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "updated"}));

    server.shutdown().await;
}

#[tokio::test]
async fn patient_profile_email_stays_unique() {
    let server = TestServer::with_prescription().await;
    let admin = server.admin_token().await;

    let mut tokens = Vec::new();
    for (patient_id, email) in [("P-81", "first@example.com"), ("P-82", "second@example.com")] {
        let (status, _) = server
            .post_json(
                "/api/patient/register",
                None,
                json!({"patient_id": patient_id, "name": "Salma Khatun", "email": email, "password": "pw"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, pending) = server.get("/api/admin/pending", Some(&admin)).await;
    for patient in pending["patients"].as_array().unwrap() {
        let (status, _) = server
            .post_json(
                "/api/admin/approve_patient",
                Some(&admin),
                json!({"user_id": patient["id"]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    for patient_id in ["P-81", "P-82"] {
        let (status, body) = server.form_login("/api/patient/login", patient_id, "pw").await;
        assert_eq!(status, StatusCode::OK);
        tokens.push(token_of(&body));
    }
    let second = &tokens[1];

    let (status, body) = server
        .put_json(
            "/api/patient/update",
            second,
            json!({"name": "Salma K.", "email": "first@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "Email already used");

    let (status, body) = server
        .put_json("/api/patient/update", second, json!({"name": "Salma K.", "email": "  "}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Email is required");

    let (status, _) = server
        .put_json("/api/patient/update", second, json!({"name": "Salma K."}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, me) = server.get("/api/patient/me", Some(second)).await;
    assert_eq!(me["email"], "second@example.com");
    assert_eq!(me["name"], "Salma Khatun");

    let (status, body) = server.form_login("/api/patient/login", "first@example.com", "pw").await;
    assert_eq!(status, StatusCode::OK);
    let (_, me) = server.get("/api/patient/me", Some(&token_of(&body))).await;
    assert_eq!(me["patient_id"], "P-81");

    server.shutdown().await;
}

#[tokio::test]
async fn password_reset_round() {
    let server = TestServer::with_prescription().await;
    let admin = server.admin_token().await;

    server
        .post_json(
            "/api/patient/register",
            None,
            json!({"patient_id": "P-9", "name": "Karim", "email": "karim@example.com", "password": "old-pw"}),
        )
        .await;
    let (_, pending) = server.get("/api/admin/pending", Some(&admin)).await;
    let account_id = pending["patients"][0]["id"].as_i64().unwrap();
    server
        .post_json(
            "/api/admin/approve_patient",
            Some(&admin),
            json!({"user_id": account_id}),
        )
        .await;

    let expected = json!({"message": "If the account exists, a reset link has been sent!"});
    let (status, body) = server
        .post_json(
            "/api/patient/forgot_password",
            None,
            json!({"identifier": "nobody@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, expected);

    let (_, body) = server
        .post_json(
            "/api/patient/forgot_password",
            None,
            json!({"identifier": "karim@example.com"}),
        )
        .await;
    assert_eq!(body, expected);
    assert!(
        server
            .mailer
            .subjects()
            .contains(&"MedAI Password Reset".to_string())
    );

    let (status, body) = server
        .post_json(
            "/api/patient/reset_password",
            None,
            json!({"token": "garbage", "new_password": "x"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid or expired token");

    let token = server.state.auth.issuer.issue_reset(account_id).unwrap();
    let (status, body) = server
        .post_json(
            "/api/patient/reset_password",
            None,
            json!({"token": token, "new_password": "new-pw"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password has been reset successfully!");

    let (status, _) = server.form_login("/api/patient/login", "P-9", "old-pw").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = server.form_login("/api/patient/login", "P-9", "new-pw").await;
    assert_eq!(status, StatusCode::OK);

    server.shutdown().await;
}

#[tokio::test]
async fn upload_validation_errors() {
    let server = TestServer::start(Arc::new(FixedOcr("   "))).await;
    let admin = server.admin_token().await;
    let desk = server.approved_receptionist(&admin).await;

    let (status, body) = server
        .upload("/api/receptionist/analyze_and_store", None, "image/png", vec![1])
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Not authenticated");

    let (status, body) = server
        .upload(
            "/api/receptionist/analyze_and_store",
            Some(&desk),
            "image/gif",
            vec![1],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Only PNG or JPEG images are allowed");

    let (status, body) = server
        .upload(
            "/api/receptionist/analyze_and_store",
            Some(&desk),
            "image/png",
            vec![0; 5 * 1024 * 1024 + 1],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Image size exceeds 5MB limit");

    let (status, body) = server
        .upload(
            "/api/receptionist/analyze_and_store",
            Some(&desk),
            "image/png",
            vec![1],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "Unable to extract readable text from prescription image"
    );

    let (status, body) = server.get("/api/admin/pending", Some(&desk)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid admin token");

    let (status, body) = server
        .post_json("/api/admin/approve_doctor", Some(&admin), json!({"user_id": 4242}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Doctor not found");

    server.shutdown().await;
}

#[tokio::test]
async fn home_analysis_through_vision_api() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let vision = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images:annotate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responses": [{"fullTextAnnotation": {"text": PRESCRIPTION}}]
        })))
        .mount(&vision)
        .await;

    let ocr = GoogleVisionOcr::new(
        format!("{}/v1/images:annotate", vision.uri()),
        Some("key".into()),
        Duration::from_secs(5),
    )
    .unwrap();
    let server = TestServer::start(Arc::new(ocr)).await;

    let (status, body) = server
        .upload("/api/home/analyze_prescription", None, "image/png", vec![7; 16])
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["extracted_data"]["age"], 52);
    assert_eq!(body["extracted_data"]["ap_hi"], 150);
    assert_eq!(body["diseases"]["obesity"]["prediction"], 1);
    assert!(body["clean_text"].as_str().unwrap().contains("Rx No"));

    // Nothing is stored by the public analyzer
    let visits = server
        .state
        .storage
        .count_visits(&medai_storage::VisitQuery::new(
            medai_storage::VisitSelector::ByPatientIdOrPhone("P-77".into()),
            1,
            10,
        ))
        .await
        .unwrap();
    assert_eq!(visits, 0);

    server.shutdown().await;
}
