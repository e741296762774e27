//! Account lifecycle emails. Delivery is best effort: failures are logged and
//! never reach the caller.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::NotificationResult;
use crate::mailer::{EmailMessage, Mailer};
use crate::templates::{DOCTOR_APPROVED, PASSWORD_RESET, PATIENT_APPROVED, TemplateRenderer};

#[derive(Clone)]
pub struct ApprovalNotifier {
    mailer: Arc<dyn Mailer>,
    renderer: Arc<TemplateRenderer>,
    frontend_url: String,
}

impl ApprovalNotifier {
    pub fn new(mailer: Arc<dyn Mailer>, frontend_url: impl Into<String>) -> Self {
        Self {
            mailer,
            renderer: Arc::new(TemplateRenderer::with_builtin()),
            frontend_url: frontend_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn doctor_approved(&self, email: &str, username: &str) {
        self.deliver(DOCTOR_APPROVED, email, [("username", json!(username))])
            .await;
    }

    pub async fn patient_approved(&self, email: &str, name: &str) {
        self.deliver(PATIENT_APPROVED, email, [("name", json!(name))])
            .await;
    }

    pub async fn password_reset(&self, email: &str, name: &str, token: &str) {
        self.deliver(
            PASSWORD_RESET,
            email,
            [("name", json!(name)), ("token", json!(token))],
        )
        .await;
    }

    async fn deliver<const N: usize>(
        &self,
        template: &str,
        to: &str,
        vars: [(&str, Value); N],
    ) {
        match self.try_deliver(template, to, vars).await {
            Ok(()) => info!(template, to, "email sent"),
            Err(e) => warn!(template, to, error = %e, "email delivery failed"),
        }
    }

    async fn try_deliver<const N: usize>(
        &self,
        template: &str,
        to: &str,
        vars: [(&str, Value); N],
    ) -> NotificationResult<()> {
        let mut data: HashMap<String, Value> = vars
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        data.insert("frontend_url".to_string(), json!(self.frontend_url));

        let content = self.renderer.render(template, &data)?;
        self.mailer
            .send(EmailMessage {
                to: to.to_string(),
                subject: content.subject,
                body: content.body,
            })
            .await
    }
}
