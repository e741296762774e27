use std::collections::HashMap;

use crate::error::NotificationError;

pub const DOCTOR_APPROVED: &str = "doctor_approved";
pub const PATIENT_APPROVED: &str = "patient_approved";
pub const PASSWORD_RESET: &str = "password_reset";

/// Simple template renderer using {{variable}} syntax
pub struct TemplateRenderer {
    templates: HashMap<String, Template>,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub id: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub subject: String,
    pub body: String,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// A renderer with the account emails registered.
    pub fn with_builtin() -> Self {
        let mut renderer = Self::new();
        renderer.register(Template {
            id: DOCTOR_APPROVED.to_string(),
            subject: "Doctor Account Approved".to_string(),
            body: "Hello Dr. {{username}},\n\n\
                   Your account has been APPROVED.\n\n\
                   Login:\n\
                   {{frontend_url}}/doctor\n"
                .to_string(),
        });
        renderer.register(Template {
            id: PATIENT_APPROVED.to_string(),
            subject: "Patient Account Approved".to_string(),
            body: "Hello {{name}},\n\n\
                   Your account has been APPROVED.\n\n\
                   Login:\n\
                   {{frontend_url}}/patient\n"
                .to_string(),
        });
        renderer.register(Template {
            id: PASSWORD_RESET.to_string(),
            subject: "MedAI Password Reset".to_string(),
            body: "Hi {{name}},\n\n\
                   Click the link below to reset your password (expires in 15 minutes):\n\n\
                   {{frontend_url}}/patient/reset_password?token={{token}}\n\n\
                   If you did not request this, ignore this email.\n\n\
                   Regards,\n\
                   MedAI Hospital\n"
                .to_string(),
        });
        renderer
    }

    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn get(&self, template_id: &str) -> Option<&Template> {
        self.templates.get(template_id)
    }

    pub fn render(
        &self,
        template_id: &str,
        data: &HashMap<String, serde_json::Value>,
    ) -> Result<RenderedContent, NotificationError> {
        let template = self
            .templates
            .get(template_id)
            .ok_or(NotificationError::TemplateNotFound(template_id.to_string()))?;

        Ok(RenderedContent {
            subject: self.render_string(&template.subject, data),
            body: self.render_string(&template.body, data),
        })
    }

    fn render_string(&self, template: &str, data: &HashMap<String, serde_json::Value>) -> String {
        let mut result = template.to_string();

        for (key, value) in data {
            let placeholder = format!("{{{{{}}}}}", key);
            let replacement = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Null => String::new(),
                _ => value.to_string(),
            };
            result = result.replace(&placeholder, &replacement);
        }

        result
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::with_builtin()
    }
}
