pub mod error;
pub mod mailer;
pub mod notifier;
pub mod templates;

pub use error::{NotificationError, NotificationResult};
pub use mailer::{DisabledMailer, EmailMessage, Mailer, SmtpMailer, SmtpSettings};
pub use notifier::ApprovalNotifier;
pub use templates::{RenderedContent, Template, TemplateRenderer};
