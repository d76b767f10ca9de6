//! # Transactional Email
//!
//! Seam for the welcome email sent to new newsletter subscribers.

use crate::error::CommerceResult;
use crate::newsletter::SubscriberEmail;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// An outgoing email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl Email {
    /// Welcome message for a new subscriber; `unsubscribe_url` is appended when present
    pub fn welcome(to: &SubscriberEmail, unsubscribe_url: Option<&str>) -> Self {
        let footer = match unsubscribe_url {
            Some(url) => format!(
                r#"<p><small>You can <a href="{}">unsubscribe</a> at any time.</small></p>"#,
                url
            ),
            None => concat!(
                "<p><small>You can unsubscribe at any time by clicking the unsubscribe link ",
                "in our emails.</small></p>"
            )
            .to_string(),
        };
        let html = format!(
            r#"<h2>Welcome to Dropics!</h2>
<p>Thank you for subscribing to our newsletter.</p>
<p>You'll be the first to know about:</p>
<ul>
  <li>New product launches</li>
  <li>Exclusive offers and discounts</li>
  <li>Creative tips and inspiration</li>
  <li>Industry news and trends</li>
</ul>
<p>Stay creative!</p>
<p>The Dropics Team</p>
<hr>
{}"#,
            footer
        );
        Self {
            to: to.as_str().to_string(),
            subject: "Welcome to Dropics Newsletter!".to_string(),
            html,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> CommerceResult<()>;

    fn mailer_name(&self) -> &'static str;
}

pub type SharedMailer = Arc<dyn Mailer>;

/// Logs instead of sending (no email provider configured)
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMailer;

#[async_trait]
impl Mailer for LoggingMailer {
    async fn send(&self, email: &Email) -> CommerceResult<()> {
        info!(to = %email.to, subject = %email.subject, "Email not sent (no provider configured)");
        Ok(())
    }

    fn mailer_name(&self) -> &'static str {
        "logging"
    }
}
