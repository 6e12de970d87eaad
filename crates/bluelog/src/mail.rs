//! Outgoing notification mail.
//!
//! Notifications are sent from a detached task once the triggering write has been
//! committed. Failures are logged and otherwise dropped.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use salvo::async_trait;
use tera::escape_html;

use crate::config::{Config, MailConfig};
use crate::models::{Comment, Post};
use crate::{AppError, AppResult};

/// A rendered message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Debug + Send + Sync {
    async fn send(&self, email: Email) -> AppResult<()>;
}

/// Delivers through an SMTP relay with implicit TLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Debug for SmtpMailer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpMailer").field("from", &self.from).finish()
    }
}

impl SmtpMailer {
    pub fn new(server: &str, config: &MailConfig) -> AppResult<Self> {
        let sender = config
            .sender()
            .ok_or_else(|| AppError::Config("MAIL_USERNAME is required with MAIL_SERVER".to_owned()))?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(server)?.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(Self {
            transport: builder.build(),
            from: sender.parse()?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> AppResult<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> AppResult<()> {
        tracing::info!(to = %email.to, subject = %email.subject, "mail transport not configured, message logged");
        tracing::debug!(body = %email.html);
        Ok(())
    }
}

/// Picks the SMTP transport when a relay is configured.
pub fn mailer_from_config(config: &Config) -> AppResult<Arc<dyn Mailer>> {
    match &config.mail.server {
        Some(server) => Ok(Arc::new(SmtpMailer::new(server, &config.mail)?)),
        None => Ok(Arc::new(LogMailer)),
    }
}

/// Builds and dispatches the blog notifications.
#[derive(Clone, Debug)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    base_url: String,
    admin_email: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, config: &Config) -> Self {
        Self {
            mailer,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            admin_email: config.admin_email.clone(),
        }
    }

    fn post_url(&self, post_id: i64) -> String {
        format!("{}/post/{post_id}#comments", self.base_url)
    }

    /// Tells the blog owner about a visitor comment.
    #[must_use]
    pub fn new_comment_email(&self, post: &Post) -> Email {
        let url = self.post_url(post.id);
        Email {
            to: self.admin_email.clone(),
            subject: "New comment".to_owned(),
            html: format!(
                "<p>New comment in post <i>{title}</i>, click the link below to check:</p>\
                 <p><a href=\"{url}\">{url}</a></p>\
                 <p><small style=\"color: #868e96\">Do not reply this email.</small></p>",
                title = escape_html(&post.title),
            ),
        }
    }

    /// Tells a commenter that someone replied to them. `None` when the replied
    /// comment carries no address.
    #[must_use]
    pub fn new_reply_email(&self, reply: &Comment) -> Option<Email> {
        let to = reply.replied_email.clone()?;
        let url = self.post_url(reply.post_id);
        Some(Email {
            to,
            subject: "New reply".to_owned(),
            html: format!(
                "<p>New reply for the comment you left in post <i>{title}</i>, click the link below to check:</p>\
                 <p><a href=\"{url}\">{url}</a></p>\
                 <p><small style=\"color: #868e96\">Do not reply this email.</small></p>",
                title = escape_html(&reply.post_title),
            ),
        })
    }

    /// Sends `email` on a detached task.
    pub fn dispatch(&self, email: Email) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            let subject = email.subject.clone();
            if let Err(e) = mailer.send(email).await {
                tracing::error!(error = %e, subject = %subject, "failed to send mail");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::testing::RecordingMailer;

    fn post() -> Post {
        Post {
            id: 7,
            title: "Hello <World>".to_owned(),
            body: String::new(),
            timestamp: Utc::now().naive_utc(),
            can_comment: true,
            category_id: 1,
            category_name: "Default".to_owned(),
            comment_count: 0,
        }
    }

    #[test]
    fn test_new_comment_email() {
        let notifier = Notifier::new(Arc::new(LogMailer), &Config::testing());
        let email = notifier.new_comment_email(&post());
        assert_eq!(email.to, "admin@example.com");
        assert_eq!(email.subject, "New comment");
        assert!(email.html.contains("http://127.0.0.1:5800/post/7#comments"));
        assert!(email.html.contains("Hello &lt;World&gt;"));
    }

    #[test]
    fn test_reply_email_escapes_quotes() {
        let notifier = Notifier::new(Arc::new(LogMailer), &Config::testing());
        let reply = Comment {
            id: 3,
            author: "Grey".to_owned(),
            email: "admin@example.com".to_owned(),
            site: None,
            body: "thanks".to_owned(),
            timestamp: Utc::now().naive_utc(),
            from_admin: true,
            reviewed: true,
            post_id: 7,
            replied_id: Some(2),
            post_title: "Grey's <b>\"notes\"</b>".to_owned(),
            replied_author: Some("Li".to_owned()),
            replied_body: Some("hello".to_owned()),
            replied_email: Some("li@example.com".to_owned()),
        };
        let email = notifier.new_reply_email(&reply).unwrap();
        assert_eq!(email.to, "li@example.com");
        assert!(email.html.contains("Grey&#x27;s &lt;b&gt;&quot;notes&quot;&lt;&#x2F;b&gt;"));
        assert!(!email.html.contains("<b>"));
    }

    #[tokio::test]
    async fn test_dispatch_uses_mailer() {
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::new(mailer.clone(), &Config::testing());
        notifier.dispatch(notifier.new_comment_email(&post()));
        let sent = mailer.wait_for(1).await;
        assert_eq!(sent[0].subject, "New comment");
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_everything() {
        let email = Email {
            to: "someone@example.com".to_owned(),
            subject: "New reply".to_owned(),
            html: "<p>hi</p>".to_owned(),
        };
        assert!(LogMailer.send(email).await.is_ok());
    }
}
