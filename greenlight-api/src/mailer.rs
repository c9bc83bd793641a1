/// Outgoing mail
///
/// Handlers never send mail inline. They render a [`Template`] and hand
/// delivery to a background task that calls [`send_with_retry`].
///
/// [`LogMailer`] is the implementation the server ships with: it renders the
/// message and records the dispatch through `tracing`. Anything that speaks
/// SMTP or an HTTP mail API can implement [`Mailer`] instead.

use async_trait::async_trait;
use std::time::Duration;

/// Delivery attempts made by [`send_with_retry`]
pub const SEND_ATTEMPTS: u32 = 3;

/// Pause between delivery attempts
pub const RETRY_PAUSE: Duration = Duration::from_millis(500);

/// A rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub plain_body: String,
}

/// The messages the API sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    /// Sent on registration, carries the activation token
    UserWelcome {
        user_id: i64,
        activation_token: String,
    },
}

impl Template {
    pub fn name(&self) -> &'static str {
        match self {
            Template::UserWelcome { .. } => "user_welcome",
        }
    }

    pub fn render(&self) -> Message {
        match self {
            Template::UserWelcome {
                user_id,
                activation_token,
            } => Message {
                subject: "Welcome to Greenlight!".to_string(),
                plain_body: format!(
                    "Hi,\n\n\
                     Thanks for signing up for a Greenlight account. We're excited to have you on board!\n\n\
                     For future reference, your user ID number is {user_id}.\n\n\
                     Please send a request to the `PUT /v1/users/activated` endpoint with the \
                     following JSON body to activate your account:\n\n\
                     {{\"token\": \"{activation_token}\"}}\n\n\
                     Please note that this is a one-time use token and it will expire in 3 days.\n\n\
                     Thanks,\n\n\
                     The Greenlight Team\n"
                ),
            },
        }
    }
}

/// Mail delivery
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers one rendered template to `recipient`
    async fn send(&self, recipient: &str, template: &Template) -> anyhow::Result<()>;
}

/// Mailer that records each dispatch in the log instead of delivering it
///
/// Only the recipient, subject and template name are logged. The body holds
/// a live activation token and stays out of the log.
#[derive(Debug, Clone)]
pub struct LogMailer {
    sender: String,
}

impl LogMailer {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, recipient: &str, template: &Template) -> anyhow::Result<()> {
        let message = template.render();

        tracing::info!(
            sender = %self.sender,
            recipient,
            template = template.name(),
            subject = %message.subject,
            body_bytes = message.plain_body.len(),
            "mail dispatched"
        );
        Ok(())
    }
}

/// Sends with up to [`SEND_ATTEMPTS`] attempts, pausing [`RETRY_PAUSE`]
/// between them
///
/// # Errors
///
/// The error from the last attempt
pub async fn send_with_retry(
    mailer: &dyn Mailer,
    recipient: &str,
    template: &Template,
) -> anyhow::Result<()> {
    let mut attempt = 1;
    loop {
        match mailer.send(recipient, template).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < SEND_ATTEMPTS => {
                tracing::warn!(
                    attempt,
                    template = template.name(),
                    error = %e,
                    "mail delivery failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(RETRY_PAUSE).await;
            }
            Err(e) => return Err(e.context(format!("gave up after {attempt} attempts"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyMailer {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl FlakyMailer {
        fn failing(times: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(times),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, _recipient: &str, _template: &Template) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                anyhow::bail!("connection refused");
            }
            Ok(())
        }
    }

    fn welcome() -> Template {
        Template::UserWelcome {
            user_id: 42,
            activation_token: "Y3QMGX3PJ3WLRL2YRTQGQ6KRHU".to_string(),
        }
    }

    #[test]
    fn test_welcome_template_renders_token() {
        let message = welcome().render();

        assert_eq!(message.subject, "Welcome to Greenlight!");
        assert!(message.plain_body.contains("your user ID number is 42"));
        assert!(message.plain_body.contains(r#"{"token": "Y3QMGX3PJ3WLRL2YRTQGQ6KRHU"}"#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failures() {
        let mailer = FlakyMailer::failing(2);

        send_with_retry(&mailer, "alice@example.com", &welcome()).await.unwrap();
        assert_eq!(mailer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_three_attempts() {
        let mailer = FlakyMailer::failing(5);

        let err = send_with_retry(&mailer, "alice@example.com", &welcome())
            .await
            .unwrap_err();
        assert_eq!(mailer.calls.load(Ordering::SeqCst), SEND_ATTEMPTS);
        assert!(format!("{err:#}").contains("connection refused"));
    }

    #[tokio::test]
    async fn test_log_mailer_succeeds() {
        let mailer = LogMailer::new("Greenlight <no-reply@greenlight.local>");
        assert!(mailer.send("alice@example.com", &welcome()).await.is_ok());
    }
}
