//! Outbound email: OTP codes, password resets and emergency alerts.

use crate::config::SmtpConfig;
use crate::error::HeavenError;
use futures::future::BoxFuture;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Mail {
    pub fn verification(to: &str, code: &str, ttl_minutes: i64) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your SafeHeaven verification code".to_string(),
            body: format!(
                "Your verification code is: {code}\n\n\
                 It expires in {ttl_minutes} minutes.\n\n\
                 If you didn't request this, you can safely ignore this email."
            ),
        }
    }

    pub fn password_reset(to: &str, code: &str, ttl_minutes: i64) -> Self {
        Self {
            to: to.to_string(),
            subject: "SafeHeaven password reset code".to_string(),
            body: format!(
                "Your password reset code is: {code}\n\n\
                 It expires in {ttl_minutes} minutes.\n\n\
                 If you didn't request this, you can safely ignore this email."
            ),
        }
    }

    pub fn emergency_alert(to: &str, sender_name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("EMERGENCY ALERT from {sender_name}"),
            body: format!(
                "{sender_name} has triggered an emergency alert and listed you as an \
                 emergency contact.\n\n\
                 Last known location: {latitude:.5}, {longitude:.5}\n\
                 Map: https://www.google.com/maps?q={latitude},{longitude}\n\n\
                 Please try to reach them or contact local emergency services."
            ),
        }
    }
}

/// Delivers a single message.
pub trait Mailer: Send + Sync {
    fn send(&self, mail: Mail) -> BoxFuture<'_, Result<(), HeavenError>>;
}

/// Mailer that only logs; used when SMTP is not configured.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: Mail) -> BoxFuture<'_, Result<(), HeavenError>> {
        Box::pin(async move {
            info!(to = %mail.to, subject = %mail.subject, body = %mail.body, "mail (log only)");
            Ok(())
        })
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, HeavenError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| HeavenError::Mail(format!("failed to create SMTP transport: {e}")))?
            .port(config.port)
            .credentials(creds)
            .build();

        let from = match &config.from_name {
            Some(name) => format!("{} <{}>", name, config.from_email),
            None => config.from_email.clone(),
        };
        let from = from
            .parse()
            .map_err(|e| HeavenError::Mail(format!("invalid from address: {e}")))?;

        info!(host = %config.host, port = config.port, "SMTP transport configured");
        Ok(Self { transport, from })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, mail: Mail) -> BoxFuture<'_, Result<(), HeavenError>> {
        Box::pin(async move {
            let to: Mailbox = mail
                .to
                .parse()
                .map_err(|e| HeavenError::Mail(format!("invalid recipient {}: {e}", mail.to)))?;
            let message = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(mail.subject)
                .header(ContentType::TEXT_PLAIN)
                .body(mail.body)
                .map_err(|e| HeavenError::Mail(format!("failed to build email: {e}")))?;

            self.transport
                .send(message)
                .await
                .map_err(|e| HeavenError::Mail(format!("failed to send email: {e}")))?;
            info!(to = %mail.to, "mail sent");
            Ok(())
        })
    }
}

/// SMTP when configured, log-only otherwise.
pub fn from_config(smtp: Option<&SmtpConfig>) -> Result<Arc<dyn Mailer>, HeavenError> {
    match smtp {
        Some(cfg) => Ok(Arc::new(SmtpMailer::new(cfg)?)),
        None => Ok(Arc::new(LogMailer)),
    }
}
