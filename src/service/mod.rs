pub mod crypto;
pub mod limiter;
pub mod mailer;
