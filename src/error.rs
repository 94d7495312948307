use axum::{Json, http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::{error, warn};

#[derive(Debug, ThisError)]
pub enum HeavenError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Token signing error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("Blocking task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Mail delivery error: {0}")]
    Mail(String),

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("OAuth flow error: {0}")]
    OauthFlowError(String),

    #[error("Google identity rejected: {0}")]
    GoogleIdentity(String),

    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("User already exists")]
    UserExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Please verify your email before login")]
    EmailNotVerified,

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("Invalid OTP")]
    InvalidOtp,

    #[error("OTP expired")]
    OtpExpired,

    #[error("Too many invalid OTP attempts; request a new code")]
    TooManyOtpAttempts,

    #[error("Password reset not authorized; verify the reset OTP first")]
    ResetNotAuthorized,

    #[error("Missing token")]
    MissingToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Contact not found")]
    ContactNotFound,

    #[error("No emergency contacts with an email address")]
    NoReachableContacts,

    #[error("Too many requests")]
    RateLimited,
}

/// Errors worth another attempt against an upstream service.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for HeavenError {
    fn is_retryable(&self) -> bool {
        match self {
            HeavenError::Reqwest(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            HeavenError::UpstreamStatus(code) => {
                code.is_server_error() || *code == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for HeavenError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => HeavenError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                HeavenError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => HeavenError::Json(parse_err.into_inner()),
            RequestTokenError::Other(s) => HeavenError::Oauth2Token(s),
        }
    }
}

impl IntoResponse for HeavenError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            HeavenError::DatabaseError(_)
            | HeavenError::Jwt(_)
            | HeavenError::Hashing(_)
            | HeavenError::TaskJoin(_)
            | HeavenError::Json(_)
            | HeavenError::UrlParse(_)
            | HeavenError::Config(_) => {
                error!(error = %self, "internal error");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred.",
                );
            }
            HeavenError::Mail(_) => {
                error!(error = %self, "mail delivery failed");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "MAIL_ERROR",
                    "Failed to send email.",
                );
            }
            HeavenError::Reqwest(_) | HeavenError::UpstreamStatus(_) => {
                warn!(error = %self, "upstream failure");
                return error_response(
                    StatusCode::BAD_GATEWAY,
                    "BAD_GATEWAY",
                    "Upstream service is unavailable.",
                );
            }
            HeavenError::Oauth2Token(_)
            | HeavenError::Oauth2Server { .. }
            | HeavenError::OauthFlowError(_)
            | HeavenError::GoogleIdentity(_) => {
                warn!(error = %self, "google sign-in rejected");
                (StatusCode::UNAUTHORIZED, "GOOGLE_AUTH_FAILED")
            }
            HeavenError::Validation(_)
            | HeavenError::AlreadyVerified
            | HeavenError::InvalidOtp
            | HeavenError::OtpExpired
            | HeavenError::ResetNotAuthorized
            | HeavenError::NoReachableContacts => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            HeavenError::UserExists => (StatusCode::CONFLICT, "USER_EXISTS"),
            HeavenError::UserNotFound | HeavenError::ContactNotFound => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            HeavenError::InvalidCredentials
            | HeavenError::MissingToken
            | HeavenError::TokenExpired
            | HeavenError::InvalidToken => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            HeavenError::EmailNotVerified => (StatusCode::FORBIDDEN, "EMAIL_NOT_VERIFIED"),
            HeavenError::RateLimited | HeavenError::TooManyOtpAttempts => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT")
            }
        };
        error_response(status, code, &self.to_string())
    }
}

fn error_response(status: StatusCode, code: &str, message: &str) -> axum::response::Response {
    (status, Json(ApiErrorResponse::new(code, message))).into_response()
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

/// `message` is repeated at the top level for clients reading `data.message`.
#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub message: String,
    pub error: ApiErrorBody,
}

impl ApiErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            message: message.to_string(),
            error: ApiErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: HeavenError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn client_errors_carry_their_message() {
        let (status, body) = render(HeavenError::EmailNotVerified).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body["error"]["message"],
            "Please verify your email before login"
        );

        let (status, body) = render(HeavenError::TokenExpired).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Token expired");
    }

    #[tokio::test]
    async fn message_is_mirrored_at_top_level() {
        let (status, body) = render(HeavenError::Validation("name and phone are required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "name and phone are required");
        assert_eq!(body["error"]["message"], body["message"]);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");

        let (_, body) = render(HeavenError::Config("jwt secret".into())).await;
        assert_eq!(body["message"], "An internal server error occurred.");
        assert!(!body.to_string().contains("jwt secret"));
    }

    #[tokio::test]
    async fn internal_errors_are_masked() {
        let (status, body) = render(HeavenError::Mail("smtp exploded".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "MAIL_ERROR");
        assert_eq!(body["message"], "Failed to send email.");
        assert!(!body.to_string().contains("exploded"));
    }

    #[test]
    fn only_transient_upstream_failures_retry() {
        assert!(HeavenError::UpstreamStatus(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(HeavenError::UpstreamStatus(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(!HeavenError::UpstreamStatus(StatusCode::NOT_FOUND).is_retryable());
        assert!(!HeavenError::InvalidOtp.is_retryable());
    }
}
