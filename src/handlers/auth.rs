use crate::db::{DbUser, NewUser};
use crate::error::HeavenError;
use crate::google_oauth::resolve_google_user;
use crate::middleware::auth::AuthUser;
use crate::middleware::json::JsonBody;
use crate::router::HeavenState;
use crate::service::crypto::{generate_otp, hash_password, normalize_email, verify_password};
use crate::service::mailer::Mail;
use crate::types::auth::{
    AuthResponse, EmailRequest, GoogleTokenRequest, LoginRequest, MessageResponse, OtpRequest,
    RegisterRequest, RegisterResponse, ResetPasswordRequest, UserView,
};
use axum::{Json, extract::State, http::StatusCode};
use chrono::{Duration, Utc};
use tracing::{info, warn};

const MIN_PASSWORD_LEN: usize = 6;

fn check_password(password: &str) -> Result<(), HeavenError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(HeavenError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

async fn user_by_email(state: &HeavenState, email: &str) -> Result<DbUser, HeavenError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(HeavenError::Validation("email is required".to_string()));
    }
    state
        .storage
        .find_user_by_email(&email)
        .await?
        .ok_or(HeavenError::UserNotFound)
}

fn otp_ttl(state: &HeavenState) -> Duration {
    Duration::seconds(state.config.auth.otp_ttl_secs)
}

/// Store a fresh code for `user` and return it.
async fn issue_otp(state: &HeavenState, user: &DbUser) -> Result<String, HeavenError> {
    let otp = generate_otp();
    state
        .storage
        .set_otp(user.id, &otp, Utc::now() + otp_ttl(state))
        .await?;
    Ok(otp)
}

/// `DbUser::check_otp` plus a per-code guess limit.
async fn consume_otp(
    state: &HeavenState,
    user: &DbUser,
    submitted: &str,
) -> Result<(), HeavenError> {
    match user.check_otp(submitted, Utc::now()) {
        Err(HeavenError::InvalidOtp) if user.otp.is_some() => {
            let max = state.config.auth.max_otp_attempts;
            let attempts = state.storage.record_otp_failure(user.id, max).await?;
            if attempts >= max {
                warn!(user_id = user.id, attempts, "otp discarded after repeated failures");
                return Err(HeavenError::TooManyOtpAttempts);
            }
            Err(HeavenError::InvalidOtp)
        }
        checked => checked,
    }
}

fn authenticated(
    state: &HeavenState,
    user: &DbUser,
    message: &str,
) -> Result<Json<AuthResponse>, HeavenError> {
    Ok(Json(AuthResponse {
        message: message.to_string(),
        token: state.jwt.issue(user)?,
        user: UserView::from(user),
    }))
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<HeavenState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), HeavenError> {
    let name = req.name.trim().to_string();
    let email = normalize_email(&req.email);
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(HeavenError::Validation(
            "name, email and password are required".to_string(),
        ));
    }
    check_password(&req.password)?;

    let password_hash = hash_password(req.password, state.config.auth.bcrypt_cost).await?;
    let user = state
        .storage
        .create_user(NewUser {
            name,
            email,
            password_hash: Some(password_hash),
            google_id: None,
            is_verified: false,
        })
        .await?;

    let otp = issue_otp(&state, &user).await?;
    let ttl_minutes = otp_ttl(&state).num_minutes();
    state
        .mailer
        .send(Mail::verification(&user.email, &otp, ttl_minutes))
        .await?;

    info!(user_id = user.id, "user registered, verification code sent");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registered successfully. Check your email for the OTP.".to_string(),
            user: UserView::from(&user),
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<HeavenState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>, HeavenError> {
    let email = normalize_email(&req.email);
    let Some(user) = state.storage.find_user_by_email(&email).await? else {
        return Err(HeavenError::InvalidCredentials);
    };
    // Google-only accounts have no password to match
    let Some(hash) = user.password_hash.clone() else {
        return Err(HeavenError::InvalidCredentials);
    };
    if !verify_password(req.password, hash).await? {
        return Err(HeavenError::InvalidCredentials);
    }
    if !user.is_verified {
        return Err(HeavenError::EmailNotVerified);
    }

    info!(user_id = user.id, "login");
    authenticated(&state, &user, "Login successful")
}

/// POST /api/auth/verify-otp
pub async fn verify_otp(
    State(state): State<HeavenState>,
    JsonBody(req): JsonBody<OtpRequest>,
) -> Result<Json<AuthResponse>, HeavenError> {
    let mut user = user_by_email(&state, &req.email).await?;
    consume_otp(&state, &user, &req.otp).await?;
    state.storage.mark_verified(user.id).await?;
    user.is_verified = true;
    user.otp = None;
    user.otp_expiry = None;

    info!(user_id = user.id, "email verified");
    authenticated(&state, &user, "Email verified successfully")
}

/// POST /api/auth/resend-otp
pub async fn resend_otp(
    State(state): State<HeavenState>,
    JsonBody(req): JsonBody<EmailRequest>,
) -> Result<Json<MessageResponse>, HeavenError> {
    let user = user_by_email(&state, &req.email).await?;
    if user.is_verified {
        return Err(HeavenError::AlreadyVerified);
    }
    if !state.limits.allow_otp(&user.email) {
        return Err(HeavenError::RateLimited);
    }

    let otp = issue_otp(&state, &user).await?;
    state
        .mailer
        .send(Mail::verification(
            &user.email,
            &otp,
            otp_ttl(&state).num_minutes(),
        ))
        .await?;
    Ok(Json(MessageResponse::new("OTP resent successfully")))
}

/// POST /api/auth/forgot-password
pub async fn forgot_password(
    State(state): State<HeavenState>,
    JsonBody(req): JsonBody<EmailRequest>,
) -> Result<Json<MessageResponse>, HeavenError> {
    let user = user_by_email(&state, &req.email).await?;
    if !state.limits.allow_otp(&user.email) {
        return Err(HeavenError::RateLimited);
    }

    let otp = issue_otp(&state, &user).await?;
    state
        .mailer
        .send(Mail::password_reset(
            &user.email,
            &otp,
            otp_ttl(&state).num_minutes(),
        ))
        .await?;
    info!(user_id = user.id, "password reset code sent");
    Ok(Json(MessageResponse::new("Password reset OTP sent to your email")))
}

/// POST /api/auth/verify-reset-otp
pub async fn verify_reset_otp(
    State(state): State<HeavenState>,
    JsonBody(req): JsonBody<OtpRequest>,
) -> Result<Json<MessageResponse>, HeavenError> {
    let user = user_by_email(&state, &req.email).await?;
    consume_otp(&state, &user, &req.otp).await?;
    state
        .storage
        .open_reset_window(user.id, Utc::now() + otp_ttl(&state))
        .await?;
    Ok(Json(MessageResponse::new(
        "OTP verified. You can now reset your password.",
    )))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<HeavenState>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, HeavenError> {
    check_password(&req.new_password)?;
    let user = user_by_email(&state, &req.email).await?;
    if !user.reset_window_open(Utc::now()) {
        return Err(HeavenError::ResetNotAuthorized);
    }

    let hash = hash_password(req.new_password, state.config.auth.bcrypt_cost).await?;
    state.storage.reset_password(user.id, &hash).await?;
    info!(user_id = user.id, "password reset");
    Ok(Json(MessageResponse::new("Password reset successfully")))
}

/// POST /api/auth/google -> sign in with an ID token obtained client-side.
pub async fn google_token(
    State(state): State<HeavenState>,
    JsonBody(req): JsonBody<GoogleTokenRequest>,
) -> Result<Json<AuthResponse>, HeavenError> {
    let credential = req.credential.trim();
    if credential.is_empty() {
        return Err(HeavenError::Validation("credential is required".to_string()));
    }
    let identity = state.google.verify_id_token(credential).await?;
    let user = resolve_google_user(&state.storage, &identity).await?;
    authenticated(&state, &user, "Google login successful")
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<HeavenState>,
    caller: AuthUser,
) -> Result<Json<UserView>, HeavenError> {
    let user = state
        .storage
        .get_user(caller.id)
        .await?
        .ok_or(HeavenError::UserNotFound)?;
    Ok(Json(UserView::from(&user)))
}

/// GET /auth/logout -> tokens are stateless; the client drops its copy.
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse::new(
        "Logged out. Please clear token on frontend.",
    ))
}
