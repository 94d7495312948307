//! Password hashing and one-time codes.

use crate::error::HeavenError;
use rand::Rng;

/// Hash a password with bcrypt on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, HeavenError> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hash)
}

/// Verify a password against a bcrypt hash on the blocking pool.
pub async fn verify_password(password: String, hash: String) -> Result<bool, HeavenError> {
    let ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(ok)
}

/// Random 6-digit code, never with a leading zero.
pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(100000..1000000);
    code.to_string()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
