use base64::Engine;
use serde_json::Value;

use crate::error::HeavenError;

/// The parts of a Google account we keep.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleIdentity {
    pub sub: String,
    pub email: String,
    pub name: String,
}

impl GoogleIdentity {
    /// Read identity claims from an ID token's payload segment.
    ///
    /// The signature is not checked: only use this on tokens received
    /// directly from Google's token endpoint.
    pub fn from_id_token(id_token: &str) -> Result<Self, HeavenError> {
        let payload_b64 = id_token
            .split('.')
            .nth(1)
            .ok_or_else(|| HeavenError::GoogleIdentity("malformed id_token".to_string()))?;
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload_b64.trim_end_matches('='))
            .map_err(|e| HeavenError::GoogleIdentity(format!("id_token payload: {e}")))?;
        let claims: Value = serde_json::from_slice(&decoded)?;
        Self::from_claims(&claims)
    }

    /// Build from a claims object (`id_token` payload or tokeninfo response).
    pub fn from_claims(claims: &Value) -> Result<Self, HeavenError> {
        let sub = claims
            .get("sub")
            .and_then(Value::as_str)
            .ok_or_else(|| HeavenError::GoogleIdentity("missing sub".to_string()))?;
        let email = claims
            .get("email")
            .and_then(Value::as_str)
            .ok_or_else(|| HeavenError::GoogleIdentity("missing email".to_string()))?;
        // tokeninfo sends "true"/"false" strings, id_token payloads send booleans
        let verified = match claims.get("email_verified") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        };
        if !verified {
            return Err(HeavenError::GoogleIdentity(
                "google email is not verified".to_string(),
            ));
        }
        let name = claims
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());

        Ok(Self {
            sub: sub.to_string(),
            email: email.to_string(),
            name,
        })
    }
}
