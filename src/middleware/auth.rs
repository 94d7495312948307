use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use chrono::{Duration, Utc};
use headers::{Authorization, authorization::Bearer};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::DbUser;
use crate::error::HeavenError;

/// JWT payload carried by every session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User id as decimal string.
    pub sub: String,
    pub email: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signing keys plus token lifetime.
#[derive(Clone)]
pub struct JwtKeys {
    inner: Arc<JwtKeysInner>,
}

struct JwtKeysInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            inner: Arc::new(JwtKeysInner {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
                ttl: Duration::seconds(ttl_secs),
            }),
        }
    }

    pub fn issue(&self, user: &DbUser) -> Result<String, HeavenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            iat: now.timestamp(),
            exp: (now + self.inner.ttl).timestamp(),
        };
        self.encode(&claims)
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, HeavenError> {
        Ok(jsonwebtoken::encode(
            &Header::default(),
            claims,
            &self.inner.encoding,
        )?)
    }

    /// Validate signature and expiry; expired tokens get their own error.
    pub fn verify(&self, token: &str) -> Result<Claims, HeavenError> {
        jsonwebtoken::decode::<Claims>(token, &self.inner.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => HeavenError::TokenExpired,
                _ => HeavenError::InvalidToken,
            })
    }
}

/// Caller identity resolved from `Authorization: Bearer <jwt>`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub name: String,
}

impl TryFrom<Claims> for AuthUser {
    type Error = HeavenError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = claims.sub.parse().map_err(|_| HeavenError::InvalidToken)?;
        Ok(Self {
            id,
            email: claims.email,
            name: claims.name,
        })
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = HeavenError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| HeavenError::MissingToken)?;
        let keys = JwtKeys::from_ref(state);
        keys.verify(bearer.token())?.try_into()
    }
}
