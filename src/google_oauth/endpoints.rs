use crate::config::GoogleConfig;
use crate::error::HeavenError;
use crate::google_oauth::identity::GoogleIdentity;

use oauth2::{
    AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, ExtraTokenFields, PkceCodeChallenge, PkceCodeVerifier,
    RedirectUrl, Scope, StandardRevocableToken, StandardTokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Google OAuth endpoints bound to this deployment's client registration.
#[derive(Clone)]
pub struct GoogleOauthEndpoints {
    client: Arc<GoogleOauth2Client>,
    client_id: String,
    tokeninfo_url: Url,
    http: reqwest::Client,
}

impl GoogleOauthEndpoints {
    pub fn new(cfg: &GoogleConfig, http: reqwest::Client) -> Result<Self, HeavenError> {
        Ok(Self {
            client: Arc::new(build_oauth2_client(cfg)?),
            client_id: cfg.client_id.clone(),
            tokeninfo_url: Url::parse(&cfg.tokeninfo_url)?,
            http,
        })
    }

    /// Consent page URL with PKCE challenge; returns the CSRF state to remember.
    pub fn build_authorize_url(&self, challenge: PkceCodeChallenge) -> (Url, CsrfToken) {
        self.client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(challenge)
            .url()
    }

    /// Trade the callback code for tokens and read the identity from `id_token`.
    pub async fn exchange_authorization_code(
        &self,
        code: AuthorizationCode,
        verifier: PkceCodeVerifier,
    ) -> Result<GoogleIdentity, HeavenError> {
        let token: GoogleTokenResponse = self
            .client
            .exchange_code(code)
            .set_pkce_verifier(verifier)
            .request_async(&self.http)
            .await?;
        let id_token = token.extra_fields().id_token.as_deref().ok_or_else(|| {
            HeavenError::OauthFlowError("token response missing id_token".to_string())
        })?;
        let identity = GoogleIdentity::from_id_token(id_token)?;
        info!(email = %identity.email, "Google authorization code exchanged");
        Ok(identity)
    }

    /// Validate a client-side ID token through Google's tokeninfo endpoint.
    pub async fn verify_id_token(&self, id_token: &str) -> Result<GoogleIdentity, HeavenError> {
        let resp = self
            .http
            .get(self.tokeninfo_url.clone())
            .query(&[("id_token", id_token)])
            .header("Accept", "application/json")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(HeavenError::GoogleIdentity(format!(
                "tokeninfo rejected token with status {}",
                resp.status()
            )));
        }
        let claims: Value = resp.json().await?;
        let aud = claims.get("aud").and_then(Value::as_str).unwrap_or_default();
        if aud != self.client_id {
            return Err(HeavenError::GoogleIdentity(
                "token audience does not match this client".to_string(),
            ));
        }
        GoogleIdentity::from_claims(&claims)
    }
}

/// Build the Google OAuth2 client from configuration.
fn build_oauth2_client(cfg: &GoogleConfig) -> Result<GoogleOauth2Client, HeavenError> {
    let client = OAuth2Client::new(ClientId::new(cfg.client_id.clone()))
        .set_client_secret(ClientSecret::new(cfg.client_secret.clone()))
        .set_auth_uri(AuthUrl::new(cfg.auth_url.clone())?)
        .set_token_uri(TokenUrl::new(cfg.token_url.clone())?)
        .set_redirect_uri(RedirectUrl::new(cfg.redirect_url.clone())?);
    Ok(client)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleTokenField {
    #[serde(rename = "id_token")]
    pub id_token: Option<String>,
}
impl ExtraTokenFields for GoogleTokenField {}

pub type GoogleTokenResponse = StandardTokenResponse<GoogleTokenField, BasicTokenType>;

pub type GoogleOauth2Client = OAuth2Client<
    BasicErrorResponse,
    GoogleTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;
