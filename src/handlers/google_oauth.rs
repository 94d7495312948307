use crate::error::HeavenError;
use crate::google_oauth::resolve_google_user;
use crate::router::HeavenState;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use time::Duration;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

const CSRF_COOKIE: &str = "oauth_csrf_token";
const PKCE_COOKIE: &str = "oauth_pkce_verifier";

/// GET /auth/google -> redirects to Google's consent page.
pub async fn google_oauth_entry(
    State(state): State<HeavenState>,
    jar: PrivateCookieJar,
) -> impl IntoResponse {
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf_token) = state.google.build_authorize_url(challenge);

    let secure = state.config.basic.secure_cookie;
    let jar = store_oauth_cookies(jar, &csrf_token, verifier.secret(), secure);

    info!("Dispatching OAuth redirect");
    (jar, Redirect::temporary(auth_url.as_str()))
}

/// GET /auth/google/callback -> signs the user in and hands the token to the frontend.
///
/// Every failure lands on the frontend login page; the cause is only logged.
pub async fn google_oauth_callback(
    State(state): State<HeavenState>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> Response {
    let frontend = &state.config.basic.frontend_url;
    let secure = state.config.basic.secure_cookie;
    let (pkce_verifier, csrf_cookie, jar) = match load_oauth_session(jar, secure) {
        Ok(data) => data,
        Err((jar, err)) => return redirect_to_login(jar, frontend, err),
    };

    let state_param = query.state.as_deref().unwrap_or_default();
    if !bool::from(state_param.as_bytes().ct_eq(csrf_cookie.as_bytes())) {
        return redirect_to_login(
            jar,
            frontend,
            HeavenError::OauthFlowError("CSRF token mismatch".to_string()),
        );
    }

    let Some(code) = query.code else {
        return redirect_to_login(
            jar,
            frontend,
            HeavenError::OauthFlowError("missing `code` in callback".to_string()),
        );
    };

    let token = match sign_in(&state, code, pkce_verifier).await {
        Ok(token) => token,
        Err(err) => return redirect_to_login(jar, frontend, err),
    };

    info!("Google sign-in completed");
    let target = frontend_url(frontend, "google-success", Some(&token));
    (jar, Redirect::to(target.as_str())).into_response()
}

async fn sign_in(
    state: &HeavenState,
    code: String,
    pkce_verifier: String,
) -> Result<String, HeavenError> {
    let identity = state
        .google
        .exchange_authorization_code(
            AuthorizationCode::new(code),
            PkceCodeVerifier::new(pkce_verifier),
        )
        .await?;
    let user = resolve_google_user(&state.storage, &identity).await?;
    state.jwt.issue(&user)
}

/// `<frontend>/<page>`, optionally carrying `?token=`.
pub fn frontend_url(base: &Url, page: &str, token: Option<&str>) -> Url {
    let mut url = base.clone();
    let path = format!("{}/{}", base.path().trim_end_matches('/'), page);
    url.set_path(&path);
    url.set_query(None);
    if let Some(token) = token {
        url.query_pairs_mut().append_pair("token", token);
    }
    url
}

fn store_oauth_cookies(
    jar: PrivateCookieJar,
    csrf: &CsrfToken,
    pkce_verifier: &str,
    secure: bool,
) -> PrivateCookieJar {
    jar.add(build_cookie(CSRF_COOKIE, csrf.secret().to_string(), secure))
        .add(build_cookie(PKCE_COOKIE, pkce_verifier.to_string(), secure))
}

fn load_oauth_session(
    jar: PrivateCookieJar,
    secure: bool,
) -> Result<(String, String, PrivateCookieJar), (PrivateCookieJar, HeavenError)> {
    let csrf_cookie = jar.get(CSRF_COOKIE).map(|c| c.value().to_owned());
    let pkce_cookie = jar.get(PKCE_COOKIE).map(|c| c.value().to_owned());
    let jar = clear_oauth_cookies(jar, secure);

    let Some(csrf_cookie) = csrf_cookie else {
        return Err((
            jar,
            HeavenError::OauthFlowError("Missing CSRF token in cookie".to_string()),
        ));
    };
    let Some(pkce_cookie) = pkce_cookie else {
        return Err((
            jar,
            HeavenError::OauthFlowError("Missing PKCE verifier in cookie".to_string()),
        ));
    };

    Ok((pkce_cookie, csrf_cookie, jar))
}

fn clear_oauth_cookies(jar: PrivateCookieJar, secure: bool) -> PrivateCookieJar {
    jar.remove(clear_cookie(CSRF_COOKIE, secure))
        .remove(clear_cookie(PKCE_COOKIE, secure))
}

fn build_cookie(name: &str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}

fn clear_cookie(name: &str, secure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

fn redirect_to_login(jar: PrivateCookieJar, frontend: &Url, err: HeavenError) -> Response {
    warn!(error = %err, "Google sign-in failed");
    let target = frontend_url(frontend, "login", None);
    (jar, Redirect::to(target.as_str())).into_response()
}
