use crate::api::HazardFeeds;
use crate::config::Config;
use crate::db::HeavenStorage;
use crate::error::HeavenError;
use crate::google_oauth::GoogleOauthEndpoints;
use crate::handlers::{auth, emergency, google_oauth, hazards};
use crate::middleware::auth::JwtKeys;
use crate::service::limiter::Limiters;
use crate::service::mailer::Mailer;
use axum::{
    Router,
    extract::FromRef,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

#[derive(Clone)]
pub struct HeavenState {
    pub storage: HeavenStorage,
    pub mailer: Arc<dyn Mailer>,
    pub jwt: JwtKeys,
    pub google: GoogleOauthEndpoints,
    pub feeds: HazardFeeds,
    pub limits: Limiters,
    pub config: Arc<Config>,
    cookie_key: Key,
}

impl HeavenState {
    pub fn new(
        config: Config,
        storage: HeavenStorage,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, HeavenError> {
        let oauth_http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            // token endpoints must not follow redirects
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let feeds = HazardFeeds::new(&config.hazard)?;
        Self::with_parts(config, storage, mailer, oauth_http, feeds)
    }

    /// Assemble state around caller-supplied HTTP clients.
    pub fn with_parts(
        config: Config,
        storage: HeavenStorage,
        mailer: Arc<dyn Mailer>,
        oauth_http: reqwest::Client,
        feeds: HazardFeeds,
    ) -> Result<Self, HeavenError> {
        let auth = &config.auth;
        auth.validate()?;
        let cookie_key = match Key::try_from(auth.cookie_secret.as_bytes()) {
            Ok(key) => key,
            Err(_) => {
                warn!("cookie_secret shorter than 64 bytes; using a random cookie key");
                Key::generate()
            }
        };
        Ok(Self {
            storage,
            mailer,
            jwt: JwtKeys::new(&auth.jwt_secret, auth.token_ttl_secs),
            google: GoogleOauthEndpoints::new(&config.google, oauth_http)?,
            feeds,
            limits: Limiters::new(auth.otp_per_minute, auth.alert_per_minute),
            cookie_key,
            config: Arc::new(config),
        })
    }
}

impl FromRef<HeavenState> for Key {
    fn from_ref(state: &HeavenState) -> Self {
        state.cookie_key.clone()
    }
}

impl FromRef<HeavenState> for JwtKeys {
    fn from_ref(state: &HeavenState) -> Self {
        state.jwt.clone()
    }
}

pub fn heaven_router(state: HeavenState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/resend-otp", post(auth::resend_otp))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/verify-reset-otp", post(auth::verify_reset_otp))
        .route("/reset-password", post(auth::reset_password))
        .route("/google", post(auth::google_token))
        .route("/me", get(auth::me));

    let emergency_routes = Router::new()
        .route(
            "/",
            post(emergency::create_contact).get(emergency::list_contacts),
        )
        .route("/send-email", post(emergency::send_email))
        .route(
            "/{id}",
            get(emergency::get_contact)
                .put(emergency::update_contact)
                .delete(emergency::delete_contact),
        );

    let hazard_routes = Router::new()
        .route("/evaluate", get(hazards::evaluate))
        .route("/summary", get(hazards::summary));

    let cors = cors_layer(&state.config.basic.cors_origin);

    Router::new()
        .route("/", get(health))
        .nest("/api/auth", auth_routes)
        .nest("/api/emergency", emergency_routes)
        .nest("/api/hazards", hazard_routes)
        .route("/api/trigger-alert", post(emergency::trigger_alert))
        .route("/auth/google", get(google_oauth::google_oauth_entry))
        .route(
            "/auth/google/callback",
            get(google_oauth::google_oauth_callback),
        )
        .route("/auth/logout", get(auth::logout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "SafeHeaven API is running"
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60));
    match HeaderValue::from_str(origin) {
        Ok(value) => cors.allow_origin(value),
        Err(_) => {
            warn!(origin = %origin, "invalid CORS origin; cross-origin requests disabled");
            cors
        }
    }
}
