use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

use crate::error::HeavenError;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_TOKENINFO_URI: &str = "https://oauth2.googleapis.com/tokeninfo";

pub const EONET_GEOJSON_URL: &str = "https://eonet.gsfc.nasa.gov/api/v3/events/geojson";
pub const USGS_QUERY_URL: &str = "https://earthquake.usgs.gov/fdsnws/event/1/query";
pub const NWS_ALERTS_URL: &str = "https://api.weather.gov/alerts/active";
pub const POWER_DAILY_URL: &str = "https://power.larc.nasa.gov/api/temporal/daily/point";

/// Placeholder shipped in `config.example.toml`; never a usable signing key.
pub const PLACEHOLDER_JWT_SECRET: &str = "change-me";

/// Process-wide configuration, resolved once on first access.
pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::load().expect("FATAL: failed to load configuration"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub auth: AuthConfig,
    pub google: GoogleConfig,
    pub smtp: Option<SmtpConfig>,
    pub hazard: HazardConfig,
}

impl Config {
    /// Layer defaults, then `config.toml`, then `SAFEHEAVEN_*` environment
    /// variables (`__` separates nested keys, e.g. `SAFEHEAVEN_AUTH__JWT_SECRET`).
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("SAFEHEAVEN_").split("__"))
            .extract()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
    /// Where browser redirects land after the Google flow.
    pub frontend_url: Url,
    pub cors_origin: String,
    /// Mark OAuth cookies `Secure`; disable only for plain-http development.
    pub secure_cookie: bool,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            database_url: "sqlite:safeheaven.sqlite".to_string(),
            loglevel: "info".to_string(),
            frontend_url: Url::parse("http://localhost:3000").expect("static url"),
            cors_origin: "http://localhost:3000".to_string(),
            secure_cookie: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Required; startup fails when empty or left at the placeholder.
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub otp_ttl_secs: i64,
    pub bcrypt_cost: u32,
    /// At least 64 bytes; a random key is generated when shorter.
    pub cookie_secret: String,
    pub otp_per_minute: u32,
    pub alert_per_minute: u32,
    /// Wrong guesses allowed before the outstanding code is discarded.
    pub max_otp_attempts: u32,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), HeavenError> {
        let secret = self.jwt_secret.trim();
        if secret.is_empty() || secret == PLACEHOLDER_JWT_SECRET {
            return Err(HeavenError::Config(
                "auth.jwt_secret must be set (SAFEHEAVEN_AUTH__JWT_SECRET)".to_string(),
            ));
        }
        if self.max_otp_attempts == 0 {
            return Err(HeavenError::Config(
                "auth.max_otp_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: 3600,
            otp_ttl_secs: 600,
            bcrypt_cost: 10,
            cookie_secret: String::new(),
            otp_per_minute: 3,
            alert_per_minute: 2,
            max_otp_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub tokeninfo_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: "http://localhost:5000/auth/google/callback".to_string(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URI.to_string(),
            tokeninfo_url: GOOGLE_TOKENINFO_URI.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    #[serde(default)]
    pub from_name: Option<String>,
}

fn default_smtp_port() -> u16 {
    465
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    /// Use the wide alerting radii instead of the production ones.
    pub lenient: bool,
    pub eonet_url: Url,
    pub usgs_url: Url,
    pub nws_url: Url,
    pub power_url: Url,
    pub proxy: Option<Url>,
    pub user_agent: String,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            lenient: false,
            eonet_url: Url::parse(EONET_GEOJSON_URL).expect("static url"),
            usgs_url: Url::parse(USGS_QUERY_URL).expect("static url"),
            nws_url: Url::parse(NWS_ALERTS_URL).expect("static url"),
            power_url: Url::parse(POWER_DAILY_URL).expect("static url"),
            proxy: None,
            user_agent: "SafeHeaven/1.0 (https://safeheaven.local)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_figment_roundtrip() {
        let cfg: Config = Figment::from(Serialized::defaults(Config::default()))
            .extract()
            .expect("defaults should extract");
        assert_eq!(cfg.basic.listen_addr, "0.0.0.0:5000");
        assert_eq!(cfg.auth.token_ttl_secs, 3600);
        assert!(cfg.smtp.is_none());
        assert!(!cfg.hazard.lenient);
    }

    #[test]
    fn jwt_secret_must_be_configured() {
        let mut auth = AuthConfig::default();
        assert!(matches!(auth.validate(), Err(HeavenError::Config(_))));

        auth.jwt_secret = PLACEHOLDER_JWT_SECRET.to_string();
        assert!(matches!(auth.validate(), Err(HeavenError::Config(_))));

        auth.jwt_secret = "  ".to_string();
        assert!(auth.validate().is_err());

        auth.jwt_secret = "a-real-secret".to_string();
        assert!(auth.validate().is_ok());

        auth.max_otp_attempts = 0;
        assert!(auth.validate().is_err());
    }

    #[test]
    fn nested_env_overrides_apply() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SAFEHEAVEN_AUTH__JWT_SECRET", "s3cret");
            jail.set_env("SAFEHEAVEN_HAZARD__LENIENT", "true");
            let cfg = Config::load()?;
            assert_eq!(cfg.auth.jwt_secret, "s3cret");
            assert!(cfg.hazard.lenient);
            Ok(())
        });
    }
}
