#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use backon::ExponentialBuilder;
use futures::future::BoxFuture;
use safeheaven::HeavenError;
use safeheaven::api::HazardFeeds;
use safeheaven::config::{Config, HazardConfig};
use safeheaven::db::{HeavenStorage, connect};
use safeheaven::service::mailer::{Mail, Mailer};
use safeheaven::{HeavenState, heaven_router};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-jwt-secret";

/// Records every mail; recipients in `fail_for` get a delivery error.
#[derive(Default)]
pub struct CaptureMailer {
    pub sent: Mutex<Vec<Mail>>,
    pub fail_for: Vec<String>,
}

impl Mailer for CaptureMailer {
    fn send(&self, mail: Mail) -> BoxFuture<'_, Result<(), HeavenError>> {
        Box::pin(async move {
            if self.fail_for.contains(&mail.to) {
                return Err(HeavenError::Mail(format!("mailbox {} unavailable", mail.to)));
            }
            self.sent.lock().expect("mail log poisoned").push(mail);
            Ok(())
        })
    }
}

impl CaptureMailer {
    pub fn to(&self, addr: &str) -> Vec<Mail> {
        self.sent
            .lock()
            .expect("mail log poisoned")
            .iter()
            .filter(|m| m.to == addr)
            .cloned()
            .collect()
    }

    /// Six-digit code from the newest mail sent to `addr`.
    pub fn last_code(&self, addr: &str) -> String {
        let mail = self.to(addr).pop().expect("no mail for recipient");
        mail.body
            .split(|c: char| !c.is_ascii_digit())
            .find(|run| run.len() == 6)
            .expect("mail carries no code")
            .to_string()
    }
}

pub struct TestApp {
    pub router: Router,
    pub storage: HeavenStorage,
    pub mails: Arc<CaptureMailer>,
}

pub fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.auth.jwt_secret = JWT_SECRET.to_string();
    cfg.auth.bcrypt_cost = 4;
    cfg.auth.cookie_secret = "k".repeat(64);
    cfg.google.client_id = "test-client".to_string();
    cfg.google.client_secret = "test-secret".to_string();
    cfg
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config(), CaptureMailer::default()).await
}

pub async fn spawn_app_with(cfg: Config, mailer: CaptureMailer) -> TestApp {
    let storage = HeavenStorage::new(connect("sqlite::memory:").await.expect("db"));
    storage.init_schema().await.expect("schema");
    let mails = Arc::new(mailer);
    let state = HeavenState::with_parts(
        cfg.clone(),
        storage.clone(),
        mails.clone(),
        reqwest::Client::new(),
        fast_feeds(&cfg.hazard),
    )
    .expect("state");
    TestApp {
        router: heaven_router(state),
        storage,
        mails,
    }
}

pub fn fast_feeds(cfg: &HazardConfig) -> HazardFeeds {
    HazardFeeds::with_client(reqwest::Client::new(), cfg).with_retry(
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(5))
            .with_max_delay(Duration::from_millis(10))
            .with_max_times(1),
    )
}

impl TestApp {
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .expect("failed to build request");
        self.send(req).await
    }

    /// Like `call`, but the body is sent verbatim as `application/json`.
    pub async fn call_raw(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: &str,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = req
            .body(Body::from(body.to_string()))
            .expect("failed to build request");
        self.send(req).await
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("request failed");
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, None, Some(body)).await
    }

    /// Register and verify an account, returning its bearer token.
    pub async fn verified_user(&self, name: &str, email: &str, password: &str) -> String {
        let (status, _) = self
            .post(
                "/api/auth/register",
                serde_json::json!({ "name": name, "email": email, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let code = self.mails.last_code(email);
        let (status, body) = self
            .post(
                "/api/auth/verify-otp",
                serde_json::json!({ "email": email, "otp": code }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().expect("token").to_string()
    }
}

pub fn error_message(body: &Value) -> &str {
    body["error"]["message"].as_str().unwrap_or_default()
}
