use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::debug;

/// How often idle limiter keys are dropped.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Per-key throttles for actions that send email.
#[derive(Clone)]
pub struct Limiters {
    otp: Arc<DefaultKeyedRateLimiter<String>>,
    alert: Arc<DefaultKeyedRateLimiter<i64>>,
}

impl Limiters {
    pub fn new(otp_per_minute: u32, alert_per_minute: u32) -> Self {
        Self {
            otp: Arc::new(RateLimiter::keyed(per_minute(otp_per_minute))),
            alert: Arc::new(RateLimiter::keyed(per_minute(alert_per_minute))),
        }
    }

    /// One OTP email (verification or reset) for `email`.
    pub fn allow_otp(&self, email: &str) -> bool {
        self.otp.check_key(&email.to_string()).is_ok()
    }

    /// One emergency fan-out for `user_id`.
    pub fn allow_alert(&self, user_id: i64) -> bool {
        self.alert.check_key(&user_id).is_ok()
    }

    /// Drop keys whose quota has fully replenished.
    pub fn prune(&self) {
        self.otp.retain_recent();
        self.otp.shrink_to_fit();
        self.alert.retain_recent();
        self.alert.shrink_to_fit();
    }

    /// Number of keys currently held across both limiters.
    pub fn tracked(&self) -> usize {
        self.otp.len() + self.alert.len()
    }

    /// Prune on a fixed tick for the life of the process.
    pub fn spawn_pruner(&self, every: Duration) -> JoinHandle<()> {
        let limits = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(every);
            loop {
                ticker.tick().await;
                limits.prune();
                debug!(keys = limits.tracked(), "rate limiter pruned");
            }
        })
    }
}

fn per_minute(n: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN))
}
