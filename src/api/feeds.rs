use crate::config::HazardConfig;
use crate::error::{HeavenError, IsRetryable};
use crate::hazard::Coordinates;
use crate::types::feeds::{
    EonetCollection, EonetFeature, NwsCollection, PowerResponse, Quake, TsunamiAlert,
    UsgsCollection, WeatherDay,
};
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// Search window for the USGS event query.
#[derive(Debug, Clone, Copy)]
pub struct QuakeQuery {
    pub hours: i64,
    pub radius_km: f64,
    pub min_magnitude: f64,
}

impl Default for QuakeQuery {
    fn default() -> Self {
        Self {
            hours: 48,
            radius_km: 500.0,
            min_magnitude: 3.0,
        }
    }
}

/// Client for the public hazard feeds (EONET, USGS, NWS, NASA POWER).
#[derive(Clone)]
pub struct HazardFeeds {
    client: reqwest::Client,
    cfg: Arc<HazardConfig>,
    retry: ExponentialBuilder,
}

impl HazardFeeds {
    pub fn new(cfg: &HazardConfig) -> Result<Self, HeavenError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15));
        if let Some(proxy_url) = cfg.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        Ok(Self::with_client(builder.build()?, cfg))
    }

    pub fn with_client(client: reqwest::Client, cfg: &HazardConfig) -> Self {
        Self {
            client,
            cfg: Arc::new(cfg.clone()),
            retry: default_retry_policy(),
        }
    }

    pub fn with_retry(mut self, retry: ExponentialBuilder) -> Self {
        self.retry = retry;
        self
    }

    /// Open EONET events from the last 14 days.
    pub async fn eonet_events(&self) -> Result<Vec<EonetFeature>, HeavenError> {
        let mut url = self.cfg.eonet_url.clone();
        url.query_pairs_mut()
            .append_pair("status", "open")
            .append_pair("days", "14")
            .append_pair("limit", "200");
        let collection: EonetCollection = self.get_json(url).await?;
        Ok(collection.features)
    }

    /// USGS events around `position`, newest first.
    pub async fn earthquakes(
        &self,
        position: Coordinates,
        query: QuakeQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<Quake>, HeavenError> {
        let start = now - ChronoDuration::hours(query.hours);
        let mut url = self.cfg.usgs_url.clone();
        url.query_pairs_mut()
            .append_pair("format", "geojson")
            .append_pair("starttime", &start.to_rfc3339())
            .append_pair("endtime", &now.to_rfc3339())
            .append_pair("latitude", &position.latitude.to_string())
            .append_pair("longitude", &position.longitude.to_string())
            .append_pair("maxradiuskm", &query.radius_km.to_string())
            .append_pair("minmagnitude", &query.min_magnitude.to_string())
            .append_pair("orderby", "time")
            .append_pair("limit", "50");
        let collection: UsgsCollection = self.get_json(url).await?;
        Ok(collection.features.into_iter().map(Quake::from).collect())
    }

    /// Active NWS tsunami alerts.
    pub async fn tsunami_alerts(&self) -> Result<Vec<TsunamiAlert>, HeavenError> {
        let mut url = self.cfg.nws_url.clone();
        url.query_pairs_mut().append_pair("event", "Tsunami");
        let collection: NwsCollection = self.get_json(url).await?;
        Ok(collection.features.into_iter().map(|f| f.properties).collect())
    }

    /// Five daily rows ending yesterday, since today's aggregate is incomplete.
    pub async fn daily_weather(
        &self,
        position: Coordinates,
        today: NaiveDate,
    ) -> Result<Vec<WeatherDay>, HeavenError> {
        let (start, end) = power_window(today);
        let mut url = self.cfg.power_url.clone();
        url.query_pairs_mut()
            .append_pair("parameters", "T2M,RH2M,PRECTOTCORR")
            .append_pair("community", "AG")
            .append_pair("start", &start)
            .append_pair("end", &end)
            .append_pair("latitude", &position.latitude.to_string())
            .append_pair("longitude", &position.longitude.to_string())
            .append_pair("format", "JSON");
        let resp: PowerResponse = self.get_json(url).await?;
        Ok(resp.into_days())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, HeavenError> {
        let host = url.host_str().unwrap_or_default().to_string();
        let value = (|| async {
            let resp = self
                .client
                .get(url.clone())
                .header(ACCEPT, "application/geo+json, application/json")
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(HeavenError::UpstreamStatus(status));
            }
            Ok(resp.json::<T>().await?)
        })
        .retry(self.retry)
        .when(|e: &HeavenError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!(host = %host, "feed request retrying after error {}, sleeping {:?}", err, dur);
        })
        .await?;
        info!(host = %host, "feed fetched");
        Ok(value)
    }
}

/// `(start, end)` as `YYYYMMDD`: end is yesterday, start four days earlier.
fn power_window(today: NaiveDate) -> (String, String) {
    let end = today - ChronoDuration::days(1);
    let start = end - ChronoDuration::days(4);
    (
        start.format("%Y%m%d").to_string(),
        end.format("%Y%m%d").to_string(),
    )
}
