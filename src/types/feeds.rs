//! Wire shapes of the public hazard feeds and their normalized forms.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// NASA POWER marks missing samples with this fill value.
const POWER_FILL_VALUE: f64 = -999.0;

/// Feature lists are read item by item; one malformed feature is dropped
/// instead of failing the whole collection.
fn skip_invalid<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    let total = raw.len();
    let kept: Vec<T> = raw
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if kept.len() < total {
        warn!(skipped = total - kept.len(), total, "dropped malformed feed features");
    }
    Ok(kept)
}

// ---- EONET (GeoJSON) ----

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EonetCollection {
    #[serde(default, deserialize_with = "skip_invalid")]
    pub features: Vec<EonetFeature>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EonetFeature {
    #[serde(default)]
    pub properties: EonetProperties,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EonetProperties {
    pub id: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub categories: Vec<EonetCategory>,
    pub date: Option<String>,
    pub geometry_dates: Vec<String>,
    pub magnitude_value: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EonetCategory {
    pub id: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: Vec<f64>,
    },
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    #[serde(other)]
    Unsupported,
}

impl Geometry {
    /// Outer ring as `[lon, lat]` pairs; positions with fewer than two values are skipped.
    pub fn outer_ring(&self) -> Vec<[f64; 2]> {
        match self {
            Geometry::Polygon { coordinates } => coordinates
                .first()
                .map(|ring| {
                    ring.iter()
                        .filter_map(|pos| match pos.as_slice() {
                            [lon, lat, ..] => Some([*lon, *lat]),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

// ---- USGS FDSN event query (GeoJSON) ----

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsgsCollection {
    #[serde(default, deserialize_with = "skip_invalid")]
    pub features: Vec<UsgsFeature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsgsFeature {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub properties: UsgsProperties,
    #[serde(default)]
    pub geometry: Option<UsgsGeometry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UsgsProperties {
    pub mag: Option<f64>,
    pub place: Option<String>,
    pub time: Option<i64>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UsgsGeometry {
    pub coordinates: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuakePosition {
    pub lon: f64,
    pub lat: f64,
    pub depth: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Quake {
    pub id: String,
    pub mag: Option<f64>,
    pub place: String,
    /// Milliseconds since the epoch.
    pub time: Option<i64>,
    pub url: String,
    pub coords: Option<QuakePosition>,
}

impl From<UsgsFeature> for Quake {
    fn from(f: UsgsFeature) -> Self {
        let coords = f
            .geometry
            .and_then(|g| match g.coordinates.as_slice() {
                [lon, lat, rest @ ..] => Some(QuakePosition {
                    lon: *lon,
                    lat: *lat,
                    depth: rest.first().copied(),
                }),
                _ => None,
            });
        Self {
            id: f.id,
            mag: f.properties.mag,
            place: f.properties.place.unwrap_or_default(),
            time: f.properties.time,
            url: f.properties.url.unwrap_or_default(),
            coords,
        }
    }
}

// ---- NWS active alerts ----

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NwsCollection {
    #[serde(default, deserialize_with = "skip_invalid")]
    pub features: Vec<NwsFeature>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NwsFeature {
    #[serde(default)]
    pub properties: TsunamiAlert,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TsunamiAlert {
    pub headline: Option<String>,
    pub event: Option<String>,
    pub severity: Option<String>,
    pub area_desc: Option<String>,
    pub sent: Option<String>,
}

// ---- NASA POWER daily point ----

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PowerResponse {
    #[serde(default)]
    pub properties: PowerProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PowerProperties {
    #[serde(default)]
    pub parameter: PowerParameters,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PowerParameters {
    #[serde(rename = "T2M")]
    pub t2m: BTreeMap<String, Option<f64>>,
    #[serde(rename = "RH2M")]
    pub rh2m: BTreeMap<String, Option<f64>>,
    #[serde(rename = "PRECTOTCORR")]
    pub prectotcorr: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeatherDay {
    /// `YYYYMMDD`
    pub date: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub rain: Option<f64>,
}

impl PowerResponse {
    /// One row per temperature date, oldest first.
    pub fn into_days(self) -> Vec<WeatherDay> {
        let p = self.properties.parameter;
        let sample = |m: &BTreeMap<String, Option<f64>>, date: &str| {
            m.get(date)
                .copied()
                .flatten()
                .filter(|v| v.is_finite() && *v > POWER_FILL_VALUE)
        };
        p.t2m
            .keys()
            .map(|date| WeatherDay {
                date: date.clone(),
                temperature: sample(&p.t2m, date),
                humidity: sample(&p.rh2m, date),
                rain: sample(&p.prectotcorr, date),
            })
            .collect()
    }
}
