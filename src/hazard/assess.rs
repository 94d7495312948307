//! Dashboard-level hazard status from weather, seismic and tsunami feeds.

use serde::Serialize;

use super::{DisasterType, Severity};
use crate::types::feeds::{Quake, TsunamiAlert, WeatherDay};

const FLOOD_CRITICAL_MM: f64 = 80.0;
const FLOOD_WARNING_MM: f64 = 30.0;
const CYCLONE_WARNING_MM: f64 = 60.0;
const STRONG_QUAKE_MAG: f64 = 5.0;
const CLUSTER_QUAKE_MAG: f64 = 4.0;
const CLUSTER_SIZE: usize = 3;

/// Latest row carrying any measurement, else the last row.
pub fn latest_available(days: &[WeatherDay]) -> Option<&WeatherDay> {
    days.iter()
        .rev()
        .find(|d| d.rain.is_some() || d.humidity.is_some() || d.temperature.is_some())
        .or_else(|| days.last())
}

fn last_rain(days: &[WeatherDay]) -> f64 {
    days.last().and_then(|d| d.rain).unwrap_or(0.0)
}

pub fn flood_status(days: &[WeatherDay]) -> Severity {
    let rain = last_rain(days);
    if rain >= FLOOD_CRITICAL_MM {
        Severity::Critical
    } else if rain >= FLOOD_WARNING_MM {
        Severity::Warning
    } else {
        Severity::Neutral
    }
}

pub fn cyclone_status(days: &[WeatherDay]) -> Severity {
    if last_rain(days) >= CYCLONE_WARNING_MM {
        Severity::Warning
    } else {
        Severity::Neutral
    }
}

/// Warning on one strong quake or a cluster of moderate ones.
pub fn earthquake_status(quakes: &[Quake]) -> Severity {
    let mag = |q: &Quake| q.mag.unwrap_or(0.0);
    let any_strong = quakes.iter().any(|q| mag(q) >= STRONG_QUAKE_MAG);
    let cluster = quakes.iter().filter(|q| mag(q) >= CLUSTER_QUAKE_MAG).count() >= CLUSTER_SIZE;
    if any_strong || cluster {
        Severity::Warning
    } else {
        Severity::Neutral
    }
}

pub fn tsunami_status(alerts: &[TsunamiAlert]) -> Severity {
    if alerts.is_empty() {
        Severity::Neutral
    } else {
        Severity::Warning
    }
}

/// Raw per-source results; an `Err` holds the message shown in place of data.
#[derive(Debug, Clone)]
pub struct SourceData {
    pub weather: Result<Vec<WeatherDay>, String>,
    pub quakes: Result<Vec<Quake>, String>,
    pub tsunami: Result<Vec<TsunamiAlert>, String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherCard {
    pub status: Severity,
    pub latest: Option<WeatherDay>,
    pub note: &'static str,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EarthquakeCard {
    pub status: Severity,
    pub count: usize,
    pub strongest: Option<f64>,
    pub quakes: Vec<Quake>,
    pub note: &'static str,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TsunamiCard {
    pub status: Severity,
    pub count: usize,
    pub most_recent: Option<String>,
    pub note: &'static str,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct TopHazard {
    pub key: DisasterType,
    pub level: Severity,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HazardSummary {
    pub flood: WeatherCard,
    pub cyclone: WeatherCard,
    pub earthquake: EarthquakeCard,
    pub tsunami: TsunamiCard,
    pub top: TopHazard,
    pub updated_at: String,
}

pub fn summarize(data: SourceData, updated_at: String) -> HazardSummary {
    let (days, weather_err) = split(data.weather);
    let (quakes, quake_err) = split(data.quakes);
    let (alerts, tsunami_err) = split(data.tsunami);

    let latest = latest_available(&days).cloned();
    let weather_card = |status| WeatherCard {
        status,
        latest: latest.clone(),
        note: "Latest available day within last 5 days (NASA POWER)",
        error: weather_err.clone(),
    };
    let flood = weather_card(flood_status(&days));
    let cyclone = weather_card(cyclone_status(&days));

    let strongest = quakes
        .iter()
        .filter_map(|q| q.mag)
        .fold(None, |acc: Option<f64>, m| Some(acc.map_or(m, |a| a.max(m))));
    let earthquake = EarthquakeCard {
        status: earthquake_status(&quakes),
        count: quakes.len(),
        strongest,
        quakes,
        note: "USGS 48h within 500 km",
        error: quake_err,
    };

    let tsunami = TsunamiCard {
        status: tsunami_status(&alerts),
        count: alerts.len(),
        most_recent: alerts.first().and_then(|a| a.headline.clone()),
        note: "NWS tsunami alerts",
        error: tsunami_err,
    };

    let top = top_hazard(&[
        (DisasterType::Flood, flood.status),
        (DisasterType::Cyclone, cyclone.status),
        (DisasterType::Earthquake, earthquake.status),
        (DisasterType::Tsunami, tsunami.status),
    ]);

    HazardSummary {
        flood,
        cyclone,
        earthquake,
        tsunami,
        top,
        updated_at,
    }
}

/// Highest level; earlier entries win ties.
fn top_hazard(levels: &[(DisasterType, Severity)]) -> TopHazard {
    let mut top = TopHazard {
        key: levels.first().map_or(DisasterType::Flood, |(k, _)| *k),
        level: Severity::Neutral,
    };
    for &(key, level) in levels {
        if level > top.level {
            top = TopHazard { key, level };
        }
    }
    top
}

fn split<T>(r: Result<Vec<T>, String>) -> (Vec<T>, Option<String>) {
    match r {
        Ok(v) => (v, None),
        Err(e) => (Vec::new(), Some(e)),
    }
}
