//! Hazard classification over public event feeds.

pub mod assess;
pub mod geo;
pub mod rules;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use geo::Coordinates;

/// Alert level. Ordering is significant: `Neutral < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Neutral,
    Warning,
    Critical,
}

/// The disaster kinds the alert UI knows how to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisasterType {
    Earthquake,
    Flood,
    Cyclone,
    Tsunami,
}

impl DisasterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisasterType::Earthquake => "earthquake",
            DisasterType::Flood => "flood",
            DisasterType::Cyclone => "cyclone",
            DisasterType::Tsunami => "tsunami",
        }
    }

    /// Map an EONET category title onto a disaster kind.
    ///
    /// Volcanoes present as cyclones and wildfires as floods; anything
    /// unrecognised falls back to flood.
    pub fn from_category(category: &str) -> Self {
        let c = category.to_lowercase();
        if c.contains("earthquake") {
            DisasterType::Earthquake
        } else if c.contains("storm") || c.contains("volcano") {
            DisasterType::Cyclone
        } else {
            DisasterType::Flood
        }
    }
}

impl fmt::Display for DisasterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDisaster(pub String);

impl fmt::Display for UnknownDisaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown disaster type: {}", self.0)
    }
}

impl std::error::Error for UnknownDisaster {}

impl FromStr for DisasterType {
    type Err = UnknownDisaster;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "earthquake" => Ok(DisasterType::Earthquake),
            "flood" => Ok(DisasterType::Flood),
            "cyclone" => Ok(DisasterType::Cyclone),
            "tsunami" => Ok(DisasterType::Tsunami),
            _ => Err(UnknownDisaster(s.to_string())),
        }
    }
}
