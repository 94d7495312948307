//! Distance/magnitude rules over EONET events around a position.

use serde::Serialize;

use super::geo::{Coordinates, haversine_km, point_in_ring, ring_centroid};
use super::{DisasterType, Severity};
use crate::types::feeds::{EonetFeature, Geometry};

const EARTHQUAKES: &str = "Earthquakes";
const VOLCANOES: &str = "Volcanoes";
const SURFACE_HAZARDS: [&str; 3] = ["Severe Storms", "Floods", "Wildfires"];

/// Alerting radii in km and the critical earthquake magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub eq_warn_km: f64,
    pub eq_crit_km: f64,
    pub eq_crit_mag: f64,
    pub hazard_warn_km: f64,
    pub hazard_crit_km: f64,
    pub volcano_warn_km: f64,
}

impl Thresholds {
    pub const PRODUCTION: Thresholds = Thresholds {
        eq_warn_km: 100.0,
        eq_crit_km: 50.0,
        eq_crit_mag: 5.5,
        hazard_warn_km: 100.0,
        hazard_crit_km: 25.0,
        volcano_warn_km: 50.0,
    };

    /// Wide radii for checking the alert pipeline end to end.
    pub const LENIENT: Thresholds = Thresholds {
        eq_warn_km: 300.0,
        eq_crit_km: 150.0,
        eq_crit_mag: 4.5,
        hazard_warn_km: 200.0,
        hazard_crit_km: 80.0,
        volcano_warn_km: 100.0,
    };

    pub fn for_mode(lenient: bool) -> Self {
        if lenient { Self::LENIENT } else { Self::PRODUCTION }
    }
}

/// Highest-severity match across all events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardVerdict {
    #[serde(rename = "type")]
    pub kind: Option<DisasterType>,
    pub level: Severity,
    pub reason: Option<String>,
    pub updated_at: Option<String>,
}

/// Fields of an event the rules look at.
#[derive(Debug, Clone, PartialEq)]
struct EventSummary {
    category: String,
    title: String,
    updated: String,
    magnitude: f64,
}

impl EventSummary {
    fn of(feature: &EonetFeature) -> Self {
        let p = &feature.properties;
        let category = p
            .categories
            .first()
            .and_then(|c| c.title.clone())
            .or_else(|| p.category.clone())
            .unwrap_or_else(|| "Event".to_string());
        let title = p
            .title
            .clone()
            .or_else(|| p.id.clone())
            .unwrap_or_else(|| "Event".to_string());
        let updated = p
            .geometry_dates
            .last()
            .cloned()
            .or_else(|| p.date.clone())
            .unwrap_or_default();
        Self {
            category,
            title,
            updated,
            magnitude: p.magnitude_value.unwrap_or(0.0),
        }
    }

    fn is_surface_hazard(&self) -> bool {
        SURFACE_HAZARDS.contains(&self.category.as_str())
    }
}

/// Classify `features` relative to `position`.
///
/// The first feature to reach the highest level wins; later features at the
/// same level do not replace it.
pub fn evaluate_hazards(
    position: Coordinates,
    features: &[EonetFeature],
    thresholds: &Thresholds,
) -> HazardVerdict {
    let mut best = HazardVerdict::default();

    for feature in features {
        let event = EventSummary::of(feature);
        let level = match &feature.geometry {
            Some(Geometry::Point { coordinates }) => {
                point_level(position, coordinates, &event, thresholds)
            }
            Some(geometry @ Geometry::Polygon { .. }) => {
                polygon_level(position, &geometry.outer_ring(), &event, thresholds)
            }
            _ => Severity::Neutral,
        };

        if level > best.level {
            best = HazardVerdict {
                kind: Some(DisasterType::from_category(&event.category)),
                level,
                reason: Some(format!("{}: {}", event.category, event.title)),
                updated_at: Some(event.updated),
            };
        }
    }

    best
}

fn point_level(
    position: Coordinates,
    coordinates: &[f64],
    event: &EventSummary,
    t: &Thresholds,
) -> Severity {
    let [lon, lat, ..] = coordinates else {
        return Severity::Neutral;
    };
    if !lon.is_finite() || !lat.is_finite() {
        return Severity::Neutral;
    }
    let d = haversine_km(position, Coordinates::new(*lat, *lon));

    if event.category == EARTHQUAKES {
        if event.magnitude >= t.eq_crit_mag && d <= t.eq_crit_km {
            Severity::Critical
        } else if d <= t.eq_warn_km {
            Severity::Warning
        } else {
            Severity::Neutral
        }
    } else if event.category == VOLCANOES {
        volcano_level(d, t)
    } else if event.is_surface_hazard() {
        surface_level(d, t)
    } else {
        Severity::Neutral
    }
}

fn polygon_level(
    position: Coordinates,
    ring: &[[f64; 2]],
    event: &EventSummary,
    t: &Thresholds,
) -> Severity {
    let Some(centroid) = ring_centroid(ring) else {
        return Severity::Neutral;
    };
    if event.is_surface_hazard() && point_in_ring(position, ring) {
        return Severity::Critical;
    }

    let d = haversine_km(position, centroid);
    if event.is_surface_hazard() {
        surface_level(d, t)
    } else if event.category == VOLCANOES {
        volcano_level(d, t)
    } else {
        Severity::Neutral
    }
}

fn surface_level(d: f64, t: &Thresholds) -> Severity {
    if d <= t.hazard_crit_km {
        Severity::Critical
    } else if d <= t.hazard_warn_km {
        Severity::Warning
    } else {
        Severity::Neutral
    }
}

fn volcano_level(d: f64, t: &Thresholds) -> Severity {
    if d <= t.volcano_warn_km {
        Severity::Warning
    } else {
        Severity::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::feeds::{EonetCategory, EonetProperties};

    // ~0.009 degrees of latitude per km
    const KM: f64 = 1.0 / 111.195;

    fn home() -> Coordinates {
        Coordinates::new(10.0, 20.0)
    }

    fn feature(category: &str, title: &str, mag: Option<f64>, geometry: Geometry) -> EonetFeature {
        EonetFeature {
            properties: EonetProperties {
                title: Some(title.to_string()),
                categories: vec![EonetCategory {
                    id: None,
                    title: Some(category.to_string()),
                }],
                date: Some("2026-10-15T00:00:00Z".to_string()),
                magnitude_value: mag,
                ..Default::default()
            },
            geometry: Some(geometry),
        }
    }

    fn point_north(km: f64) -> Geometry {
        Geometry::Point {
            coordinates: vec![20.0, 10.0 + km * KM],
        }
    }

    fn eval(features: &[EonetFeature]) -> HazardVerdict {
        evaluate_hazards(home(), features, &Thresholds::PRODUCTION)
    }

    #[test]
    fn no_events_is_neutral() {
        assert_eq!(eval(&[]), HazardVerdict::default());
    }

    #[test]
    fn strong_close_quake_is_critical() {
        let v = eval(&[feature("Earthquakes", "M6.1", Some(6.1), point_north(40.0))]);
        assert_eq!(v.level, Severity::Critical);
        assert_eq!(v.kind, Some(DisasterType::Earthquake));
        assert_eq!(v.reason.as_deref(), Some("Earthquakes: M6.1"));
        assert_eq!(v.updated_at.as_deref(), Some("2026-10-15T00:00:00Z"));
    }

    #[test]
    fn weak_close_quake_only_warns() {
        let v = eval(&[feature("Earthquakes", "M4", Some(4.0), point_north(40.0))]);
        assert_eq!(v.level, Severity::Warning);
        let v = eval(&[feature("Earthquakes", "M7", Some(7.0), point_north(150.0))]);
        assert_eq!(v.level, Severity::Neutral);
    }

    #[test]
    fn volcanoes_never_exceed_warning() {
        let v = eval(&[feature("Volcanoes", "Etna", None, point_north(1.0))]);
        assert_eq!(v.level, Severity::Warning);
        assert_eq!(v.kind, Some(DisasterType::Cyclone));
        let v = eval(&[feature("Volcanoes", "Etna", None, point_north(60.0))]);
        assert_eq!(v.level, Severity::Neutral);
    }

    #[test]
    fn surface_hazard_radii() {
        let v = eval(&[feature("Wildfires", "Fire", None, point_north(20.0))]);
        assert_eq!(v.level, Severity::Critical);
        let v = eval(&[feature("Floods", "Flood", None, point_north(90.0))]);
        assert_eq!(v.level, Severity::Warning);
        let v = eval(&[feature("Severe Storms", "Storm", None, point_north(120.0))]);
        assert_eq!(v.level, Severity::Neutral);
    }

    #[test]
    fn unknown_categories_are_ignored() {
        let v = eval(&[feature("Sea and Lake Ice", "Ice", None, point_north(0.0))]);
        assert_eq!(v.level, Severity::Neutral);
    }

    #[test]
    fn inside_polygon_is_critical_for_surface_hazards() {
        // large square whose vertex average sits far from home
        let ring = vec![
            vec![19.0, 9.0],
            vec![25.0, 9.0],
            vec![25.0, 15.0],
            vec![19.0, 15.0],
            vec![19.0, 9.0],
        ];
        let poly = Geometry::Polygon {
            coordinates: vec![ring],
        };
        let v = eval(&[feature("Floods", "Basin flood", None, poly.clone())]);
        assert_eq!(v.level, Severity::Critical);

        // volcanoes skip the containment rule; the vertex average is ~200 km away
        let v = eval(&[feature("Volcanoes", "Caldera", None, poly)]);
        assert_eq!(v.level, Severity::Neutral);
    }

    #[test]
    fn polygon_falls_back_to_centroid_distance() {
        let d = 60.0 * KM;
        let ring = vec![
            vec![20.0 - 0.1, 10.0 + d - 0.1],
            vec![20.0 + 0.1, 10.0 + d - 0.1],
            vec![20.0 + 0.1, 10.0 + d + 0.1],
            vec![20.0 - 0.1, 10.0 + d + 0.1],
        ];
        let v = eval(&[feature(
            "Severe Storms",
            "Cell",
            None,
            Geometry::Polygon {
                coordinates: vec![ring],
            },
        )]);
        assert_eq!(v.level, Severity::Warning);
        assert_eq!(v.kind, Some(DisasterType::Cyclone));
    }

    #[test]
    fn first_feature_wins_ties_and_higher_level_replaces() {
        let v = eval(&[
            feature("Floods", "First", None, point_north(90.0)),
            feature("Wildfires", "Second", None, point_north(80.0)),
        ]);
        assert_eq!(v.reason.as_deref(), Some("Floods: First"));

        let v = eval(&[
            feature("Floods", "Warn", None, point_north(90.0)),
            feature("Wildfires", "Crit", None, point_north(5.0)),
            feature("Floods", "Crit again", None, point_north(1.0)),
        ]);
        assert_eq!(v.level, Severity::Critical);
        assert_eq!(v.reason.as_deref(), Some("Wildfires: Crit"));
    }

    #[test]
    fn lenient_mode_widens_radii() {
        let features = [feature("Floods", "Flood", None, point_north(150.0))];
        assert_eq!(eval(&features).level, Severity::Neutral);
        let v = evaluate_hazards(home(), &features, &Thresholds::for_mode(true));
        assert_eq!(v.level, Severity::Warning);
    }

    #[test]
    fn title_and_date_fallbacks() {
        let mut f = feature("Floods", "ignored", None, point_north(1.0));
        f.properties.title = None;
        f.properties.id = Some("EONET_9".into());
        f.properties.geometry_dates = vec!["a".into(), "b".into()];
        let v = eval(&[f]);
        assert_eq!(v.reason.as_deref(), Some("Floods: EONET_9"));
        assert_eq!(v.updated_at.as_deref(), Some("b"));
    }
}
