use crate::db::NewContact;
use crate::error::HeavenError;
use crate::hazard::Coordinates;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub relation: Option<String>,
}

impl TryFrom<ContactRequest> for NewContact {
    type Error = HeavenError;

    fn try_from(req: ContactRequest) -> Result<Self, Self::Error> {
        let name = req.name.trim().to_string();
        let phone = req.phone.trim().to_string();
        if name.is_empty() || phone.is_empty() {
            return Err(HeavenError::Validation(
                "name and phone are required".to_string(),
            ));
        }
        Ok(NewContact {
            name,
            email: non_blank(req.email),
            phone,
            relation: non_blank(req.relation),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A coordinate as clients send it: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl LooseNumber {
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            LooseNumber::Number(n) => *n,
            LooseNumber::Text(s) => s.trim().parse().ok()?,
            LooseNumber::Other(_) => return None,
        };
        value.is_finite().then_some(value)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendAlertRequest {
    pub latitude: Option<LooseNumber>,
    pub longitude: Option<LooseNumber>,
}

impl SendAlertRequest {
    pub fn position(&self) -> Result<Coordinates, HeavenError> {
        checked_coordinates(self.latitude.as_ref(), self.longitude.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerAlertRequest {
    pub latitude: Option<LooseNumber>,
    pub longitude: Option<LooseNumber>,
    #[serde(default)]
    pub disaster: String,
}

impl TriggerAlertRequest {
    pub fn position(&self) -> Result<Coordinates, HeavenError> {
        checked_coordinates(self.latitude.as_ref(), self.longitude.as_ref())
    }
}

/// Both coordinates numeric, then inside lat/lon bounds.
pub fn checked_coordinates(
    latitude: Option<&LooseNumber>,
    longitude: Option<&LooseNumber>,
) -> Result<Coordinates, HeavenError> {
    let (Some(lat), Some(lon)) = (
        latitude.and_then(LooseNumber::as_f64),
        longitude.and_then(LooseNumber::as_f64),
    ) else {
        return Err(HeavenError::Validation(
            "Latitude/Longitude must be numbers".to_string(),
        ));
    };
    let position = Coordinates::new(lat, lon);
    if !position.is_valid() {
        return Err(HeavenError::Validation(
            "Invalid coordinate bounds".to_string(),
        ));
    }
    Ok(position)
}

/// Where an alert was raised, echoed back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertPoint {
    pub lat: f64,
    pub lng: f64,
}

impl From<Coordinates> for AlertPoint {
    fn from(c: Coordinates) -> Self {
        Self {
            lat: c.latitude,
            lng: c.longitude,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendAlertResponse {
    pub message: String,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerAlertResponse {
    pub ok: bool,
    pub message: String,
    pub at: AlertPoint,
    pub disaster: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_requires_name_and_phone() {
        let req = ContactRequest {
            name: "  ".into(),
            email: None,
            phone: "123".into(),
            relation: None,
        };
        assert!(matches!(
            NewContact::try_from(req),
            Err(HeavenError::Validation(_))
        ));
    }

    #[test]
    fn blank_optionals_become_none() {
        let req = ContactRequest {
            name: "Mom".into(),
            email: Some(" ".into()),
            phone: " 555 ".into(),
            relation: Some("mother".into()),
        };
        let c = NewContact::try_from(req).unwrap();
        assert_eq!(c.phone, "555");
        assert_eq!(c.email, None);
        assert_eq!(c.relation.as_deref(), Some("mother"));
    }

    fn num(n: f64) -> LooseNumber {
        LooseNumber::Number(n)
    }

    fn message(err: HeavenError) -> String {
        match err {
            HeavenError::Validation(m) => m,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn coordinates_are_bounds_checked() {
        assert!(checked_coordinates(Some(&num(12.0)), Some(&num(77.0))).is_ok());
        assert_eq!(
            message(checked_coordinates(Some(&num(91.0)), Some(&num(0.0))).unwrap_err()),
            "Invalid coordinate bounds"
        );
        assert_eq!(
            message(checked_coordinates(None, Some(&num(0.0))).unwrap_err()),
            "Latitude/Longitude must be numbers"
        );
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let req: TriggerAlertRequest = serde_json::from_value(serde_json::json!({
            "latitude": " 12.5 ",
            "longitude": -77,
            "disaster": "flood"
        }))
        .unwrap();
        let position = req.position().unwrap();
        assert_eq!(position.latitude, 12.5);
        assert_eq!(position.longitude, -77.0);
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        for bad in [
            serde_json::json!("north"),
            serde_json::json!(null),
            serde_json::json!(true),
            serde_json::json!([1.0]),
            serde_json::json!("NaN"),
        ] {
            let req: SendAlertRequest = serde_json::from_value(serde_json::json!({
                "latitude": bad,
                "longitude": 10.0
            }))
            .unwrap();
            assert_eq!(
                message(req.position().unwrap_err()),
                "Latitude/Longitude must be numbers"
            );
        }
    }

    #[test]
    fn alert_point_uses_lat_lng_keys() {
        let at = AlertPoint::from(Coordinates::new(1.5, 2.5));
        assert_eq!(
            serde_json::to_value(at).unwrap(),
            serde_json::json!({ "lat": 1.5, "lng": 2.5 })
        );
    }
}
