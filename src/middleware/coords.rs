use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

use crate::error::HeavenError;
use crate::hazard::Coordinates;
use crate::types::emergency::{LooseNumber, checked_coordinates};

#[derive(Debug, Deserialize)]
struct RawPosition {
    lat: Option<LooseNumber>,
    lon: Option<LooseNumber>,
}

/// `?lat=..&lon=..` validated into a position.
#[derive(Debug, Clone, Copy)]
pub struct Position(pub Coordinates);

impl<S> FromRequestParts<S> for Position
where
    S: Send + Sync,
{
    type Rejection = HeavenError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<RawPosition>::from_request_parts(parts, state)
            .await
            .map_err(|e| HeavenError::Validation(e.body_text()))?;
        Ok(Position(checked_coordinates(raw.lat.as_ref(), raw.lon.as_ref())?))
    }
}
