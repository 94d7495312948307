use crate::api::QuakeQuery;
use crate::error::HeavenError;
use crate::hazard::assess::{HazardSummary, SourceData, summarize};
use crate::hazard::rules::{HazardVerdict, Thresholds, evaluate_hazards};
use crate::middleware::coords::Position;
use crate::router::HeavenState;
use axum::{Json, extract::State};
use chrono::Utc;
use tracing::warn;

/// GET /api/hazards/evaluate?lat&lon
pub async fn evaluate(
    State(state): State<HeavenState>,
    Position(position): Position,
) -> Result<Json<HazardVerdict>, HeavenError> {
    let features = state.feeds.eonet_events().await?;
    let thresholds = Thresholds::for_mode(state.config.hazard.lenient);
    Ok(Json(evaluate_hazards(position, &features, &thresholds)))
}

/// GET /api/hazards/summary?lat&lon
///
/// Sources are fetched concurrently; a failed source shows its error in its
/// card instead of failing the whole summary.
pub async fn summary(
    State(state): State<HeavenState>,
    Position(position): Position,
) -> Json<HazardSummary> {
    let now = Utc::now();
    let feeds = &state.feeds;
    let (weather, quakes, tsunami) = futures::join!(
        feeds.daily_weather(position, now.date_naive()),
        feeds.earthquakes(position, QuakeQuery::default(), now),
        feeds.tsunami_alerts(),
    );
    let data = SourceData {
        weather: weather.map_err(describe),
        quakes: quakes.map_err(describe),
        tsunami: tsunami.map_err(describe),
    };
    Json(summarize(data, now.to_rfc3339()))
}

fn describe(err: HeavenError) -> String {
    warn!(error = %err, "hazard source failed");
    err.to_string()
}
