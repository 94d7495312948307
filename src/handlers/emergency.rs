use crate::db::{DbContact, NewContact};
use crate::error::HeavenError;
use crate::hazard::DisasterType;
use crate::middleware::auth::AuthUser;
use crate::middleware::json::JsonBody;
use crate::router::HeavenState;
use crate::service::mailer::Mail;
use crate::types::auth::MessageResponse;
use crate::types::emergency::{
    AlertPoint, ContactRequest, SendAlertRequest, SendAlertResponse, TriggerAlertRequest,
    TriggerAlertResponse,
};
use axum::{
    Json,
    extract::{Path, State},
};
use futures::future::join_all;
use tracing::{info, warn};

/// POST /api/emergency
pub async fn create_contact(
    State(state): State<HeavenState>,
    caller: AuthUser,
    JsonBody(req): JsonBody<ContactRequest>,
) -> Result<Json<DbContact>, HeavenError> {
    let contact = NewContact::try_from(req)?;
    let saved = state.storage.insert_contact(caller.id, contact).await?;
    Ok(Json(saved))
}

/// GET /api/emergency
pub async fn list_contacts(
    State(state): State<HeavenState>,
    caller: AuthUser,
) -> Result<Json<Vec<DbContact>>, HeavenError> {
    Ok(Json(state.storage.list_contacts(caller.id).await?))
}

/// GET /api/emergency/{id}
pub async fn get_contact(
    State(state): State<HeavenState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<DbContact>, HeavenError> {
    state
        .storage
        .get_contact(caller.id, id)
        .await?
        .map(Json)
        .ok_or(HeavenError::ContactNotFound)
}

/// PUT /api/emergency/{id}
pub async fn update_contact(
    State(state): State<HeavenState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    JsonBody(req): JsonBody<ContactRequest>,
) -> Result<Json<DbContact>, HeavenError> {
    let contact = NewContact::try_from(req)?;
    state
        .storage
        .update_contact(caller.id, id, contact)
        .await?
        .map(Json)
        .ok_or(HeavenError::ContactNotFound)
}

/// DELETE /api/emergency/{id}
pub async fn delete_contact(
    State(state): State<HeavenState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, HeavenError> {
    if !state.storage.delete_contact(caller.id, id).await? {
        return Err(HeavenError::ContactNotFound);
    }
    Ok(Json(MessageResponse::new("Contact deleted")))
}

/// POST /api/emergency/send-email
///
/// Mails every contact that has an address. A failed recipient is counted
/// and logged; the rest still go out.
pub async fn send_email(
    State(state): State<HeavenState>,
    caller: AuthUser,
    JsonBody(req): JsonBody<SendAlertRequest>,
) -> Result<Json<SendAlertResponse>, HeavenError> {
    let position = req.position()?;
    let recipients: Vec<String> = state
        .storage
        .list_contacts(caller.id)
        .await?
        .into_iter()
        .filter_map(|c| c.email)
        .collect();
    if recipients.is_empty() {
        return Err(HeavenError::NoReachableContacts);
    }
    if !state.limits.allow_alert(caller.id) {
        return Err(HeavenError::RateLimited);
    }

    let sends = recipients.iter().map(|to| {
        let mail = Mail::emergency_alert(to, &caller.name, position.latitude, position.longitude);
        let mailer = state.mailer.clone();
        async move { (to, mailer.send(mail).await) }
    });
    let mut sent = 0;
    let mut failed = 0;
    for (to, result) in join_all(sends).await {
        match result {
            Ok(()) => sent += 1,
            Err(e) => {
                failed += 1;
                warn!(user_id = caller.id, to = %to, error = %e, "emergency mail failed");
            }
        }
    }

    info!(user_id = caller.id, sent, failed, "emergency alert dispatched");
    Ok(Json(SendAlertResponse {
        message: format!("Emergency alert sent to {sent} of {} contacts", recipients.len()),
        sent,
        failed,
    }))
}

/// POST /api/trigger-alert
pub async fn trigger_alert(
    caller: AuthUser,
    JsonBody(req): JsonBody<TriggerAlertRequest>,
) -> Result<Json<TriggerAlertResponse>, HeavenError> {
    let position = req.position()?;
    let disaster: DisasterType = req
        .disaster
        .parse()
        .map_err(|_| HeavenError::Validation("Invalid disaster type".to_string()))?;

    info!(
        user_id = caller.id,
        disaster = %disaster,
        latitude = position.latitude,
        longitude = position.longitude,
        "alert triggered"
    );
    Ok(Json(TriggerAlertResponse {
        ok: true,
        message: "Alert triggered".to_string(),
        at: AlertPoint::from(position),
        disaster: disaster.to_string(),
    }))
}
