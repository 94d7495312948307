use crate::db::{DbUser, HeavenStorage, NewUser};
use crate::error::HeavenError;
use crate::google_oauth::identity::GoogleIdentity;
use crate::service::crypto::normalize_email;
use tracing::info;

/// Find the account for a Google identity, linking or creating as needed.
///
/// Lookup order: Google subject id, then email. An existing password account
/// with the same email gets the Google id attached and becomes verified.
pub async fn resolve_google_user(
    storage: &HeavenStorage,
    identity: &GoogleIdentity,
) -> Result<DbUser, HeavenError> {
    if let Some(user) = storage.find_user_by_google_id(&identity.sub).await? {
        return Ok(user);
    }

    let email = normalize_email(&identity.email);
    if let Some(user) = storage.find_user_by_email(&email).await? {
        storage.link_google(user.id, &identity.sub).await?;
        info!(user_id = user.id, "linked Google account to existing user");
        return storage
            .get_user(user.id)
            .await?
            .ok_or(HeavenError::UserNotFound);
    }

    let user = storage
        .create_user(NewUser {
            name: identity.name.clone(),
            email,
            password_hash: None,
            google_id: Some(identity.sub.clone()),
            is_verified: true,
        })
        .await?;
    info!(user_id = user.id, "created user from Google sign-in");
    Ok(user)
}
