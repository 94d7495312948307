pub mod endpoints;
pub mod identity;
pub mod service;

pub use endpoints::GoogleOauthEndpoints;
pub use identity::GoogleIdentity;
pub use service::resolve_google_user;
