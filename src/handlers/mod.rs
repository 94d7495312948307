pub mod auth;
pub mod emergency;
pub mod google_oauth;
pub mod hazards;
