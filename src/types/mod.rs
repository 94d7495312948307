pub mod auth;
pub mod emergency;
pub mod feeds;
