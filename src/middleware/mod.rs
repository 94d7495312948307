pub mod auth;
pub mod coords;
pub mod json;
