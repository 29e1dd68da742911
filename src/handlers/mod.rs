pub mod auth;
pub mod health_profile;
pub mod search;
pub mod status;
