pub mod analysis;
pub mod auth_service;
pub mod gemini;
