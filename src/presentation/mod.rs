// Presentation layer - HTTP surface over the workbench session
pub mod app_state;
pub mod error_response;
pub mod handlers;
