// Application layer - Use cases and the ports they depend on
pub mod export_service;
pub mod live_feed;
pub mod registration_service;
pub mod remote_loader;
pub mod telemetry_store;
pub mod training_backend;
pub mod training_service;
pub mod workbench_service;
