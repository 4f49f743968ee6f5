// Domain layer - Pure types and transformations
pub mod access;
pub mod curation;
pub mod dataset;
pub mod error;
pub mod heater;
pub mod live;
pub mod manifest;
pub mod model;
pub mod telemetry;
