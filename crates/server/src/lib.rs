//! HTTP surface for the Mediathek catalog service.

pub mod api;
pub mod downloads;
pub mod metrics;
pub mod state;
pub mod tasks;
