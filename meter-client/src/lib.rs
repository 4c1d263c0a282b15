//! Domain types and REST access for the apartment metering backend.

pub mod api;
pub mod domain;

pub use api::{ApiError, HttpBackend, ReadingsBackend, Session, SessionState};
