mod error;
mod http;
mod session;

use std::sync::Arc;

pub use error::ApiError;
pub use http::HttpBackend;
pub use session::{Session, SessionState};

use crate::domain::{Apartment, ApartmentId, NewReading, Reading};

/// The slice of the REST backend the reading engine depends on.
#[async_trait::async_trait]
pub trait ReadingsBackend: Send + Sync {
    /// `GET /apartments/{apartment_id}/readings`: one apartment with the full
    /// per-counter reading history.
    async fn apartment_readings(&self, apartment_id: ApartmentId) -> Result<Apartment, ApiError>;

    /// `GET /user-apartments/user/{user_id}/apartments-with-counters`.
    async fn user_apartments(&self, user_id: &str) -> Result<Vec<Apartment>, ApiError>;

    /// `POST /counter-readings`; returns the persisted echo.
    async fn submit_reading(&self, reading: &NewReading) -> Result<Reading, ApiError>;
}

#[async_trait::async_trait]
impl<B> ReadingsBackend for Arc<B>
where
    B: ReadingsBackend + ?Sized,
{
    async fn apartment_readings(&self, apartment_id: ApartmentId) -> Result<Apartment, ApiError> {
        (**self).apartment_readings(apartment_id).await
    }

    async fn user_apartments(&self, user_id: &str) -> Result<Vec<Apartment>, ApiError> {
        (**self).user_apartments(user_id).await
    }

    async fn submit_reading(&self, reading: &NewReading) -> Result<Reading, ApiError> {
        (**self).submit_reading(reading).await
    }
}
