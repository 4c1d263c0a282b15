use meter_client::{domain::ApartmentId, ApiError};

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),
    #[error("backend error: {0}")]
    Api(#[from] ApiError),
    #[error("apartment {0} is not loaded")]
    ApartmentUnavailable(ApartmentId),
    #[error("intake error: {0}")]
    Intake(String),
    #[error("metrics error: {0}")]
    Metrics(String),
}
