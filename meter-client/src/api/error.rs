/// Failures observable when talking to the readings backend.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("transport failure: {0}")]
    Transport(String),
    /// 401; the session has been invalidated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// 4xx other than 401, usually a server-side validation failure.
    #[error("rejected by server ({status}): {message}")]
    ServerRejection { status: u16, message: String },
    /// 5xx or any status the client does not recognise.
    #[error("server failure ({status}): {message}")]
    ServerFailure { status: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Transport(_) => "transport",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::ServerRejection { .. } => "rejected",
            ApiError::ServerFailure { .. } => "server",
            ApiError::Decode(_) => "decode",
        }
    }

    /// Text suitable for showing next to the failed input.
    pub fn message(&self) -> &str {
        match self {
            ApiError::Transport(m) | ApiError::Unauthorized(m) | ApiError::Decode(m) => m,
            ApiError::ServerRejection { message, .. } | ApiError::ServerFailure { message, .. } => {
                message
            }
        }
    }
}
