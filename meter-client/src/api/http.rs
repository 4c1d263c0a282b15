use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::{ApiError, ReadingsBackend, Session};
use crate::domain::{
    apartment::ApartmentsEnvelope, Apartment, ApartmentId, LoginResponse, NewReading, Reading,
};

/// reqwest-based client for the readings REST backend.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    session: Session,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        session: Session,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// `POST /auth/token` with form-encoded credentials. On success the token
    /// is installed in the session for all later requests.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = self
            .client
            .post(self.url("/auth/token"))
            .form(&[("username", username), ("password", password)]);
        let response: LoginResponse = self.execute(request).await?;

        let token = response
            .bearer()
            .ok_or_else(|| ApiError::Decode("login response carries no token".to_string()))?;
        self.session.set_token(token);
        tracing::info!(
            user_id = response.user.as_ref().map(|u| u.id.as_str()).unwrap_or("-"),
            "logged in"
        );
        Ok(response)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(format!("failed to read response body: {e}")))?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()));
        }

        let message = error_message(status, &body);
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(%status, "backend rejected credentials, invalidating session");
            self.session.invalidate();
            return Err(ApiError::Unauthorized(message));
        }

        tracing::debug!(%status, message = %message, "backend request failed");
        if status.is_client_error() {
            Err(ApiError::ServerRejection {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(ApiError::ServerFailure {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Non-2xx bodies carry `message`; FastAPI-style backends use `detail`.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        detail: Option<serde_json::Value>,
    }

    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| {
            b.message.or_else(|| {
                b.detail.map(|d| match d {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
            })
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}

#[async_trait]
impl ReadingsBackend for HttpBackend {
    async fn apartment_readings(&self, apartment_id: ApartmentId) -> Result<Apartment, ApiError> {
        let request = self
            .client
            .get(self.url(&format!("/apartments/{apartment_id}/readings")));
        self.execute(self.authorize(request)).await
    }

    async fn user_apartments(&self, user_id: &str) -> Result<Vec<Apartment>, ApiError> {
        let request = self.client.get(self.url(&format!(
            "/user-apartments/user/{user_id}/apartments-with-counters"
        )));
        let envelope: ApartmentsEnvelope = self.execute(self.authorize(request)).await?;
        Ok(envelope.into())
    }

    async fn submit_reading(&self, reading: &NewReading) -> Result<Reading, ApiError> {
        let request = self.client.post(self.url("/counter-readings")).json(reading);
        self.execute(self.authorize(request)).await
    }
}
