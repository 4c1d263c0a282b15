use std::sync::Arc;

use meter_client::{HttpBackend, Session};

use crate::{config::AppConfig, error::EngineError};

/// Build the HTTP backend from config and authenticate it.
///
/// `[auth]` credentials take precedence over a pre-issued `backend.token`;
/// with neither, requests go out anonymously.
pub async fn connect(cfg: &AppConfig) -> Result<Arc<HttpBackend>, EngineError> {
    let session = match &cfg.backend.token {
        Some(token) if cfg.auth.is_none() => Session::with_token(token.clone()),
        _ => Session::default(),
    };
    let backend = HttpBackend::new(cfg.backend.base_url.clone(), cfg.backend.timeout(), session)?;

    if let Some(auth) = &cfg.auth {
        backend.login(&auth.username, &auth.password).await?;
    } else if cfg.backend.token.is_none() {
        tracing::warn!(base_url = %cfg.backend.base_url, "no credentials configured; requests are anonymous");
    }

    Ok(Arc::new(backend))
}
