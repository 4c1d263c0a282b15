use std::net::SocketAddr;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::error::EngineError;

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder and serve `/metrics` on `bind_addr`.
///
/// Must run inside a tokio runtime. Calling it twice is an error.
pub fn init(bind_addr: &str) -> Result<(), EngineError> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| EngineError::Metrics(format!("invalid metrics bind address: {e}")))?;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| EngineError::Metrics(format!("failed to install Prometheus recorder: {e}")))?;
    PROM_HANDLE
        .set(handle)
        .map_err(|_| EngineError::Metrics("metrics recorder already initialised".to_string()))?;

    tokio::spawn(async move {
        let app = Router::new().route("/metrics", get(metrics_handler));

        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                tracing::info!(%addr, "serving metrics");
                if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                    tracing::error!(error = %e, "metrics server error");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to bind metrics listener");
            }
        }
    });

    Ok(())
}

async fn metrics_handler() -> String {
    PROM_HANDLE.get().map(|h| h.render()).unwrap_or_default()
}
