//! Piezas comunes de los clientes de los servicios remotos: errores,
//! cliente HTTP con cabeceras de autenticación y comprobación de estado.

use std::time::Duration;

use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use thiserror::Error;

use crate::config::AppConfig;

/// Fallo de una llamada remota: transporte, estado HTTP o payload inesperado.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("la solicitud ha excedido el tiempo de espera")]
    Timeout,
    #[error("fallo de transporte: {0}")]
    Transport(String),
    #[error("estado HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("respuesta inesperada: {0}")]
    Payload(String),
}

impl ServiceError {
    /// Los fallos de red pueden reintentarse; un 4xx o un payload roto no.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Payload(_) => false,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Payload(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Construye el cliente `reqwest` compartido por los tres servicios: token de
/// acceso y API key en todas las peticiones, más el timeout configurado.
pub fn build_http_client(cfg: &AppConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", cfg.access_token))?;
    bearer.set_sensitive(true);
    headers.insert(AUTHORIZATION, bearer);
    let mut api_key = HeaderValue::from_str(&cfg.api_key)?;
    api_key.set_sensitive(true);
    headers.insert("x-api-key", api_key);

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(cfg.request_timeout_secs))
        .build()?;
    Ok(client)
}

/// Convierte una respuesta no-2xx en `ServiceError::Status`.
pub async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Une la URL base del servicio con un sufijo de ruta.
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
