//! Cliente HTTP del backend de alquiler
//!
//! Este módulo maneja la comunicación con la API REST del backend: adjunta
//! el bearer token, serializa requests y extrae el `detail` de los cuerpos
//! de error (formato FastAPI: string o lista de errores de validación).

use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::EnvironmentConfig;
use crate::utils::errors::AppError;

/// Mensaje genérico cuando el backend no manda un detalle utilizable
pub const GENERIC_ERROR_MESSAGE: &str = "Une erreur est survenue";

/// Header con la clave de deduplicación que acompaña cada paso mutador
/// de la transacción de finalización
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Errores al hablar con el backend. Se propagan sin reintentos.
#[derive(Error, Debug)]
pub enum ApiError {
    /// El backend respondió con un status de error; `message` es el
    /// `detail` extraído tal cual para mostrarlo al usuario
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response from backend: {0}")]
    Decode(String),
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Upstream { status, message } => AppError::UpstreamApi {
                status: Some(status),
                message,
            },
            ApiError::Network(e) => AppError::UpstreamApi {
                status: None,
                message: e.to_string(),
            },
            ApiError::Decode(msg) => AppError::UpstreamApi {
                status: None,
                message: msg,
            },
        }
    }
}

/// Cliente autenticado contra la API del backend de alquiler
pub struct RentalApiClient {
    base_url: String,
    token: String,
    client: Client,
}

impl RentalApiClient {
    pub fn new(config: &EnvironmentConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent("RentalWorkflowGateway/1.0")
            .build()?;

        Ok(Self {
            base_url: config.rental_api_base_url.trim_end_matches('/').to_string(),
            token: config.rental_api_token.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn attach(&self, builder: RequestBuilder, idempotency_key: Option<Uuid>) -> RequestBuilder {
        let builder = builder.bearer_auth(&self.token);
        match idempotency_key {
            Some(key) => builder.header(IDEMPOTENCY_KEY_HEADER, key.to_string()),
            None => builder,
        }
    }

    /// GET con respuesta JSON
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let builder = self.client.get(self.url(path)).query(query);
        let response = self.attach(builder, None).send().await?;
        decode_json(response).await
    }

    /// POST con cuerpo JSON y respuesta JSON
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
        idempotency_key: Option<Uuid>,
    ) -> Result<T, ApiError> {
        let builder = self.client.post(self.url(path)).query(query).json(body);
        let response = self.attach(builder, idempotency_key).send().await?;
        decode_json(response).await
    }

    /// POST sin cuerpo (los parámetros van en la query string)
    pub async fn post_empty<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        idempotency_key: Option<Uuid>,
    ) -> Result<T, ApiError> {
        let builder = self.client.post(self.url(path)).query(query);
        let response = self.attach(builder, idempotency_key).send().await?;
        decode_json(response).await
    }

    /// GET binario (descarga del PDF del contrato)
    pub async fn get_bytes(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<u8>, ApiError> {
        let builder = self.client.get(self.url(path)).query(query);
        let response = self.attach(builder, None).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                message: extract_error_detail(&body),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::Upstream {
            status: status.as_u16(),
            message: extract_error_detail(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Extrae el mensaje de error de un cuerpo `{detail: ...}`.
///
/// `detail` puede ser un string, una lista de errores de validación
/// (`[{msg, loc, type}]`, se unen con coma) o un objeto con `msg`.
/// Cualquier otra forma cae al mensaje genérico.
pub fn extract_error_detail(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return GENERIC_ERROR_MESSAGE.to_string();
    };

    match value.get("detail") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Array(items)) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if msgs.is_empty() {
                GENERIC_ERROR_MESSAGE.to_string()
            } else {
                msgs.join(", ")
            }
        }
        Some(serde_json::Value::Object(obj)) => obj
            .get("msg")
            .and_then(|m| m.as_str())
            .unwrap_or(GENERIC_ERROR_MESSAGE)
            .to_string(),
        _ => GENERIC_ERROR_MESSAGE.to_string(),
    }
}
