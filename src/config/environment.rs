//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y las variables
//! necesarias para hablar con el backend de alquiler.

use std::env;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    /// URL base del backend de alquiler (ej: https://api.rental.example/api/v1)
    pub rental_api_base_url: String,
    /// Bearer token con el que el gateway se autentica contra el backend
    pub rental_api_token: String,
    /// Timeout del cliente HTTP hacia el backend, en segundos
    pub http_timeout_secs: u64,
    pub cors_origins: Vec<String>,
    /// TTL de las sesiones de workflow en memoria, en horas
    pub session_ttl_hours: i64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("PORT must be a valid number"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            rental_api_base_url: env::var("RENTAL_API_BASE_URL")
                .expect("RENTAL_API_BASE_URL must be set"),
            rental_api_token: env::var("RENTAL_API_TOKEN")
                .expect("RENTAL_API_TOKEN must be set"),
            http_timeout_secs: env::var("RENTAL_API_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("RENTAL_API_TIMEOUT_SECS must be a valid number"),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            session_ttl_hours: env::var("WORKFLOW_SESSION_TTL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("WORKFLOW_SESSION_TTL_HOURS must be a valid number"),
        }
    }
}

impl EnvironmentConfig {
    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
