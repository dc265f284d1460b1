//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum: la configuración y el orquestador del
//! workflow (que contiene el store de sesiones en memoria).

use std::sync::Arc;

use anyhow::Result;

use crate::clients::RentalApiClient;
use crate::config::environment::EnvironmentConfig;
use crate::services::{HttpRentalBackend, RentalBackend, WorkflowService};

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub workflow: WorkflowService,
}

impl AppState {
    pub fn new(config: EnvironmentConfig) -> Result<Self> {
        let api = Arc::new(RentalApiClient::new(&config)?);
        let backend: Arc<dyn RentalBackend> = Arc::new(HttpRentalBackend::new(api));
        let workflow = WorkflowService::new(backend, config.session_ttl_hours);

        Ok(Self { config, workflow })
    }
}
