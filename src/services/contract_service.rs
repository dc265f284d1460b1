//! Servicio de contratos
//!
//! Creación del contrato (el borrador se arma en la etapa 3 y se envía
//! recién en la finalización) y descarga del PDF generado por el backend.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clients::{ApiError, RentalApiClient};
use crate::models::{Contract, SpecialClauses};

/// Payload de creación de contrato
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContractRequest {
    pub booking_id: i64,
    pub terms_and_conditions: String,
    pub special_clauses: SpecialClauses,
}

pub struct ContractService {
    api: Arc<RentalApiClient>,
}

impl ContractService {
    pub fn new(api: Arc<RentalApiClient>) -> Self {
        Self { api }
    }

    pub async fn create(
        &self,
        agency_id: Uuid,
        request: &CreateContractRequest,
        idempotency_key: Option<Uuid>,
    ) -> Result<Contract, ApiError> {
        let query = vec![("agencyId", agency_id.to_string())];
        self.api
            .post_json("/contracts/", &query, request, idempotency_key)
            .await
    }

    /// Descarga el PDF del contrato como bytes
    pub async fn download_pdf(
        &self,
        agency_id: Uuid,
        contract_id: i64,
    ) -> Result<Vec<u8>, ApiError> {
        let query = vec![("agencyId", agency_id.to_string())];
        self.api
            .get_bytes(&format!("/contracts/{}/pdf", contract_id), &query)
            .await
    }
}
