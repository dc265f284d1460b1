//! Servicio de clientes
//!
//! Wrapper fino sobre los endpoints de clientes del backend: una llamada
//! HTTP por operación, sin lógica propia, los fallos se propagan tal cual.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clients::{ApiError, RentalApiClient};
use crate::models::Customer;
use crate::services::parse_list;

/// Formulario de alta de cliente (etapa 1 del workflow)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub cin_number: Option<String>,
    #[serde(default)]
    pub driver_license: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCustomerBody<'a> {
    #[serde(flatten)]
    form: &'a NewCustomer,
    agency_id: Uuid,
}

pub struct CustomerService {
    api: Arc<RentalApiClient>,
}

impl CustomerService {
    pub fn new(api: Arc<RentalApiClient>) -> Self {
        Self { api }
    }

    /// Busca clientes de la agencia; sin término devuelve el listado completo
    pub async fn search(
        &self,
        agency_id: Uuid,
        term: Option<&str>,
    ) -> Result<Vec<Customer>, ApiError> {
        let mut query = vec![("agencyId", agency_id.to_string())];
        if let Some(term) = term {
            query.push(("search", term.to_string()));
        }

        log::info!("🔍 Buscando clientes (agencia {}, término {:?})", agency_id, term);
        let value: serde_json::Value = self.api.get_json("/customers", &query).await?;
        parse_list(value, "customers")
    }

    pub async fn create(
        &self,
        agency_id: Uuid,
        form: &NewCustomer,
    ) -> Result<Customer, ApiError> {
        log::info!("➕ Creando cliente '{} {}'", form.first_name, form.last_name);
        let body = CreateCustomerBody { form, agency_id };
        self.api.post_json("/customers", &[], &body, None).await
    }
}
