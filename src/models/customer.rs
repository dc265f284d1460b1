//! Modelo de cliente
//!
//! Un cliente pertenece a una agencia (tenant). Una reserva referencia
//! exactamente un id de cliente existente.

use serde::{Deserialize, Serialize};

/// Cliente tal como lo devuelve el backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
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

impl Customer {
    /// Nombre completo para el contrato y los resúmenes
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
