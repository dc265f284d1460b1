//! Modelo de vehículo
//!
//! Los vehículos pertenecen a una agencia. Solo los vehículos en estado
//! `disponible` pueden seleccionarse en el paso 2 del workflow; el conflicto
//! de fechas lo rechaza el backend con su check de disponibilidad.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado de un vehículo en la flota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Disponible,
    Loue,
    Maintenance,
    HorsService,
}

/// Vehículo tal como lo devuelve el backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    pub license_plate: String,
    pub brand: String,
    pub model: String,
    #[serde(default)]
    pub year: Option<i32>,
    pub daily_rate: Decimal,
    pub status: VehicleStatus,
    /// Kilometraje actual del contador; algunos registros antiguos no lo traen
    #[serde(default)]
    pub mileage: i64,
}

impl Vehicle {
    pub fn label(&self) -> String {
        match self.year {
            Some(year) => format!("{} {} ({})", self.brand, self.model, year),
            None => format!("{} {}", self.brand, self.model),
        }
    }
}
