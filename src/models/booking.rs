//! Modelo de reserva
//!
//! La reserva es la entidad raíz que une cliente, vehículo, fechas y
//! montos calculados. Su ciclo de vida lo conduce explícitamente la etapa
//! final del workflow: pending → confirmed → in_progress.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado del ciclo de vida de una reserva
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

/// Período de alquiler (fechas completas, sin horas)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl RentalPeriod {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self { start_date, end_date }
    }

    /// Duración en días completos; puede ser <= 0 si las fechas vienen
    /// invertidas, el guard de la etapa 2 lo rechaza antes de tarificar
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// El backend espera las fechas como datetime naive a medianoche
    pub fn start_param(&self) -> String {
        format!("{}T00:00:00", self.start_date)
    }

    pub fn end_param(&self) -> String {
        format!("{}T00:00:00", self.end_date)
    }
}

/// Reserva tal como la devuelve el backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    #[serde(default)]
    pub booking_number: Option<String>,
    pub customer_id: i64,
    pub vehicle_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
    #[serde(default)]
    pub daily_rate: Option<Decimal>,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub deposit_amount: Option<Decimal>,
    #[serde(default)]
    pub fuel_policy: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}
