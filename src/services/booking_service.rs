//! Servicio de reservas
//!
//! Una llamada HTTP por operación del ciclo de vida de la reserva:
//! creación, registro de pagos (parámetros en query string, contrato
//! histórico del backend), confirmación y arranque del alquiler.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clients::{ApiError, RentalApiClient};
use crate::models::{Booking, FuelLevel, PaymentConfirmation, PaymentMethod, PaymentType};

/// Payload de creación de reserva
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub customer_id: i64,
    pub vehicle_id: Uuid,
    pub start_date: String,
    pub end_date: String,
    pub daily_rate: Decimal,
    pub deposit_amount: Decimal,
    pub fuel_policy: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Un cobro a registrar contra una reserva
#[derive(Debug, Clone)]
pub struct PaymentCharge {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub kind: PaymentType,
    pub notes: String,
}

pub struct BookingService {
    api: Arc<RentalApiClient>,
}

impl BookingService {
    pub fn new(api: Arc<RentalApiClient>) -> Self {
        Self { api }
    }

    pub async fn create(
        &self,
        agency_id: Uuid,
        request: &CreateBookingRequest,
        idempotency_key: Option<Uuid>,
    ) -> Result<Booking, ApiError> {
        let query = vec![("agencyId", agency_id.to_string())];
        self.api
            .post_json("/bookings", &query, request, idempotency_key)
            .await
    }

    /// Registra un pago; el backend recibe los parámetros por query string
    pub async fn record_payment(
        &self,
        booking_id: i64,
        charge: &PaymentCharge,
        idempotency_key: Option<Uuid>,
    ) -> Result<PaymentConfirmation, ApiError> {
        let query = vec![
            ("amount", charge.amount.to_string()),
            ("paymentMethod", charge.method.as_str().to_string()),
            ("paymentType", charge.kind.as_str().to_string()),
            ("notes", charge.notes.clone()),
        ];
        self.api
            .post_empty(
                &format!("/bookings/{}/payment", booking_id),
                &query,
                idempotency_key,
            )
            .await
    }

    pub async fn confirm(&self, agency_id: Uuid, booking_id: i64) -> Result<Booking, ApiError> {
        let query = vec![("agencyId", agency_id.to_string())];
        self.api
            .post_empty(&format!("/bookings/{}/confirm", booking_id), &query, None)
            .await
    }

    /// Pasa la reserva a `in_progress` con el kilometraje y el nivel de
    /// combustible de salida
    pub async fn start(
        &self,
        agency_id: Uuid,
        booking_id: i64,
        initial_mileage: i64,
        initial_fuel_level: FuelLevel,
    ) -> Result<Booking, ApiError> {
        let query = vec![
            ("agencyId", agency_id.to_string()),
            ("initialMileage", initial_mileage.to_string()),
            ("initialFuelLevel", initial_fuel_level.as_str().to_string()),
        ];
        self.api
            .post_empty(&format!("/bookings/{}/start", booking_id), &query, None)
            .await
    }
}
