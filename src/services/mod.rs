//! Services module
//!
//! Este módulo contiene los wrappers de dominio sobre la API del backend
//! (una función por endpoint, sin reintentos ni caché), el cálculo de
//! tarificación y el orquestador del workflow de alquiler.

pub mod booking_service;
pub mod contract_service;
pub mod customer_service;
pub mod pricing_service;
pub mod vehicle_service;
pub mod workflow_service;

pub use booking_service::*;
pub use contract_service::*;
pub use customer_service::*;
pub use vehicle_service::*;
pub use workflow_service::*;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::clients::{ApiError, RentalApiClient};
use crate::models::{
    Booking, Contract, Customer, FuelLevel, PaymentConfirmation, RentalPeriod, Vehicle,
};

/// Operaciones del backend que consume el orquestador.
///
/// La costura existe para que los tests puedan sustituir el backend por un
/// doble que capture el orden de las llamadas; en producción la implementa
/// `HttpRentalBackend` delegando en los servicios HTTP.
#[async_trait]
pub trait RentalBackend: Send + Sync {
    async fn search_customers(
        &self,
        agency_id: Uuid,
        term: Option<&str>,
    ) -> Result<Vec<Customer>, ApiError>;

    async fn create_customer(
        &self,
        agency_id: Uuid,
        form: &NewCustomer,
    ) -> Result<Customer, ApiError>;

    async fn list_available_vehicles(&self, agency_id: Uuid) -> Result<Vec<Vehicle>, ApiError>;

    async fn list_available_vehicles_for_period(
        &self,
        agency_id: Uuid,
        period: &RentalPeriod,
    ) -> Result<Vec<Vehicle>, ApiError>;

    async fn check_availability(
        &self,
        agency_id: Uuid,
        vehicle_id: Uuid,
        period: &RentalPeriod,
    ) -> Result<bool, ApiError>;

    async fn create_booking(
        &self,
        agency_id: Uuid,
        request: &CreateBookingRequest,
        idempotency_key: Uuid,
    ) -> Result<Booking, ApiError>;

    async fn create_contract(
        &self,
        agency_id: Uuid,
        request: &CreateContractRequest,
        idempotency_key: Uuid,
    ) -> Result<Contract, ApiError>;

    async fn record_payment(
        &self,
        booking_id: i64,
        charge: &PaymentCharge,
        idempotency_key: Uuid,
    ) -> Result<PaymentConfirmation, ApiError>;

    async fn confirm_booking(&self, agency_id: Uuid, booking_id: i64)
        -> Result<Booking, ApiError>;

    async fn start_rental(
        &self,
        agency_id: Uuid,
        booking_id: i64,
        initial_mileage: i64,
        initial_fuel_level: FuelLevel,
    ) -> Result<Booking, ApiError>;

    async fn download_contract_pdf(
        &self,
        agency_id: Uuid,
        contract_id: i64,
    ) -> Result<Vec<u8>, ApiError>;
}

/// Implementación HTTP del backend: composición de los cuatro servicios
pub struct HttpRentalBackend {
    customers: CustomerService,
    vehicles: VehicleService,
    bookings: BookingService,
    contracts: ContractService,
}

impl HttpRentalBackend {
    pub fn new(api: Arc<RentalApiClient>) -> Self {
        Self {
            customers: CustomerService::new(api.clone()),
            vehicles: VehicleService::new(api.clone()),
            bookings: BookingService::new(api.clone()),
            contracts: ContractService::new(api),
        }
    }
}

#[async_trait]
impl RentalBackend for HttpRentalBackend {
    async fn search_customers(
        &self,
        agency_id: Uuid,
        term: Option<&str>,
    ) -> Result<Vec<Customer>, ApiError> {
        self.customers.search(agency_id, term).await
    }

    async fn create_customer(
        &self,
        agency_id: Uuid,
        form: &NewCustomer,
    ) -> Result<Customer, ApiError> {
        self.customers.create(agency_id, form).await
    }

    async fn list_available_vehicles(&self, agency_id: Uuid) -> Result<Vec<Vehicle>, ApiError> {
        self.vehicles.list_available(agency_id).await
    }

    async fn list_available_vehicles_for_period(
        &self,
        agency_id: Uuid,
        period: &RentalPeriod,
    ) -> Result<Vec<Vehicle>, ApiError> {
        self.vehicles
            .list_available_for_period(agency_id, period)
            .await
    }

    async fn check_availability(
        &self,
        agency_id: Uuid,
        vehicle_id: Uuid,
        period: &RentalPeriod,
    ) -> Result<bool, ApiError> {
        self.vehicles
            .check_availability(agency_id, vehicle_id, period)
            .await
    }

    async fn create_booking(
        &self,
        agency_id: Uuid,
        request: &CreateBookingRequest,
        idempotency_key: Uuid,
    ) -> Result<Booking, ApiError> {
        self.bookings
            .create(agency_id, request, Some(idempotency_key))
            .await
    }

    async fn create_contract(
        &self,
        agency_id: Uuid,
        request: &CreateContractRequest,
        idempotency_key: Uuid,
    ) -> Result<Contract, ApiError> {
        self.contracts
            .create(agency_id, request, Some(idempotency_key))
            .await
    }

    async fn record_payment(
        &self,
        booking_id: i64,
        charge: &PaymentCharge,
        idempotency_key: Uuid,
    ) -> Result<PaymentConfirmation, ApiError> {
        self.bookings
            .record_payment(booking_id, charge, Some(idempotency_key))
            .await
    }

    async fn confirm_booking(
        &self,
        agency_id: Uuid,
        booking_id: i64,
    ) -> Result<Booking, ApiError> {
        self.bookings.confirm(agency_id, booking_id).await
    }

    async fn start_rental(
        &self,
        agency_id: Uuid,
        booking_id: i64,
        initial_mileage: i64,
        initial_fuel_level: FuelLevel,
    ) -> Result<Booking, ApiError> {
        self.bookings
            .start(agency_id, booking_id, initial_mileage, initial_fuel_level)
            .await
    }

    async fn download_contract_pdf(
        &self,
        agency_id: Uuid,
        contract_id: i64,
    ) -> Result<Vec<u8>, ApiError> {
        self.contracts.download_pdf(agency_id, contract_id).await
    }
}

/// Los listados del backend llegan a veces como array y a veces envueltos
/// en un objeto (`{customers: [...]}`); se aceptan ambas formas.
pub(crate) fn parse_list<T: DeserializeOwned>(
    value: serde_json::Value,
    key: &str,
) -> Result<Vec<T>, ApiError> {
    let items = match value {
        serde_json::Value::Array(items) => serde_json::Value::Array(items),
        serde_json::Value::Object(mut obj) => match obj.remove(key) {
            Some(inner @ serde_json::Value::Array(_)) => inner,
            _ => {
                return Err(ApiError::Decode(format!(
                    "expected a list or an object with '{}'",
                    key
                )))
            }
        },
        _ => return Err(ApiError::Decode("expected a JSON list".to_string())),
    };

    serde_json::from_value(items).map_err(|e| ApiError::Decode(e.to_string()))
}
