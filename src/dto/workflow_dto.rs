//! DTOs del workflow de alquiler

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    ContractArticles, Customer, FuelLevel, PaymentDetails, PaymentMethod, PricingQuote,
    RentalPeriod, Vehicle,
};
use crate::services::workflow_service::{FinalizationStep, WorkflowSession, WorkflowStage};
use crate::services::NewCustomer;

// -------------------------------------------------------------------------
// Requests
// -------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkflowRequest {
    pub agency_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSearchQuery {
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectCustomerRequest {
    pub customer_id: i64,
}

/// Formulario de alta de cliente (etapa 1)
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(custom = "crate::utils::validation::validate_phone")]
    pub phone: String,
    #[serde(default)]
    pub cin_number: Option<String>,
    #[serde(default)]
    pub driver_license: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl CreateCustomerRequest {
    pub fn into_form(self) -> NewCustomer {
        NewCustomer {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            cin_number: self.cin_number,
            driver_license: self.driver_license,
            address: self.address,
        }
    }
}

/// Filtro del listado de vehículos; las fechas van juntas o no van
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleListQuery {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// Salida de la etapa 2: vehículo, período y opciones del alquiler
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectVehicleRequest {
    pub vehicle_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub fuel_policy: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub deposit_amount: Option<Decimal>,
}

/// Salida de la etapa 3: artículos opcionales + aceptación de términos
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareContractRequest {
    #[serde(default)]
    pub articles: Option<ContractArticles>,
    #[serde(default)]
    pub accept_terms: bool,
}

/// Salida de la etapa 4
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount_paid: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub deposit_paid: bool,
    #[serde(default)]
    pub deposit_method: Option<PaymentMethod>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PaymentRequest {
    pub fn into_details(self) -> PaymentDetails {
        PaymentDetails {
            deposit_method: self.deposit_method.unwrap_or(self.payment_method),
            amount_paid: self.amount_paid,
            payment_method: self.payment_method,
            deposit_paid: self.deposit_paid,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    #[serde(default)]
    pub start_mileage: Option<i64>,
    #[serde(default)]
    pub initial_fuel_level: Option<FuelLevel>,
}

// -------------------------------------------------------------------------
// Responses
// -------------------------------------------------------------------------

/// Diagnóstico de una finalización fallida
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizationFailureView {
    pub step: FinalizationStep,
    pub booking_id: Option<i64>,
    pub contract_id: Option<i64>,
    pub message: String,
}

/// Vista serializable de una sesión de workflow; los dashboards se
/// re-renderizan a partir de ella después de cada acción
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowView {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub stage: &'static str,
    pub step: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<Vehicle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<RentalPeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<PricingQuote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuel_policy: Option<String>,
    pub contract_prepared: bool,
    pub terms_accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FinalizationFailureView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&WorkflowSession> for WorkflowView {
    fn from(session: &WorkflowSession) -> Self {
        let mut view = WorkflowView {
            id: session.id,
            agency_id: session.agency_id,
            stage: session.stage.name(),
            step: session.stage.step_number(),
            customer: None,
            vehicle: None,
            period: None,
            quote: None,
            fuel_policy: None,
            contract_prepared: false,
            terms_accepted: false,
            payment: None,
            booking_id: None,
            contract_id: None,
            failure: None,
            created_at: session.created_at,
            updated_at: session.updated_at,
        };

        match &session.stage {
            WorkflowStage::CustomerSelection | WorkflowStage::Finalizing => {}
            WorkflowStage::VehicleAndDates { customer } => {
                view.customer = Some(customer.clone());
            }
            WorkflowStage::ContractDraft {
                customer,
                selection,
                draft,
                terms_accepted,
            } => {
                view.customer = Some(customer.clone());
                view.vehicle = Some(selection.vehicle.clone());
                view.period = Some(selection.period);
                view.quote = Some(selection.quote.clone());
                view.fuel_policy = Some(selection.fuel_policy.clone());
                view.contract_prepared = draft.is_some();
                view.terms_accepted = *terms_accepted;
            }
            WorkflowStage::Payment {
                customer, selection, ..
            } => {
                view.customer = Some(customer.clone());
                view.vehicle = Some(selection.vehicle.clone());
                view.period = Some(selection.period);
                view.quote = Some(selection.quote.clone());
                view.fuel_policy = Some(selection.fuel_policy.clone());
                view.contract_prepared = true;
                view.terms_accepted = true;
            }
            WorkflowStage::Finalization {
                customer,
                selection,
                payment,
                ..
            } => {
                view.customer = Some(customer.clone());
                view.vehicle = Some(selection.vehicle.clone());
                view.period = Some(selection.period);
                view.quote = Some(selection.quote.clone());
                view.fuel_policy = Some(selection.fuel_policy.clone());
                view.contract_prepared = true;
                view.terms_accepted = true;
                view.payment = Some(payment.clone());
            }
            WorkflowStage::Completed {
                booking_id,
                contract_id,
            } => {
                view.booking_id = Some(*booking_id);
                view.contract_id = Some(*contract_id);
            }
            WorkflowStage::Failed { failure } => {
                view.booking_id = failure.booking_id;
                view.contract_id = failure.contract_id;
                view.failure = Some(FinalizationFailureView {
                    step: failure.step,
                    booking_id: failure.booking_id,
                    contract_id: failure.contract_id,
                    message: failure.message.clone(),
                });
            }
        }

        view
    }
}

/// Respuesta de la finalización: ids creados + PDF listo para descargar
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub booking_id: i64,
    pub contract_id: i64,
    pub file_name: String,
    /// Bytes del contrato PDF, en base64 para viajar dentro del JSON
    pub contract_pdf_base64: String,
    pub workflow: WorkflowView,
}
