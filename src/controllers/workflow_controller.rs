//! Handlers del workflow de alquiler
//!
//! Cada handler corresponde a una acción explícita de los dashboards
//! (botón "Suivant", búsqueda, finalización). Ninguno mantiene estado:
//! todo vive en la sesión del orquestador.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use base64::Engine;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{
    CreateCustomerRequest, CustomerSearchQuery, FinalizeRequest, FinalizeResponse,
    PaymentRequest, PrepareContractRequest, SelectCustomerRequest, SelectVehicleRequest,
    StartWorkflowRequest, VehicleListQuery, WorkflowView,
};
use crate::models::{RentalPeriod, Vehicle};
use crate::services::workflow_service::{CustomerSearchOutcome, VehicleChoice};
use crate::state::AppState;
use crate::utils::errors::{bad_request_error, AppError};
use crate::utils::validation::validate_date;

pub async fn create_workflow(
    State(state): State<AppState>,
    Json(request): Json<StartWorkflowRequest>,
) -> Result<(StatusCode, Json<WorkflowView>), AppError> {
    let session = state.workflow.create_session(request.agency_id).await;
    Ok((StatusCode::CREATED, Json(WorkflowView::from(&session))))
}

pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowView>, AppError> {
    let session = state.workflow.session(id).await?;
    Ok(Json(WorkflowView::from(&session)))
}

pub async fn go_back(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowView>, AppError> {
    let session = state.workflow.go_back(id).await?;
    Ok(Json(WorkflowView::from(&session)))
}

pub async fn search_customers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CustomerSearchQuery>,
) -> Result<Json<CustomerSearchOutcome>, AppError> {
    let outcome = state.workflow.search_customers(id, query.search).await?;
    Ok(Json(outcome))
}

pub async fn select_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectCustomerRequest>,
) -> Result<Json<WorkflowView>, AppError> {
    let session = state
        .workflow
        .select_customer(id, request.customer_id)
        .await?;
    Ok(Json(WorkflowView::from(&session)))
}

pub async fn create_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<Json<WorkflowView>, AppError> {
    request.validate()?;
    let session = state
        .workflow
        .create_customer(id, request.into_form())
        .await?;
    Ok(Json(WorkflowView::from(&session)))
}

pub async fn list_vehicles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<VehicleListQuery>,
) -> Result<Json<Vec<Vehicle>>, AppError> {
    let period = match (query.start_date, query.end_date) {
        (Some(start), Some(end)) => {
            let start = validate_date(&start).map_err(|_| {
                bad_request_error("startDate invalide, format attendu YYYY-MM-DD")
            })?;
            let end = validate_date(&end)
                .map_err(|_| bad_request_error("endDate invalide, format attendu YYYY-MM-DD"))?;
            Some(RentalPeriod::new(start, end))
        }
        (None, None) => None,
        _ => {
            return Err(bad_request_error(
                "startDate et endDate doivent être fournis ensemble",
            ))
        }
    };

    let vehicles = state.workflow.list_vehicles(id, period).await?;
    Ok(Json(vehicles))
}

pub async fn select_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectVehicleRequest>,
) -> Result<Json<WorkflowView>, AppError> {
    let choice = VehicleChoice {
        vehicle_id: request.vehicle_id,
        period: RentalPeriod::new(request.start_date, request.end_date),
        fuel_policy: request.fuel_policy,
        notes: request.notes,
        deposit_override: request.deposit_amount,
    };
    let session = state.workflow.select_vehicle(id, choice).await?;
    Ok(Json(WorkflowView::from(&session)))
}

pub async fn prepare_contract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PrepareContractRequest>,
) -> Result<Json<WorkflowView>, AppError> {
    let session = state
        .workflow
        .prepare_contract(id, request.articles, request.accept_terms)
        .await?;
    Ok(Json(WorkflowView::from(&session)))
}

pub async fn submit_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<WorkflowView>, AppError> {
    let session = state
        .workflow
        .submit_payment(id, request.into_details())
        .await?;
    Ok(Json(WorkflowView::from(&session)))
}

pub async fn finalize(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<FinalizeResponse>, AppError> {
    // El cuerpo es opcional: sin kilometraje ni nivel de combustible se usan
    // los valores precargados en la selección
    let request: FinalizeRequest = if body.is_empty() {
        FinalizeRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| bad_request_error(&format!("Corps JSON invalide: {}", e)))?
    };
    let (outcome, session) = state
        .workflow
        .finalize(id, request.start_mileage, request.initial_fuel_level)
        .await?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(&outcome.pdf);
    Ok(Json(FinalizeResponse {
        booking_id: outcome.booking_id,
        contract_id: outcome.contract_id,
        file_name: format!("contrat-location-{}.pdf", outcome.booking_id),
        contract_pdf_base64: encoded,
        workflow: WorkflowView::from(&session),
    }))
}
