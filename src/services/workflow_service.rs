//! Orquestador del workflow de alquiler
//!
//! Este módulo conduce el proceso guiado de 5 etapas: selección de cliente,
//! vehículo y fechas, contrato, pago y finalización. La posición del
//! workflow es una única unión etiquetada (`WorkflowStage`): cada variante
//! transporta exactamente los datos resueltos hasta esa etapa, con lo cual
//! los estados inválidos no son representables.
//!
//! La finalización es una transacción ordenada de hasta 7 llamadas al
//! backend. Cada paso se intenta a lo sumo una vez por click; ante un fallo
//! el proceso se detiene, no hay rollback de los pasos ya completados y el
//! usuario debe recomenzar el workflow completo.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::clients::ApiError;
use crate::models::{
    ContractArticles, ContractDraft, Customer, FuelLevel, PaymentDetails, PaymentType,
    PricingQuote, RentalPeriod, Vehicle,
};
use crate::services::pricing_service::{self, PricingError};
use crate::services::{
    CreateBookingRequest, CreateContractRequest, NewCustomer, PaymentCharge, RentalBackend,
};
use crate::utils::errors::AppError;

/// Política de carburante por defecto del sistema
const DEFAULT_FUEL_POLICY: &str = "full_to_full";

/// Errores de los guards de etapa. Se reportan inline, nunca viajan al
/// backend. Los mensajes son los que muestran los dashboards.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Session de workflow introuvable")]
    SessionNotFound(Uuid),

    #[error("Client {0} introuvable dans cette agence")]
    CustomerNotFound(i64),

    #[error("Véhicule introuvable ou indisponible")]
    VehicleNotFound(Uuid),

    #[error("Véhicule non disponible pour ces dates")]
    VehicleUnavailable,

    #[error("La date de début doit être aujourd'hui ou après")]
    StartDateInPast,

    #[error("La date de fin doit être après la date de début")]
    EndDateBeforeStart,

    #[error("Veuillez accepter les conditions du contrat")]
    TermsNotAccepted,

    #[error("Le montant payé est insuffisant. Reste à payer: {shortfall} DT")]
    InsufficientPayment { shortfall: rust_decimal::Decimal },

    #[error("Étape invalide: attendu {expected}, actuel {current}")]
    InvalidStage {
        expected: &'static str,
        current: &'static str,
    },

    #[error("Déjà à la première étape")]
    AlreadyAtFirstStage,

    #[error("Impossible de revenir en arrière: la finalisation a commencé")]
    NoBackAfterFinalization,

    #[error("Une finalisation est déjà en cours pour cette session")]
    FinalizationInProgress,

    #[error("La location est déjà finalisée")]
    WorkflowCompleted,

    #[error("La finalisation a échoué; recommencez une nouvelle location")]
    WorkflowFailed,

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::SessionNotFound(_) => AppError::NotFound(err.to_string()),
            WorkflowError::InvalidStage { .. }
            | WorkflowError::AlreadyAtFirstStage
            | WorkflowError::NoBackAfterFinalization
            | WorkflowError::FinalizationInProgress
            | WorkflowError::WorkflowCompleted
            | WorkflowError::WorkflowFailed => AppError::Conflict(err.to_string()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

/// Paso de la transacción de finalización, para diagnóstico de fallos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizationStep {
    CreateBooking,
    CreateContract,
    RecordRentalPayment,
    RecordDepositPayment,
    ConfirmBooking,
    StartRental,
    DownloadContract,
}

impl FinalizationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalizationStep::CreateBooking => "create_booking",
            FinalizationStep::CreateContract => "create_contract",
            FinalizationStep::RecordRentalPayment => "record_rental_payment",
            FinalizationStep::RecordDepositPayment => "record_deposit_payment",
            FinalizationStep::ConfirmBooking => "confirm_booking",
            FinalizationStep::StartRental => "start_rental",
            FinalizationStep::DownloadContract => "download_contract",
        }
    }
}

impl fmt::Display for FinalizationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fallo parcial de la transacción: el paso que falló, los ids ya creados
/// (que quedan persistidos en el backend) y el detalle textual del backend
#[derive(Debug, Clone)]
pub struct FinalizationFailure {
    pub step: FinalizationStep,
    pub booking_id: Option<i64>,
    pub contract_id: Option<i64>,
    pub message: String,
}

impl FinalizationFailure {
    fn new(
        step: FinalizationStep,
        booking_id: Option<i64>,
        contract_id: Option<i64>,
        source: ApiError,
    ) -> Self {
        Self {
            step,
            booking_id,
            contract_id,
            message: source.to_string(),
        }
    }
}

impl From<FinalizationFailure> for AppError {
    fn from(failure: FinalizationFailure) -> Self {
        AppError::FinalizationFailed {
            step: failure.step.as_str().to_string(),
            booking_id: failure.booking_id,
            contract_id: failure.contract_id,
            message: failure.message,
        }
    }
}

/// Resultado de una finalización completa
#[derive(Debug, Clone)]
pub struct FinalizationOutcome {
    pub booking_id: i64,
    pub contract_id: i64,
    pub pdf: Vec<u8>,
}

/// Todo lo resuelto en la etapa 2: vehículo, período y tarificación
#[derive(Debug, Clone)]
pub struct VehicleSelection {
    pub vehicle: Vehicle,
    pub period: RentalPeriod,
    pub quote: PricingQuote,
    pub fuel_policy: String,
    pub notes: Option<String>,
    /// Kilometraje de salida, precargado con el contador del vehículo
    pub start_mileage: i64,
}

/// Posición del workflow. Una sola variante activa a la vez; los datos de
/// cada etapa viajan dentro de la variante.
#[derive(Debug, Clone)]
pub enum WorkflowStage {
    CustomerSelection,
    VehicleAndDates {
        customer: Customer,
    },
    ContractDraft {
        customer: Customer,
        selection: VehicleSelection,
        draft: Option<ContractDraft>,
        terms_accepted: bool,
    },
    Payment {
        customer: Customer,
        selection: VehicleSelection,
        draft: ContractDraft,
    },
    Finalization {
        customer: Customer,
        selection: VehicleSelection,
        draft: ContractDraft,
        payment: PaymentDetails,
    },
    /// Transacción en vuelo: bloquea una segunda finalización concurrente
    Finalizing,
    Completed {
        booking_id: i64,
        contract_id: i64,
    },
    Failed {
        failure: FinalizationFailure,
    },
}

impl WorkflowStage {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowStage::CustomerSelection => "customer_selection",
            WorkflowStage::VehicleAndDates { .. } => "vehicle_and_dates",
            WorkflowStage::ContractDraft { .. } => "contract_draft",
            WorkflowStage::Payment { .. } => "payment",
            WorkflowStage::Finalization { .. } => "finalization",
            WorkflowStage::Finalizing => "finalizing",
            WorkflowStage::Completed { .. } => "completed",
            WorkflowStage::Failed { .. } => "failed",
        }
    }

    /// Número de etapa visible en los dashboards (1 a 5)
    pub fn step_number(&self) -> u8 {
        match self {
            WorkflowStage::CustomerSelection => 1,
            WorkflowStage::VehicleAndDates { .. } => 2,
            WorkflowStage::ContractDraft { .. } => 3,
            WorkflowStage::Payment { .. } => 4,
            WorkflowStage::Finalization { .. }
            | WorkflowStage::Finalizing
            | WorkflowStage::Completed { .. }
            | WorkflowStage::Failed { .. } => 5,
        }
    }
}

/// Sesión de workflow en memoria
#[derive(Debug, Clone)]
pub struct WorkflowSession {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub stage: WorkflowStage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowSession {
    fn new(agency_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            agency_id,
            stage: WorkflowStage::CustomerSelection,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Resultado de la búsqueda de clientes de la etapa 1. Sin resultados,
/// el gateway sugiere precargar el formulario de alta con el término.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSearchOutcome {
    pub customers: Vec<Customer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefill: Option<NewCustomerPrefill>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomerPrefill {
    pub first_name: String,
}

/// Entrada de la etapa 2: vehículo elegido, período y opciones
#[derive(Debug, Clone)]
pub struct VehicleChoice {
    pub vehicle_id: Uuid,
    pub period: RentalPeriod,
    pub fuel_policy: Option<String>,
    pub notes: Option<String>,
    pub deposit_override: Option<rust_decimal::Decimal>,
}

/// Orquestador: sesiones en memoria + backend inyectado por trait
#[derive(Clone)]
pub struct WorkflowService {
    backend: Arc<dyn RentalBackend>,
    sessions: Arc<RwLock<HashMap<Uuid, WorkflowSession>>>,
    session_ttl: Duration,
}

impl WorkflowService {
    pub fn new(backend: Arc<dyn RentalBackend>, session_ttl_hours: i64) -> Self {
        Self {
            backend,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            session_ttl: Duration::hours(session_ttl_hours),
        }
    }

    /// Crea una sesión de workflow para una agencia
    pub async fn create_session(&self, agency_id: Uuid) -> WorkflowSession {
        self.cleanup_expired_sessions().await;

        let session = WorkflowSession::new(agency_id);
        log::info!("🆕 Sesión de workflow {} (agencia {})", session.id, agency_id);

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id, session.clone());
        session
    }

    pub async fn session(&self, id: Uuid) -> Result<WorkflowSession, WorkflowError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&id)
            .cloned()
            .ok_or(WorkflowError::SessionNotFound(id))
    }

    /// Limpia sesiones sin actividad dentro del TTL configurado
    pub async fn cleanup_expired_sessions(&self) {
        let cutoff = Utc::now() - self.session_ttl;
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, session| session.updated_at > cutoff);
    }

    /// Retrocede una etapa. Prohibido una vez iniciada la finalización.
    pub async fn go_back(&self, id: Uuid) -> Result<WorkflowSession, WorkflowError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(WorkflowError::SessionNotFound(id))?;

        let stage = std::mem::replace(&mut session.stage, WorkflowStage::CustomerSelection);
        let previous = match stage {
            WorkflowStage::CustomerSelection => {
                session.stage = WorkflowStage::CustomerSelection;
                return Err(WorkflowError::AlreadyAtFirstStage);
            }
            WorkflowStage::VehicleAndDates { .. } => WorkflowStage::CustomerSelection,
            WorkflowStage::ContractDraft { customer, .. } => {
                WorkflowStage::VehicleAndDates { customer }
            }
            WorkflowStage::Payment {
                customer,
                selection,
                draft,
            } => WorkflowStage::ContractDraft {
                customer,
                selection,
                draft: Some(draft),
                terms_accepted: true,
            },
            WorkflowStage::Finalization {
                customer,
                selection,
                draft,
                ..
            } => WorkflowStage::Payment {
                customer,
                selection,
                draft,
            },
            other @ (WorkflowStage::Finalizing
            | WorkflowStage::Completed { .. }
            | WorkflowStage::Failed { .. }) => {
                session.stage = other;
                return Err(WorkflowError::NoBackAfterFinalization);
            }
        };

        session.stage = previous;
        session.touch();
        Ok(session.clone())
    }

    // ---------------------------------------------------------------------
    // Etapa 1: cliente
    // ---------------------------------------------------------------------

    /// Busca clientes de la agencia de la sesión
    pub async fn search_customers(
        &self,
        id: Uuid,
        term: Option<String>,
    ) -> Result<CustomerSearchOutcome, AppError> {
        let session = self.session(id).await?;
        if !matches!(session.stage, WorkflowStage::CustomerSelection) {
            return Err(WorkflowError::InvalidStage {
                expected: "customer_selection",
                current: session.stage.name(),
            }
            .into());
        }

        let term = term.filter(|t| !t.trim().is_empty());
        let customers = self
            .backend
            .search_customers(session.agency_id, term.as_deref())
            .await?;

        let prefill = match (&term, customers.is_empty()) {
            (Some(term), true) => Some(NewCustomerPrefill {
                first_name: term.clone(),
            }),
            _ => None,
        };

        Ok(CustomerSearchOutcome { customers, prefill })
    }

    /// Selecciona un cliente existente; el id debe existir en la agencia
    pub async fn select_customer(
        &self,
        id: Uuid,
        customer_id: i64,
    ) -> Result<WorkflowSession, AppError> {
        let session = self.session(id).await?;
        let customers = self
            .backend
            .search_customers(session.agency_id, None)
            .await?;
        let customer = customers
            .into_iter()
            .find(|c| c.id == customer_id)
            .ok_or(WorkflowError::CustomerNotFound(customer_id))?;

        self.resolve_customer(id, customer).await
    }

    /// Crea un cliente nuevo y lo deja seleccionado
    pub async fn create_customer(
        &self,
        id: Uuid,
        form: NewCustomer,
    ) -> Result<WorkflowSession, AppError> {
        let session = self.session(id).await?;
        let customer = self
            .backend
            .create_customer(session.agency_id, &form)
            .await?;
        log::info!("✅ Cliente creado: {} ({})", customer.full_name(), customer.id);

        self.resolve_customer(id, customer).await
    }

    async fn resolve_customer(
        &self,
        id: Uuid,
        customer: Customer,
    ) -> Result<WorkflowSession, AppError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(WorkflowError::SessionNotFound(id))?;

        match &session.stage {
            WorkflowStage::CustomerSelection => {
                session.stage = WorkflowStage::VehicleAndDates { customer };
                session.touch();
                Ok(session.clone())
            }
            other => Err(WorkflowError::InvalidStage {
                expected: "customer_selection",
                current: other.name(),
            }
            .into()),
        }
    }

    // ---------------------------------------------------------------------
    // Etapa 2: vehículo y fechas
    // ---------------------------------------------------------------------

    /// Vehículos disponibles; con período, filtrados por disponibilidad
    pub async fn list_vehicles(
        &self,
        id: Uuid,
        period: Option<RentalPeriod>,
    ) -> Result<Vec<Vehicle>, AppError> {
        let session = self.session(id).await?;
        if !matches!(session.stage, WorkflowStage::VehicleAndDates { .. }) {
            return Err(WorkflowError::InvalidStage {
                expected: "vehicle_and_dates",
                current: session.stage.name(),
            }
            .into());
        }

        let vehicles = match period {
            Some(period) => {
                self.backend
                    .list_available_vehicles_for_period(session.agency_id, &period)
                    .await?
            }
            None => {
                self.backend
                    .list_available_vehicles(session.agency_id)
                    .await?
            }
        };
        Ok(vehicles)
    }

    /// Guard de la etapa 2: fechas válidas, vehículo existente y libre.
    /// Tarifica y avanza al borrador de contrato.
    pub async fn select_vehicle(
        &self,
        id: Uuid,
        choice: VehicleChoice,
    ) -> Result<WorkflowSession, AppError> {
        let session = self.session(id).await?;
        if !matches!(session.stage, WorkflowStage::VehicleAndDates { .. }) {
            return Err(WorkflowError::InvalidStage {
                expected: "vehicle_and_dates",
                current: session.stage.name(),
            }
            .into());
        }

        let today = Local::now().date_naive();
        if choice.period.start_date < today {
            return Err(WorkflowError::StartDateInPast.into());
        }
        if choice.period.end_date <= choice.period.start_date {
            return Err(WorkflowError::EndDateBeforeStart.into());
        }

        let vehicles = self
            .backend
            .list_available_vehicles(session.agency_id)
            .await?;
        let vehicle = vehicles
            .into_iter()
            .find(|v| v.id == choice.vehicle_id)
            .ok_or(WorkflowError::VehicleNotFound(choice.vehicle_id))?;

        let available = self
            .backend
            .check_availability(session.agency_id, vehicle.id, &choice.period)
            .await?;
        if !available {
            return Err(WorkflowError::VehicleUnavailable.into());
        }

        log::info!(
            "🚗 Véhicule sélectionné: {} ({})",
            vehicle.label(),
            vehicle.license_plate
        );

        let quote = pricing_service::compute_quote(
            &choice.period,
            vehicle.daily_rate,
            choice.deposit_override,
        )
        .map_err(WorkflowError::from)?;

        let selection = VehicleSelection {
            start_mileage: vehicle.mileage,
            vehicle,
            period: choice.period,
            quote,
            fuel_policy: choice
                .fuel_policy
                .unwrap_or_else(|| DEFAULT_FUEL_POLICY.to_string()),
            notes: choice.notes,
        };

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(WorkflowError::SessionNotFound(id))?;

        let stage = std::mem::replace(&mut session.stage, WorkflowStage::CustomerSelection);
        match stage {
            WorkflowStage::VehicleAndDates { customer } => {
                session.stage = WorkflowStage::ContractDraft {
                    customer,
                    selection,
                    draft: None,
                    terms_accepted: false,
                };
                session.touch();
                Ok(session.clone())
            }
            other => {
                let current = other.name();
                session.stage = other;
                Err(WorkflowError::InvalidStage {
                    expected: "vehicle_and_dates",
                    current,
                }
                .into())
            }
        }
    }

    // ---------------------------------------------------------------------
    // Etapa 3: contrato
    // ---------------------------------------------------------------------

    /// Acción de salida de la etapa 3: arma el borrador (idempotente: si ya
    /// existe, no lo rehace) y exige la aceptación explícita de los términos
    /// para avanzar al pago. Sin aceptación el borrador queda preparado en
    /// la sesión y se reporta el error inline.
    pub async fn prepare_contract(
        &self,
        id: Uuid,
        articles: Option<ContractArticles>,
        accept_terms: bool,
    ) -> Result<WorkflowSession, AppError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(WorkflowError::SessionNotFound(id))?;

        let stage = std::mem::replace(&mut session.stage, WorkflowStage::CustomerSelection);
        match stage {
            WorkflowStage::ContractDraft {
                customer,
                selection,
                draft,
                ..
            } => {
                let draft = match draft {
                    Some(existing) => existing,
                    None => {
                        log::info!("📄 Contrat préparé (session {})", id);
                        ContractDraft::assemble(
                            &customer,
                            &selection.vehicle,
                            &selection.period,
                            &selection.quote,
                            &articles.unwrap_or_default(),
                        )
                    }
                };

                if accept_terms {
                    session.stage = WorkflowStage::Payment {
                        customer,
                        selection,
                        draft,
                    };
                    session.touch();
                    Ok(session.clone())
                } else {
                    session.stage = WorkflowStage::ContractDraft {
                        customer,
                        selection,
                        draft: Some(draft),
                        terms_accepted: false,
                    };
                    session.touch();
                    Err(WorkflowError::TermsNotAccepted.into())
                }
            }
            other => {
                let current = other.name();
                session.stage = other;
                Err(WorkflowError::InvalidStage {
                    expected: "contract_draft",
                    current,
                }
                .into())
            }
        }
    }

    // ---------------------------------------------------------------------
    // Etapa 4: pago
    // ---------------------------------------------------------------------

    /// Guard de suficiencia: `amount_paid >= total_amount`, si no, reporta
    /// el faltante exacto
    pub async fn submit_payment(
        &self,
        id: Uuid,
        details: PaymentDetails,
    ) -> Result<WorkflowSession, AppError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(WorkflowError::SessionNotFound(id))?;

        let stage = std::mem::replace(&mut session.stage, WorkflowStage::CustomerSelection);
        match stage {
            WorkflowStage::Payment {
                customer,
                selection,
                draft,
            } => {
                if details.amount_paid < selection.quote.total_amount {
                    let shortfall = selection.quote.total_amount - details.amount_paid;
                    session.stage = WorkflowStage::Payment {
                        customer,
                        selection,
                        draft,
                    };
                    return Err(WorkflowError::InsufficientPayment {
                        shortfall: pricing_service::round_money(shortfall),
                    }
                    .into());
                }

                session.stage = WorkflowStage::Finalization {
                    customer,
                    selection,
                    draft,
                    payment: details,
                };
                session.touch();
                Ok(session.clone())
            }
            other => {
                let current = other.name();
                session.stage = other;
                Err(WorkflowError::InvalidStage {
                    expected: "payment",
                    current,
                }
                .into())
            }
        }
    }

    // ---------------------------------------------------------------------
    // Etapa 5: finalización
    // ---------------------------------------------------------------------

    /// Ejecuta la transacción ordenada de finalización.
    ///
    /// La sesión queda en `Finalizing` mientras la transacción está en
    /// vuelo: una segunda llamada concurrente se rechaza con conflicto.
    /// El resultado (éxito o fallo con diagnóstico) queda en la sesión.
    pub async fn finalize(
        &self,
        id: Uuid,
        start_mileage: Option<i64>,
        initial_fuel_level: Option<FuelLevel>,
    ) -> Result<(FinalizationOutcome, WorkflowSession), AppError> {
        // Tomar los datos y marcar la sesión como "en finalización" sin
        // retener el lock durante las llamadas al backend
        let (agency_id, customer, selection, draft, payment) = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(&id)
                .ok_or(WorkflowError::SessionNotFound(id))?;

            let stage = std::mem::replace(&mut session.stage, WorkflowStage::Finalizing);
            match stage {
                WorkflowStage::Finalization {
                    customer,
                    selection,
                    draft,
                    payment,
                } => {
                    session.touch();
                    (session.agency_id, customer, selection, draft, payment)
                }
                WorkflowStage::Finalizing => {
                    session.stage = WorkflowStage::Finalizing;
                    return Err(WorkflowError::FinalizationInProgress.into());
                }
                completed @ WorkflowStage::Completed { .. } => {
                    session.stage = completed;
                    return Err(WorkflowError::WorkflowCompleted.into());
                }
                failed @ WorkflowStage::Failed { .. } => {
                    session.stage = failed;
                    return Err(WorkflowError::WorkflowFailed.into());
                }
                other => {
                    let current = other.name();
                    session.stage = other;
                    return Err(WorkflowError::InvalidStage {
                        expected: "finalization",
                        current,
                    }
                    .into());
                }
            }
        };

        let mileage = start_mileage.unwrap_or(selection.start_mileage);
        let fuel = initial_fuel_level.unwrap_or_default();

        let result = self
            .run_finalization(agency_id, &customer, &selection, &draft, &payment, mileage, fuel)
            .await;

        // Volcar el resultado en la sesión
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(WorkflowError::SessionNotFound(id))?;

        match result {
            Ok(outcome) => {
                session.stage = WorkflowStage::Completed {
                    booking_id: outcome.booking_id,
                    contract_id: outcome.contract_id,
                };
                session.touch();
                Ok((outcome, session.clone()))
            }
            Err(failure) => {
                session.stage = WorkflowStage::Failed {
                    failure: failure.clone(),
                };
                session.touch();
                Err(failure.into())
            }
        }
    }

    /// La transacción en sí: 7 pasos estrictamente secuenciales, cada uno
    /// emitido recién al observar la respuesta del anterior. Sin rollback:
    /// ante un fallo se detiene y reporta el paso fallido con los ids ya
    /// creados. Todos los pasos mutadores comparten una misma clave de
    /// deduplicación generada para este click.
    #[allow(clippy::too_many_arguments)]
    async fn run_finalization(
        &self,
        agency_id: Uuid,
        customer: &Customer,
        selection: &VehicleSelection,
        draft: &ContractDraft,
        payment: &PaymentDetails,
        start_mileage: i64,
        initial_fuel_level: FuelLevel,
    ) -> Result<FinalizationOutcome, FinalizationFailure> {
        let transaction_id = Uuid::new_v4();
        log::info!(
            "🚀 Finalisation démarrée (session transaction {})",
            transaction_id
        );

        // 1. Crear la reserva
        log::info!("1/7 📋 Création de la réservation");
        let booking_request = CreateBookingRequest {
            customer_id: customer.id,
            vehicle_id: selection.vehicle.id,
            start_date: selection.period.start_param(),
            end_date: selection.period.end_param(),
            daily_rate: selection.quote.daily_rate,
            deposit_amount: selection.quote.deposit_amount,
            fuel_policy: selection.fuel_policy.clone(),
            notes: selection.notes.clone(),
        };
        let booking = self
            .backend
            .create_booking(agency_id, &booking_request, transaction_id)
            .await
            .map_err(|e| {
                FinalizationFailure::new(FinalizationStep::CreateBooking, None, None, e)
            })?;
        let booking_id = booking.id;
        log::info!("✅ Réservation créée: {}", booking_id);

        // 2. Crear el contrato ligado a la reserva
        log::info!("2/7 📝 Création du contrat");
        let contract_request = CreateContractRequest {
            booking_id,
            terms_and_conditions: draft.terms_and_conditions.clone(),
            special_clauses: draft.special_clauses.clone(),
        };
        let contract = self
            .backend
            .create_contract(agency_id, &contract_request, transaction_id)
            .await
            .map_err(|e| {
                FinalizationFailure::new(
                    FinalizationStep::CreateContract,
                    Some(booking_id),
                    None,
                    e,
                )
            })?;
        let contract_id = contract.id;
        log::info!("✅ Contrat créé: {}", contract_id);

        // 3. Registrar el pago del alquiler
        log::info!("3/7 💰 Enregistrement du paiement");
        let rental_charge = PaymentCharge {
            amount: payment.amount_paid,
            method: payment.payment_method,
            kind: PaymentType::Rental,
            notes: payment.notes.clone().unwrap_or_default(),
        };
        self.backend
            .record_payment(booking_id, &rental_charge, transaction_id)
            .await
            .map_err(|e| {
                FinalizationFailure::new(
                    FinalizationStep::RecordRentalPayment,
                    Some(booking_id),
                    Some(contract_id),
                    e,
                )
            })?;

        // 4. Registrar la caución si se marcó como pagada
        if payment.deposit_paid {
            log::info!("4/7 💰 Enregistrement de la caution");
            let deposit_charge = PaymentCharge {
                amount: selection.quote.deposit_amount,
                method: payment.deposit_method,
                kind: PaymentType::Deposit,
                notes: "Caution".to_string(),
            };
            self.backend
                .record_payment(booking_id, &deposit_charge, transaction_id)
                .await
                .map_err(|e| {
                    FinalizationFailure::new(
                        FinalizationStep::RecordDepositPayment,
                        Some(booking_id),
                        Some(contract_id),
                        e,
                    )
                })?;
        }

        // 5. Confirmar la reserva
        log::info!("5/7 ✔️ Confirmation de la réservation");
        self.backend
            .confirm_booking(agency_id, booking_id)
            .await
            .map_err(|e| {
                FinalizationFailure::new(
                    FinalizationStep::ConfirmBooking,
                    Some(booking_id),
                    Some(contract_id),
                    e,
                )
            })?;

        // 6. Arrancar el alquiler
        log::info!("6/7 🚗 Démarrage de la location (km {})", start_mileage);
        self.backend
            .start_rental(agency_id, booking_id, start_mileage, initial_fuel_level)
            .await
            .map_err(|e| {
                FinalizationFailure::new(
                    FinalizationStep::StartRental,
                    Some(booking_id),
                    Some(contract_id),
                    e,
                )
            })?;

        // 7. Descargar el PDF del contrato
        log::info!("7/7 📄 Téléchargement du contrat PDF");
        let pdf = self
            .backend
            .download_contract_pdf(agency_id, contract_id)
            .await
            .map_err(|e| {
                FinalizationFailure::new(
                    FinalizationStep::DownloadContract,
                    Some(booking_id),
                    Some(contract_id),
                    e,
                )
            })?;

        log::info!(
            "🎉 Finalisation complète (réservation {}, contrat {})",
            booking_id,
            contract_id
        );

        Ok(FinalizationOutcome {
            booking_id,
            contract_id,
            pdf,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Local;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    use crate::models::{Booking, BookingStatus, Contract, PaymentConfirmation, PaymentMethod, VehicleStatus};

    const VEHICLE_ID: Uuid = Uuid::from_u128(0x11ad);
    const AGENCY_ID: Uuid = Uuid::from_u128(0xa6e);

    fn full_total() -> Decimal {
        // 3 jours × 100 + 19% + timbre = 358.000
        Decimal::new(358_000, 3)
    }

    fn payment_details(amount: Decimal, deposit_paid: bool) -> PaymentDetails {
        PaymentDetails {
            amount_paid: amount,
            payment_method: PaymentMethod::Especes,
            deposit_paid,
            deposit_method: PaymentMethod::Carte,
            notes: None,
        }
    }

    #[derive(Default)]
    struct MockBackend {
        customers: Vec<Customer>,
        vehicles: Vec<Vehicle>,
        vehicle_unavailable: bool,
        fail_on: Option<FinalizationStep>,
        calls: StdMutex<Vec<String>>,
        booking_requests: StdMutex<Vec<CreateBookingRequest>>,
        contract_requests: StdMutex<Vec<CreateContractRequest>>,
        idempotency_keys: StdMutex<Vec<Uuid>>,
        persisted_bookings: StdMutex<Vec<i64>>,
        persisted_contracts: StdMutex<Vec<i64>>,
        pdf_fetches: AtomicUsize,
        booking_gate: Option<Arc<Notify>>,
    }

    impl MockBackend {
        fn with_fixtures() -> Self {
            Self {
                customers: vec![Customer {
                    id: 1,
                    first_name: "Amine".to_string(),
                    last_name: "Ben Salah".to_string(),
                    email: "amine@example.tn".to_string(),
                    phone: "+216 20 123 456".to_string(),
                    cin_number: Some("09812345".to_string()),
                    driver_license: Some("TN-554433".to_string()),
                    address: None,
                }],
                vehicles: vec![Vehicle {
                    id: VEHICLE_ID,
                    license_plate: "215 TU 4521".to_string(),
                    brand: "Peugeot".to_string(),
                    model: "208".to_string(),
                    year: Some(2022),
                    daily_rate: Decimal::new(100, 0),
                    status: VehicleStatus::Disponible,
                    mileage: 45_000,
                }],
                ..Default::default()
            }
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn fail_if(&self, step: FinalizationStep) -> Result<(), ApiError> {
            if self.fail_on == Some(step) {
                return Err(ApiError::Upstream {
                    status: 500,
                    message: format!("panne simulée: {}", step),
                });
            }
            Ok(())
        }

        fn booking(&self, request: &CreateBookingRequest) -> Booking {
            Booking {
                id: 501,
                booking_number: Some("BK-2026-0001".to_string()),
                customer_id: request.customer_id,
                vehicle_id: request.vehicle_id,
                start_date: request.start_date[..10].parse().unwrap(),
                end_date: request.end_date[..10].parse().unwrap(),
                status: BookingStatus::Pending,
                daily_rate: Some(request.daily_rate),
                total_amount: None,
                deposit_amount: Some(request.deposit_amount),
                fuel_policy: Some(request.fuel_policy.clone()),
                notes: request.notes.clone(),
            }
        }
    }

    #[async_trait]
    impl RentalBackend for MockBackend {
        async fn search_customers(
            &self,
            _agency_id: Uuid,
            term: Option<&str>,
        ) -> Result<Vec<Customer>, ApiError> {
            self.record("search_customers");
            let customers = match term {
                Some(term) => self
                    .customers
                    .iter()
                    .filter(|c| c.first_name.contains(term) || c.last_name.contains(term))
                    .cloned()
                    .collect(),
                None => self.customers.clone(),
            };
            Ok(customers)
        }

        async fn create_customer(
            &self,
            _agency_id: Uuid,
            form: &NewCustomer,
        ) -> Result<Customer, ApiError> {
            self.record("create_customer");
            Ok(Customer {
                id: 42,
                first_name: form.first_name.clone(),
                last_name: form.last_name.clone(),
                email: form.email.clone(),
                phone: form.phone.clone(),
                cin_number: form.cin_number.clone(),
                driver_license: form.driver_license.clone(),
                address: form.address.clone(),
            })
        }

        async fn list_available_vehicles(
            &self,
            _agency_id: Uuid,
        ) -> Result<Vec<Vehicle>, ApiError> {
            self.record("list_available_vehicles");
            Ok(self.vehicles.clone())
        }

        async fn list_available_vehicles_for_period(
            &self,
            _agency_id: Uuid,
            _period: &RentalPeriod,
        ) -> Result<Vec<Vehicle>, ApiError> {
            self.record("list_available_vehicles_for_period");
            Ok(self.vehicles.clone())
        }

        async fn check_availability(
            &self,
            _agency_id: Uuid,
            _vehicle_id: Uuid,
            _period: &RentalPeriod,
        ) -> Result<bool, ApiError> {
            self.record("check_availability");
            Ok(!self.vehicle_unavailable)
        }

        async fn create_booking(
            &self,
            _agency_id: Uuid,
            request: &CreateBookingRequest,
            idempotency_key: Uuid,
        ) -> Result<Booking, ApiError> {
            self.record("create_booking");
            if let Some(gate) = &self.booking_gate {
                gate.notified().await;
            }
            self.fail_if(FinalizationStep::CreateBooking)?;
            self.idempotency_keys.lock().unwrap().push(idempotency_key);
            self.booking_requests.lock().unwrap().push(request.clone());
            let booking = self.booking(request);
            self.persisted_bookings.lock().unwrap().push(booking.id);
            Ok(booking)
        }

        async fn create_contract(
            &self,
            _agency_id: Uuid,
            request: &CreateContractRequest,
            idempotency_key: Uuid,
        ) -> Result<Contract, ApiError> {
            self.record("create_contract");
            self.fail_if(FinalizationStep::CreateContract)?;
            self.idempotency_keys.lock().unwrap().push(idempotency_key);
            self.contract_requests.lock().unwrap().push(request.clone());
            self.persisted_contracts.lock().unwrap().push(9001);
            Ok(Contract {
                id: 9001,
                booking_id: request.booking_id,
                status: Some("draft".to_string()),
            })
        }

        async fn record_payment(
            &self,
            _booking_id: i64,
            charge: &PaymentCharge,
            idempotency_key: Uuid,
        ) -> Result<PaymentConfirmation, ApiError> {
            self.record(&format!("record_payment:{}", charge.kind.as_str()));
            let step = match charge.kind {
                PaymentType::Rental => FinalizationStep::RecordRentalPayment,
                PaymentType::Deposit => FinalizationStep::RecordDepositPayment,
            };
            self.fail_if(step)?;
            self.idempotency_keys.lock().unwrap().push(idempotency_key);
            Ok(PaymentConfirmation {
                id: Some(7),
                payment_reference: Some("PAY-1".to_string()),
                amount: Some(charge.amount),
                status: Some("completed".to_string()),
            })
        }

        async fn confirm_booking(
            &self,
            _agency_id: Uuid,
            booking_id: i64,
        ) -> Result<Booking, ApiError> {
            self.record("confirm_booking");
            self.fail_if(FinalizationStep::ConfirmBooking)?;
            let request = self.booking_requests.lock().unwrap()[0].clone();
            let mut booking = self.booking(&request);
            booking.id = booking_id;
            booking.status = BookingStatus::Confirmed;
            Ok(booking)
        }

        async fn start_rental(
            &self,
            _agency_id: Uuid,
            booking_id: i64,
            _initial_mileage: i64,
            _initial_fuel_level: FuelLevel,
        ) -> Result<Booking, ApiError> {
            self.record("start_rental");
            self.fail_if(FinalizationStep::StartRental)?;
            let request = self.booking_requests.lock().unwrap()[0].clone();
            let mut booking = self.booking(&request);
            booking.id = booking_id;
            booking.status = BookingStatus::InProgress;
            Ok(booking)
        }

        async fn download_contract_pdf(
            &self,
            _agency_id: Uuid,
            _contract_id: i64,
        ) -> Result<Vec<u8>, ApiError> {
            self.record("download_contract_pdf");
            self.fail_if(FinalizationStep::DownloadContract)?;
            self.pdf_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(b"%PDF-1.4 mock".to_vec())
        }
    }

    fn service_with(mock: MockBackend) -> (WorkflowService, Arc<MockBackend>) {
        let backend = Arc::new(mock);
        let service = WorkflowService::new(backend.clone(), 24);
        (service, backend)
    }

    fn rental_period() -> RentalPeriod {
        let start = Local::now().date_naive();
        RentalPeriod::new(start, start + Duration::days(3))
    }

    fn vehicle_choice() -> VehicleChoice {
        VehicleChoice {
            vehicle_id: VEHICLE_ID,
            period: rental_period(),
            fuel_policy: None,
            notes: None,
            deposit_override: None,
        }
    }

    /// Conduce una sesión hasta la etapa de finalización inclusive
    async fn drive_to_finalization(service: &WorkflowService, deposit_paid: bool) -> Uuid {
        let session = service.create_session(AGENCY_ID).await;
        service.select_customer(session.id, 1).await.unwrap();
        service
            .select_vehicle(session.id, vehicle_choice())
            .await
            .unwrap();
        service
            .prepare_contract(session.id, None, true)
            .await
            .unwrap();
        service
            .submit_payment(session.id, payment_details(full_total(), deposit_paid))
            .await
            .unwrap();
        session.id
    }

    #[tokio::test]
    async fn happy_path_runs_steps_in_order() {
        let (service, backend) = service_with(MockBackend::with_fixtures());
        let id = drive_to_finalization(&service, false).await;

        let before = backend.calls().len();
        let (outcome, session) = service.finalize(id, None, None).await.unwrap();

        assert_eq!(outcome.booking_id, 501);
        assert_eq!(outcome.contract_id, 9001);
        assert_eq!(outcome.pdf, b"%PDF-1.4 mock".to_vec());
        assert_eq!(backend.pdf_fetches.load(Ordering::SeqCst), 1);
        assert!(matches!(
            session.stage,
            WorkflowStage::Completed {
                booking_id: 501,
                contract_id: 9001
            }
        ));

        // Orden estricto: el contrato jamás antes de la respuesta de la reserva
        let calls = backend.calls();
        let calls: Vec<&str> = calls[before..].iter().map(String::as_str).collect();
        assert_eq!(
            calls,
            vec![
                "create_booking",
                "create_contract",
                "record_payment:rental",
                "confirm_booking",
                "start_rental",
                "download_contract_pdf",
            ]
        );
    }

    #[tokio::test]
    async fn deposit_adds_a_second_payment() {
        let (service, backend) = service_with(MockBackend::with_fixtures());
        let id = drive_to_finalization(&service, true).await;

        let before = backend.calls().len();
        service.finalize(id, None, None).await.unwrap();

        let calls = backend.calls();
        let calls: Vec<&str> = calls[before..].iter().map(String::as_str).collect();
        assert_eq!(
            calls,
            vec![
                "create_booking",
                "create_contract",
                "record_payment:rental",
                "record_payment:deposit",
                "confirm_booking",
                "start_rental",
                "download_contract_pdf",
            ]
        );
    }

    #[tokio::test]
    async fn partial_failure_halts_without_rollback() {
        let mut mock = MockBackend::with_fixtures();
        mock.fail_on = Some(FinalizationStep::RecordDepositPayment);
        let (service, backend) = service_with(mock);
        let id = drive_to_finalization(&service, true).await;

        let err = service.finalize(id, None, None).await.unwrap_err();
        match err {
            AppError::FinalizationFailed {
                step,
                booking_id,
                contract_id,
                message,
            } => {
                assert_eq!(step, "record_deposit_payment");
                assert_eq!(booking_id, Some(501));
                assert_eq!(contract_id, Some(9001));
                assert!(message.contains("panne simulée"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // La reserva y el contrato quedan persistidos, sin compensación
        assert_eq!(*backend.persisted_bookings.lock().unwrap(), vec![501]);
        assert_eq!(*backend.persisted_contracts.lock().unwrap(), vec![9001]);

        // Ningún paso posterior se intentó
        let calls = backend.calls();
        assert!(!calls.contains(&"confirm_booking".to_string()));
        assert!(!calls.contains(&"start_rental".to_string()));
        assert!(!calls.contains(&"download_contract_pdf".to_string()));

        // La sesión queda en estado fallido terminal
        let session = service.session(id).await.unwrap();
        match &session.stage {
            WorkflowStage::Failed { failure } => {
                assert_eq!(failure.step, FinalizationStep::RecordDepositPayment);
                assert_eq!(failure.booking_id, Some(501));
            }
            other => panic!("unexpected stage: {:?}", other),
        }

        // Reintentar exige recomenzar el workflow completo
        let err = service.finalize(id, None, None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn stage_two_rejects_bad_dates() {
        let (service, _backend) = service_with(MockBackend::with_fixtures());
        let session = service.create_session(AGENCY_ID).await;
        service.select_customer(session.id, 1).await.unwrap();

        let today = Local::now().date_naive();

        let mut choice = vehicle_choice();
        choice.period = RentalPeriod::new(today, today);
        let err = service.select_vehicle(session.id, choice).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m.contains("date de fin")));

        let mut choice = vehicle_choice();
        choice.period = RentalPeriod::new(today - Duration::days(1), today + Duration::days(2));
        let err = service.select_vehicle(session.id, choice).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m.contains("date de début")));

        // La sesión sigue en la etapa 2
        let session = service.session(session.id).await.unwrap();
        assert_eq!(session.stage.name(), "vehicle_and_dates");
    }

    #[tokio::test]
    async fn stage_four_reports_exact_shortfall() {
        let (service, _backend) = service_with(MockBackend::with_fixtures());
        let session = service.create_session(AGENCY_ID).await;
        service.select_customer(session.id, 1).await.unwrap();
        service
            .select_vehicle(session.id, vehicle_choice())
            .await
            .unwrap();
        service
            .prepare_contract(session.id, None, true)
            .await
            .unwrap();

        let short = full_total() - Decimal::new(1, 3);
        let err = service
            .submit_payment(session.id, payment_details(short, false))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m.contains("0.001")));

        // Con el monto exacto avanza
        let session = service
            .submit_payment(session.id, payment_details(full_total(), false))
            .await
            .unwrap();
        assert_eq!(session.stage.name(), "finalization");
    }

    #[tokio::test]
    async fn new_customer_id_flows_into_booking() {
        let (service, backend) = service_with(MockBackend::with_fixtures());
        let session = service.create_session(AGENCY_ID).await;

        // Búsqueda sin resultados → sugerencia de alta con el término
        let outcome = service
            .search_customers(session.id, Some("Nadia".to_string()))
            .await
            .unwrap();
        assert!(outcome.customers.is_empty());
        assert_eq!(outcome.prefill.unwrap().first_name, "Nadia");

        let form = NewCustomer {
            first_name: "Nadia".to_string(),
            last_name: "Trabelsi".to_string(),
            email: "nadia@example.tn".to_string(),
            phone: "+216 22 987 654".to_string(),
            cin_number: Some("07654321".to_string()),
            driver_license: Some("TN-112233".to_string()),
            address: None,
        };
        service.create_customer(session.id, form).await.unwrap();

        service
            .select_vehicle(session.id, vehicle_choice())
            .await
            .unwrap();
        service
            .prepare_contract(session.id, None, true)
            .await
            .unwrap();
        service
            .submit_payment(session.id, payment_details(full_total(), false))
            .await
            .unwrap();
        service.finalize(session.id, None, None).await.unwrap();

        let requests = backend.booking_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].customer_id, 42);
    }

    #[tokio::test]
    async fn contract_preparation_is_idempotent_and_gated_on_terms() {
        let (service, _backend) = service_with(MockBackend::with_fixtures());
        let session = service.create_session(AGENCY_ID).await;
        service.select_customer(session.id, 1).await.unwrap();
        service
            .select_vehicle(session.id, vehicle_choice())
            .await
            .unwrap();

        // Avanzar sin aceptar: error inline, pero el borrador queda armado
        let err = service
            .prepare_contract(session.id, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m.contains("accepter")));

        let session_after = service.session(session.id).await.unwrap();
        assert_eq!(session_after.stage.name(), "contract_draft");
        let first_draft = match &session_after.stage {
            WorkflowStage::ContractDraft { draft, .. } => draft.clone().unwrap(),
            _ => unreachable!(),
        };

        // Re-ejecutar con otros artículos es un no-op sobre el borrador
        let mut articles = ContractArticles::default();
        articles.article1 = "texte remplacé".to_string();
        let session_after = service
            .prepare_contract(session.id, Some(articles), true)
            .await
            .unwrap();
        assert_eq!(session_after.stage.name(), "payment");
        match &session_after.stage {
            WorkflowStage::Payment { draft, .. } => {
                assert_eq!(draft.terms_and_conditions, first_draft.terms_and_conditions);
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn one_idempotency_key_per_transaction() {
        let (service, backend) = service_with(MockBackend::with_fixtures());
        let id = drive_to_finalization(&service, true).await;
        service.finalize(id, None, None).await.unwrap();

        let keys = backend.idempotency_keys.lock().unwrap();
        // booking + contrato + dos pagos comparten la clave del click
        assert_eq!(keys.len(), 4);
        assert!(keys.iter().all(|k| *k == keys[0]));
    }

    #[tokio::test]
    async fn concurrent_finalize_is_refused() {
        let gate = Arc::new(Notify::new());
        let mut mock = MockBackend::with_fixtures();
        mock.booking_gate = Some(gate.clone());
        let (service, _backend) = service_with(mock);
        let id = drive_to_finalization(&service, false).await;

        let racing = {
            let service = service.clone();
            tokio::spawn(async move { service.finalize(id, None, None).await })
        };

        // Dejar que la primera finalización llegue al backend y quede
        // esperando en la puerta
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let err = service.finalize(id, None, None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        gate.notify_one();
        let (outcome, _) = racing.await.unwrap().unwrap();
        assert_eq!(outcome.booking_id, 501);
    }

    #[tokio::test]
    async fn back_navigation_respects_the_point_of_no_return() {
        let (service, _backend) = service_with(MockBackend::with_fixtures());
        let session = service.create_session(AGENCY_ID).await;

        let err = service.go_back(session.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::AlreadyAtFirstStage));

        service.select_customer(session.id, 1).await.unwrap();
        service
            .select_vehicle(session.id, vehicle_choice())
            .await
            .unwrap();
        service
            .prepare_contract(session.id, None, true)
            .await
            .unwrap();

        // Pago → contrato: el borrador y la aceptación sobreviven
        let back = service.go_back(session.id).await.unwrap();
        match &back.stage {
            WorkflowStage::ContractDraft {
                draft,
                terms_accepted,
                ..
            } => {
                assert!(draft.is_some());
                assert!(terms_accepted);
            }
            other => panic!("unexpected stage: {:?}", other),
        }

        // Completar y verificar que ya no hay vuelta atrás
        service
            .prepare_contract(session.id, None, true)
            .await
            .unwrap();
        service
            .submit_payment(session.id, payment_details(full_total(), false))
            .await
            .unwrap();
        service.finalize(session.id, None, None).await.unwrap();
        let err = service.go_back(session.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NoBackAfterFinalization));
    }

    #[tokio::test]
    async fn unavailable_vehicle_blocks_stage_two() {
        let mut mock = MockBackend::with_fixtures();
        mock.vehicle_unavailable = true;
        let (service, _backend) = service_with(mock);
        let session = service.create_session(AGENCY_ID).await;
        service.select_customer(session.id, 1).await.unwrap();

        let err = service
            .select_vehicle(session.id, vehicle_choice())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m.contains("non disponible")));
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped() {
        let (service, _backend) = service_with(MockBackend::with_fixtures());
        let service = WorkflowService {
            session_ttl: Duration::hours(0),
            ..service
        };
        let session = service.create_session(AGENCY_ID).await;
        service.cleanup_expired_sessions().await;

        let err = service.session(session.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::SessionNotFound(_)));
    }
}
