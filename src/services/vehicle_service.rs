//! Servicio de vehículos
//!
//! Listado de vehículos disponibles y comprobación de disponibilidad por
//! período. El filtro por fechas lanza un check por vehículo en paralelo;
//! el veredicto final sobre solapamientos siempre lo da el backend.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clients::{ApiError, RentalApiClient};
use crate::models::{RentalPeriod, Vehicle};
use crate::services::parse_list;

/// Valor histórico del filtro de estado en la query del backend
const AVAILABLE_STATUS_PARAM: &str = "DISPONIBLE";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityBody {
    vehicle_id: Uuid,
    start_date: String,
    end_date: String,
}

#[derive(Deserialize)]
struct AvailabilityResponse {
    available: bool,
}

pub struct VehicleService {
    api: Arc<RentalApiClient>,
}

impl VehicleService {
    pub fn new(api: Arc<RentalApiClient>) -> Self {
        Self { api }
    }

    /// Vehículos de la agencia en estado disponible
    pub async fn list_available(&self, agency_id: Uuid) -> Result<Vec<Vehicle>, ApiError> {
        let query = vec![
            ("agencyId", agency_id.to_string()),
            ("status", AVAILABLE_STATUS_PARAM.to_string()),
        ];
        let value: serde_json::Value = self.api.get_json("/vehicles", &query).await?;
        parse_list(value, "vehicles")
    }

    /// Pregunta al backend si un vehículo está libre en el período dado
    pub async fn check_availability(
        &self,
        agency_id: Uuid,
        vehicle_id: Uuid,
        period: &RentalPeriod,
    ) -> Result<bool, ApiError> {
        let body = AvailabilityBody {
            vehicle_id,
            start_date: period.start_param(),
            end_date: period.end_param(),
        };
        let query = vec![("agencyId", agency_id.to_string())];
        let response: AvailabilityResponse = self
            .api
            .post_json("/bookings/check-availability", &query, &body, None)
            .await?;
        Ok(response.available)
    }

    /// Listado filtrado por período: un check de disponibilidad por vehículo
    /// en paralelo. Un check que falla descarta ese vehículo del listado
    /// en lugar de tumbar la operación completa.
    pub async fn list_available_for_period(
        &self,
        agency_id: Uuid,
        period: &RentalPeriod,
    ) -> Result<Vec<Vehicle>, ApiError> {
        let vehicles = self.list_available(agency_id).await?;
        log::info!(
            "📅 Comprobando disponibilidad de {} vehículos para {} → {}",
            vehicles.len(),
            period.start_date,
            period.end_date
        );

        let checks = vehicles.into_iter().map(|vehicle| async move {
            match self
                .check_availability(agency_id, vehicle.id, period)
                .await
            {
                Ok(true) => Some(vehicle),
                Ok(false) => None,
                Err(e) => {
                    log::warn!("⚠️ Check de disponibilidad falló para {}: {}", vehicle.id, e);
                    None
                }
            }
        });

        Ok(join_all(checks).await.into_iter().flatten().collect())
    }
}
