//! Modelo de contrato
//!
//! El contrato se redacta del lado del gateway en la etapa 3 (borrador) y
//! solo se envía al backend durante la finalización (split borrador/commit).
//! Los textos por defecto de los artículos y las claves de `special_clauses`
//! son los históricos del sistema, en francés.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Customer, PricingQuote, RentalPeriod, Vehicle};

/// Contrato tal como lo devuelve el backend al crearlo
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: i64,
    pub booking_id: i64,
    #[serde(default)]
    pub status: Option<String>,
}

/// Los seis artículos editables del contrato de alquiler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArticles {
    pub article1: String,
    pub article2: String,
    pub article3: String,
    pub article4: String,
    pub article5: String,
    pub article6: String,
}

impl Default for ContractArticles {
    fn default() -> Self {
        Self {
            article1: "Le locataire s'engage à utiliser le véhicule en bon père de famille et à respecter le code de la route tunisien.".to_string(),
            article2: "Le véhicule ne doit pas sortir du territoire tunisien sans autorisation écrite préalable.".to_string(),
            article3: "Le locataire s'engage à restituer le véhicule au lieu et à l'heure convenus, dans l'état où il l'a reçu.".to_string(),
            article4: "Toute prolongation de location doit être autorisée par le loueur et fera l'objet d'un avenant au présent contrat.".to_string(),
            article5: "Le locataire déclare avoir pris connaissance de l'état du véhicule et accepte celui-ci sans réserve.".to_string(),
            article6: "Une caution est exigée et sera restituée au retour du véhicule en bon état.".to_string(),
        }
    }
}

/// Metadatos estructurados del contrato. Las claves viajan tal cual al
/// backend (payload histórico, snake_case/francés), no se renombran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialClauses {
    pub client_name: String,
    pub client_cin: Option<String>,
    pub client_license: Option<String>,
    pub vehicle_brand: String,
    pub vehicle_model: String,
    pub vehicle_plate: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub montant_location: Decimal,
    pub montant_caution: Decimal,
    pub politique_carburant: String,
    pub kilometrage_initial: i64,
    pub assurance: String,
    pub franchise: String,
    pub timbre_fiscal: Decimal,
}

/// Borrador de contrato armado en la etapa 3, enviado en la finalización
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDraft {
    pub terms_and_conditions: String,
    pub special_clauses: SpecialClauses,
}

impl ContractDraft {
    /// Arma el borrador a partir de las partes resueltas en las etapas 1-2.
    /// Idempotente: con las mismas entradas produce el mismo borrador.
    pub fn assemble(
        customer: &Customer,
        vehicle: &Vehicle,
        period: &RentalPeriod,
        quote: &PricingQuote,
        articles: &ContractArticles,
    ) -> Self {
        let terms_and_conditions = render_terms(articles);

        let special_clauses = SpecialClauses {
            client_name: customer.full_name(),
            client_cin: customer.cin_number.clone(),
            client_license: customer.driver_license.clone(),
            vehicle_brand: vehicle.brand.clone(),
            vehicle_model: vehicle.model.clone(),
            vehicle_plate: vehicle.license_plate.clone(),
            start_date: period.start_date,
            end_date: period.end_date,
            montant_location: quote.total_amount,
            montant_caution: quote.deposit_amount,
            politique_carburant: "Plein à plein".to_string(),
            kilometrage_initial: vehicle.mileage,
            assurance: "Responsabilité Civile incluse".to_string(),
            franchise: "300 DT en cas de dommage".to_string(),
            timbre_fiscal: quote.timbre_fiscal,
        };

        Self {
            terms_and_conditions,
            special_clauses,
        }
    }
}

/// Documento de condiciones generales a partir de los artículos
fn render_terms(articles: &ContractArticles) -> String {
    format!(
        "<h2>CONDITIONS GÉNÉRALES DE LOCATION DE VÉHICULE</h2>\n\
         <p><strong>Contrat établi selon la législation tunisienne</strong></p>\n\n\
         <h3>Article 1 - Usage du véhicule</h3>\n<p>{}</p>\n\n\
         <h3>Article 2 - Territoire d'utilisation</h3>\n<p>{}</p>\n\n\
         <h3>Article 3 - Restitution</h3>\n<p>{}</p>\n\n\
         <h3>Article 4 - Prolongation</h3>\n<p>{}</p>\n\n\
         <h3>Article 5 - État du véhicule</h3>\n<p>{}</p>\n\n\
         <h3>Article 6 - Caution</h3>\n<p>{}</p>\n\n\
         <p style=\"margin-top: 30px;\"><strong>Le locataire déclare avoir pris connaissance de ces conditions et les accepter.</strong></p>",
        articles.article1,
        articles.article2,
        articles.article3,
        articles.article4,
        articles.article5,
        articles.article6,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn sample_customer() -> Customer {
        Customer {
            id: 7,
            first_name: "Amine".to_string(),
            last_name: "Ben Salah".to_string(),
            email: "amine@example.tn".to_string(),
            phone: "+216 20 123 456".to_string(),
            cin_number: Some("09812345".to_string()),
            driver_license: Some("TN-554433".to_string()),
            address: None,
        }
    }

    fn sample_vehicle() -> Vehicle {
        Vehicle {
            id: Uuid::nil(),
            license_plate: "215 TU 4521".to_string(),
            brand: "Peugeot".to_string(),
            model: "208".to_string(),
            year: Some(2022),
            daily_rate: Decimal::new(100, 0),
            status: crate::models::VehicleStatus::Disponible,
            mileage: 45_000,
        }
    }

    fn sample_quote() -> PricingQuote {
        PricingQuote {
            days: 3,
            daily_rate: Decimal::new(100, 0),
            subtotal: Decimal::new(300, 0),
            tax_rate: Decimal::new(19, 2),
            tax_amount: Decimal::new(57_000, 3),
            timbre_fiscal: Decimal::ONE,
            total_amount: Decimal::new(358_000, 3),
            deposit_amount: Decimal::new(500, 0),
        }
    }

    #[test]
    fn assemble_is_deterministic() {
        let customer = sample_customer();
        let vehicle = sample_vehicle();
        let period = RentalPeriod::new(
            "2024-01-01".parse().unwrap(),
            "2024-01-04".parse().unwrap(),
        );
        let quote = sample_quote();
        let articles = ContractArticles::default();

        let a = ContractDraft::assemble(&customer, &vehicle, &period, &quote, &articles);
        let b = ContractDraft::assemble(&customer, &vehicle, &period, &quote, &articles);

        assert_eq!(a.terms_and_conditions, b.terms_and_conditions);
        assert_eq!(a.special_clauses.client_name, "Amine Ben Salah");
        assert_eq!(a.special_clauses.montant_location, quote.total_amount);
        assert_eq!(a.special_clauses.kilometrage_initial, 45_000);
    }

    #[test]
    fn terms_include_custom_articles() {
        let mut articles = ContractArticles::default();
        articles.article2 = "Circulation autorisée uniquement dans le Grand Tunis.".to_string();

        let terms = render_terms(&articles);
        assert!(terms.contains("CONDITIONS GÉNÉRALES DE LOCATION"));
        assert!(terms.contains("Grand Tunis"));
        assert!(terms.contains("Article 6 - Caution"));
    }

    #[test]
    fn special_clauses_keep_historical_keys() {
        let customer = sample_customer();
        let vehicle = sample_vehicle();
        let period = RentalPeriod::new(
            "2024-01-01".parse().unwrap(),
            "2024-01-04".parse().unwrap(),
        );
        let draft = ContractDraft::assemble(
            &customer,
            &vehicle,
            &period,
            &sample_quote(),
            &ContractArticles::default(),
        );

        let json = serde_json::to_value(&draft.special_clauses).unwrap();
        assert!(json.get("montant_location").is_some());
        assert!(json.get("politique_carburant").is_some());
        assert!(json.get("timbre_fiscal").is_some());
        assert_eq!(json["politique_carburant"], "Plein à plein");
    }
}
