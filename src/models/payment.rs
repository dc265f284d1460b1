//! Modelo de pago
//!
//! Cada finalización registra un pago de alquiler y, si la caución se marcó
//! como pagada, un segundo pago de tipo depósito.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Modos de pago aceptados en mostrador
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Especes,
    Carte,
    Cheque,
    Virement,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Especes => "especes",
            PaymentMethod::Carte => "carte",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Virement => "virement",
        }
    }
}

/// Tipo de pago registrado contra una reserva
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Rental,
    Deposit,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Rental => "rental",
            PaymentType::Deposit => "deposit",
        }
    }
}

/// Nivel de combustible del contador (valores históricos del backend)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuelLevel {
    #[serde(rename = "full")]
    Full,
    #[serde(rename = "3/4")]
    ThreeQuarters,
    #[serde(rename = "half")]
    Half,
    #[serde(rename = "1/4")]
    Quarter,
    #[serde(rename = "empty")]
    Empty,
}

impl FuelLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuelLevel::Full => "full",
            FuelLevel::ThreeQuarters => "3/4",
            FuelLevel::Half => "half",
            FuelLevel::Quarter => "1/4",
            FuelLevel::Empty => "empty",
        }
    }
}

impl Default for FuelLevel {
    fn default() -> Self {
        FuelLevel::Full
    }
}

/// Detalle del pago validado en la etapa 4, consumido en la finalización
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub amount_paid: Decimal,
    pub payment_method: PaymentMethod,
    pub deposit_paid: bool,
    pub deposit_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Confirmación de pago del backend; solo nos interesa que llegó
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
}
