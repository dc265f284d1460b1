//! Snapshot de tarificación
//!
//! Derivado, nunca persistido por el gateway: se recalcula cada vez que
//! cambian el vehículo o las fechas. Invariante: `total_amount` es la suma
//! exacta de `subtotal + tax_amount + timbre_fiscal` ya redondeados.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Desglose de precios de un alquiler (montos en TND, 3 decimales)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingQuote {
    pub days: i64,
    pub daily_rate: Decimal,
    pub subtotal: Decimal,
    /// Tasa de TVA aplicada (0.19)
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    /// Timbre fiscal fijo por contrato
    pub timbre_fiscal: Decimal,
    pub total_amount: Decimal,
    pub deposit_amount: Decimal,
}
