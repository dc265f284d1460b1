//! Cálculo de tarificación
//!
//! Función pura: para un período y una tarifa diaria produce el snapshot de
//! precios. Se recalcula en cada cambio de vehículo o de fechas, nunca se
//! cachea. Los montos son TND con 3 decimales.

use lazy_static::lazy_static;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::models::{PricingQuote, RentalPeriod};

lazy_static! {
    /// TVA tunisienne (19%)
    pub static ref TAX_RATE: Decimal = Decimal::new(19, 2);
    /// Timbre fiscal fijo por contrato (1.000 TND)
    pub static ref TIMBRE_FISCAL: Decimal = Decimal::ONE;
    /// Caución por defecto (500.000 TND), puede sobreescribirse por alquiler
    pub static ref DEFAULT_DEPOSIT: Decimal = Decimal::new(500, 0);
}

/// Escala monetaria del sistema (TND, 3 decimales)
pub const MONEY_SCALE: u32 = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PricingError {
    /// El período no cubre ni un día completo; el guard de la etapa 2
    /// debe rechazarlo antes de llegar aquí
    #[error("La période de location doit couvrir au moins un jour")]
    InvalidPeriod { days: i64 },
}

/// Redondeo monetario a 3 decimales, mitades alejándose de cero
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Calcula el snapshot de precios para un período y una tarifa diaria.
///
/// `total_amount` es la suma exacta de las partes ya redondeadas, de modo
/// que `subtotal + tax_amount + timbre_fiscal == total_amount` siempre.
pub fn compute_quote(
    period: &RentalPeriod,
    daily_rate: Decimal,
    deposit_override: Option<Decimal>,
) -> Result<PricingQuote, PricingError> {
    let days = period.days();
    if days <= 0 {
        return Err(PricingError::InvalidPeriod { days });
    }

    let subtotal = round_money(Decimal::from(days) * daily_rate);
    let tax_amount = round_money(subtotal * *TAX_RATE);
    let timbre_fiscal = *TIMBRE_FISCAL;
    let total_amount = subtotal + tax_amount + timbre_fiscal;
    let deposit_amount = deposit_override.unwrap_or(*DEFAULT_DEPOSIT);

    Ok(PricingQuote {
        days,
        daily_rate,
        subtotal,
        tax_rate: *TAX_RATE,
        tax_amount,
        timbre_fiscal,
        total_amount,
        deposit_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(start: &str, end: &str) -> RentalPeriod {
        RentalPeriod::new(start.parse().unwrap(), end.parse().unwrap())
    }

    #[test]
    fn three_days_at_hundred() {
        let quote = compute_quote(
            &period("2024-01-01", "2024-01-04"),
            Decimal::new(100, 0),
            None,
        )
        .unwrap();

        assert_eq!(quote.days, 3);
        assert_eq!(quote.subtotal, Decimal::new(300, 0));
        assert_eq!(quote.tax_amount, Decimal::new(57_000, 3));
        assert_eq!(quote.timbre_fiscal, Decimal::ONE);
        assert_eq!(quote.total_amount, Decimal::new(358_000, 3));
        assert_eq!(quote.deposit_amount, Decimal::new(500, 0));
    }

    #[test]
    fn quote_is_idempotent() {
        let p = period("2024-03-10", "2024-03-17");
        let rate = Decimal::new(85_500, 3);
        let a = compute_quote(&p, rate, None).unwrap();
        let b = compute_quote(&p, rate, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn total_is_exact_sum_of_rounded_parts() {
        // 7 días a 33.333 → el subtotal y la TVA se redondean por separado
        let quote = compute_quote(
            &period("2024-06-01", "2024-06-08"),
            Decimal::new(33_333, 3),
            None,
        )
        .unwrap();

        assert_eq!(
            quote.total_amount,
            quote.subtotal + quote.tax_amount + quote.timbre_fiscal
        );
        assert!(quote.tax_amount.scale() <= MONEY_SCALE);
    }

    #[test]
    fn rejects_inverted_or_empty_periods() {
        let rate = Decimal::new(100, 0);
        assert_eq!(
            compute_quote(&period("2024-01-04", "2024-01-04"), rate, None),
            Err(PricingError::InvalidPeriod { days: 0 })
        );
        assert_eq!(
            compute_quote(&period("2024-01-04", "2024-01-01"), rate, None),
            Err(PricingError::InvalidPeriod { days: -3 })
        );
    }

    #[test]
    fn deposit_can_be_overridden() {
        let quote = compute_quote(
            &period("2024-01-01", "2024-01-02"),
            Decimal::new(100, 0),
            Some(Decimal::new(750, 0)),
        )
        .unwrap();
        assert_eq!(quote.deposit_amount, Decimal::new(750, 0));
    }
}
