//! Clients - HTTP Clients for External APIs
//!
//! This module contains the HTTP client for communicating with the
//! rental backend API.

pub mod rental_api;

// Re-export main types for convenience
pub use rental_api::{ApiError, RentalApiClient, GENERIC_ERROR_MESSAGE, IDEMPOTENCY_KEY_HEADER};
