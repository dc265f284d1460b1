//! Routes
//!
//! Wiring del router de la API del gateway.

pub mod workflow_routes;
