//! Middleware del sistema
//!
//! Este módulo contiene el middleware de CORS del gateway.

pub mod cors;

pub use cors::*;
