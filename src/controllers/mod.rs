//! Controllers
//!
//! Handlers HTTP finos: traducen DTOs a llamadas al orquestador y
//! devuelven la vista refrescada de la sesión.

pub mod workflow_controller;
