//! Modelos del dominio
//!
//! Este módulo contiene los modelos de datos que mapean el contrato REST
//! del backend de alquiler. Las entidades pertenecen al backend; el gateway
//! solo conserva referencias transitorias (ids) entre etapas del workflow.

pub mod booking;
pub mod contract;
pub mod customer;
pub mod payment;
pub mod pricing;
pub mod vehicle;

pub use booking::*;
pub use contract::*;
pub use customer::*;
pub use payment::*;
pub use pricing::*;
pub use vehicle::*;
