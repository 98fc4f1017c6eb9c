//! Core library for the delivery fee service.
//!
//! This crate defines:
//! - Shared domain models (cities, vehicle types, weather observations)
//! - The fee rule engine
//! - The weather store boundary and an in-memory implementation
//! - Ingestion of the national weather observations feed
//!
//! It is used by `delivery-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod fee;
pub mod ingest;
pub mod model;
pub mod store;

pub use config::Config;
pub use fee::FeeCalculator;
pub use ingest::{Clock, SystemClock, WeatherIngestor};
pub use model::{City, FEE_FORBIDDEN, FEE_NO_DATA, Observation, VehicleType};
pub use store::{MemoryStore, WeatherStore};
