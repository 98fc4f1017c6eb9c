use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Result code for a forbidden vehicle/weather combination (or no current
/// weather data). Any negative fee value is a code, never an amount.
pub const FEE_FORBIDDEN: Decimal = dec!(-1);

/// Result code for "no observation at or before the requested time".
pub const FEE_NO_DATA: Decimal = dec!(-2);

/// One weather reading tied to a station and timestamp.
///
/// Created only by ingestion and never mutated afterwards. The `id` is
/// assigned by the store when the observation is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: u64,
    pub station_name: String,
    pub wmo_code: String,
    pub temperature: f64,
    pub wind_speed: f64,
    pub phenomenon: String,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum City {
    Tallinn,
    Tartu,
    Parnu,
}

impl City {
    pub fn as_str(&self) -> &'static str {
        match self {
            City::Tallinn => "Tallinn",
            City::Tartu => "Tartu",
            City::Parnu => "Pärnu",
        }
    }

    pub const fn all() -> &'static [City] {
        &[City::Tallinn, City::Tartu, City::Parnu]
    }
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for City {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "tallinn" => Ok(City::Tallinn),
            "tartu" => Ok(City::Tartu),
            // ASCII spelling accepted alongside the proper name.
            "pärnu" | "parnu" => Ok(City::Parnu),
            _ => Err(anyhow::anyhow!(
                "Unknown city '{value}'. Supported cities: tallinn, tartu, pärnu."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleType {
    Car,
    Scooter,
    Bike,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "Car",
            VehicleType::Scooter => "Scooter",
            VehicleType::Bike => "Bike",
        }
    }

    pub const fn all() -> &'static [VehicleType] {
        &[VehicleType::Car, VehicleType::Scooter, VehicleType::Bike]
    }
}

impl std::fmt::Display for VehicleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for VehicleType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "car" => Ok(VehicleType::Car),
            "scooter" => Ok(VehicleType::Scooter),
            "bike" => Ok(VehicleType::Bike),
            _ => Err(anyhow::anyhow!(
                "Unknown vehicle type '{value}'. Supported vehicle types: car, scooter, bike."
            )),
        }
    }
}
