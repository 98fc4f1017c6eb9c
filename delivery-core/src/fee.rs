use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{
    model::{City, FEE_FORBIDDEN, FEE_NO_DATA, Observation, VehicleType},
    store::WeatherStore,
};

/// Weather adjustment produced by a single rule.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Adjustment {
    /// The vehicle type is not subject to this rule.
    Exempt,
    Amount(Decimal),
    Reject,
}

/// Calculates delivery fees from city, vehicle type and weather conditions.
///
/// Pure apart from one read through the [`WeatherStore`]; safe to call
/// concurrently from independent callers.
pub struct FeeCalculator {
    store: Arc<dyn WeatherStore>,
}

impl FeeCalculator {
    pub fn new(store: Arc<dyn WeatherStore>) -> Self {
        Self { store }
    }

    /// Calculate the total delivery fee for `city` and `vehicle`.
    ///
    /// With `when` set, the observation closest at-or-before that time is
    /// used; [`FEE_NO_DATA`] is returned when none exists. Without it, the
    /// latest observation for the city's station is used. Any negative
    /// return value is a rejection code, not an amount; store failures
    /// surface as `Err`.
    pub async fn calculate(
        &self,
        city: City,
        vehicle: VehicleType,
        when: Option<DateTime<Utc>>,
    ) -> Result<Decimal> {
        let observation = match when {
            Some(cutoff) => {
                match self.store.closest_at_or_before(city.as_str(), cutoff).await? {
                    Some(observation) => observation,
                    None => return Ok(FEE_NO_DATA),
                }
            }
            None => match self.store.latest(city.as_str()).await? {
                Some(observation) => observation,
                None => return Ok(FEE_FORBIDDEN),
            },
        };

        match extra_fee(vehicle, &observation) {
            Some(extra) => Ok(base_fee(city, vehicle) + extra),
            None => Ok(FEE_FORBIDDEN),
        }
    }
}

/// Sum the weather adjustments, or `None` when any rule rejects.
fn extra_fee(vehicle: VehicleType, observation: &Observation) -> Option<Decimal> {
    let components = [
        wind_speed_fee(vehicle, observation.wind_speed),
        phenomenon_fee(vehicle, &observation.phenomenon),
        temperature_fee(vehicle, observation.temperature),
    ];

    let mut sum = Decimal::ZERO;
    for component in components {
        match component {
            Adjustment::Reject => return None,
            Adjustment::Amount(amount) => sum += amount,
            Adjustment::Exempt => {}
        }
    }
    Some(sum)
}

/// Fixed regional base fee per city and vehicle type.
fn base_fee(city: City, vehicle: VehicleType) -> Decimal {
    match (city, vehicle) {
        (City::Tallinn, VehicleType::Car) => dec!(4),
        (City::Tallinn, VehicleType::Scooter) => dec!(3.5),
        (City::Tallinn, VehicleType::Bike) => dec!(3),
        (City::Tartu, VehicleType::Car) => dec!(3.5),
        (City::Tartu, VehicleType::Scooter) => dec!(3),
        (City::Tartu, VehicleType::Bike) => dec!(2.5),
        (City::Parnu, VehicleType::Car) => dec!(3),
        (City::Parnu, VehicleType::Scooter) => dec!(2.5),
        (City::Parnu, VehicleType::Bike) => dec!(2),
    }
}

fn wind_speed_fee(vehicle: VehicleType, wind_speed: f64) -> Adjustment {
    if vehicle != VehicleType::Bike {
        return Adjustment::Exempt;
    }
    if wind_speed > 20.0 {
        Adjustment::Reject
    } else if wind_speed >= 10.0 {
        Adjustment::Amount(dec!(0.5))
    } else {
        Adjustment::Amount(Decimal::ZERO)
    }
}

fn phenomenon_fee(vehicle: VehicleType, phenomenon: &str) -> Adjustment {
    if vehicle == VehicleType::Car {
        return Adjustment::Exempt;
    }
    let lower = phenomenon.to_lowercase();
    if lower.contains("snow") || lower.contains("sleet") {
        Adjustment::Amount(dec!(1))
    } else if lower.contains("rain") {
        Adjustment::Amount(dec!(0.5))
    } else if lower == "glaze" || lower == "hail" || lower == "thunder" {
        Adjustment::Reject
    } else {
        Adjustment::Amount(Decimal::ZERO)
    }
}

fn temperature_fee(vehicle: VehicleType, temperature: f64) -> Adjustment {
    if vehicle == VehicleType::Car {
        return Adjustment::Exempt;
    }
    if temperature < -10.0 {
        Adjustment::Amount(dec!(1))
    } else if temperature <= 0.0 {
        Adjustment::Amount(dec!(0.5))
    } else {
        Adjustment::Amount(Decimal::ZERO)
    }
}
