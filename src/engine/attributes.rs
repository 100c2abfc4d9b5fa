//! Attribute resolution.
//!
//! Raw sample attributes are normalised once per sample into [`Telemetry`]
//! before any rule runs. Missing or unparseable values resolve to neutral
//! defaults so that absent telemetry never raises an alarm on its own.

use crate::engine::fuel::FuelModel;
use crate::engine::tracker::DeviceRuntimeState;
use crate::models::Sample;

pub const BATTERY_KEYS: [&str; 2] = ["battery", "batteryLevel"];
pub const TEMPERATURE_KEY: &str = "temp1";
pub const PHONE_CALL_KEY: &str = "phoneCall";
pub const DRIVER_KEY: &str = "driverUniqueId";
pub const EVENT_KEYS: [&str; 2] = ["event", "alarm"];
/// Kilometres driven today, when the unit reports it directly.
pub const TODAY_DISTANCE_KEY: &str = "todayDistance";
/// Cumulative odometer in metres.
pub const TOTAL_DISTANCE_KEY: &str = "totalDistance";

pub const DEFAULT_BATTERY_PERCENT: f64 = 100.0;

/// Normalised view of a sample's attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub battery_percent: f64,
    /// True when `battery_percent` came from the sample rather than the default.
    pub battery_reported: bool,
    pub temperature_c: Option<f64>,
    pub phone_call: bool,
    pub driver_id: Option<String>,
    pub event_code: Option<String>,
    pub distance_today_km: Option<f64>,
    pub fuel_litres: f64,
    pub fuel_percent: f64,
}

#[derive(Debug, Clone, Default)]
pub struct AttributeResolver {
    fuel: FuelModel,
}

impl AttributeResolver {
    pub fn new(fuel: FuelModel) -> Self {
        Self { fuel }
    }

    pub fn fuel_model(&self) -> &FuelModel {
        &self.fuel
    }

    pub fn resolve(&self, sample: &Sample, state: &DeviceRuntimeState) -> Telemetry {
        let battery = first_number(sample, &BATTERY_KEYS);

        let distance_today_km = number(sample, TODAY_DISTANCE_KEY)
            .map(|km| km.max(0.0))
            .or_else(|| {
                let total = total_distance_m(sample)?;
                let start = state.odometer_day_start_m?;
                Some(((total - start) / 1000.0).max(0.0))
            });

        let fuel_litres = match distance_today_km {
            Some(km) => self.fuel.remaining_litres(km),
            None => self.fuel.tank_capacity_l,
        };

        Telemetry {
            battery_percent: battery.unwrap_or(DEFAULT_BATTERY_PERCENT),
            battery_reported: battery.is_some(),
            temperature_c: number(sample, TEMPERATURE_KEY),
            phone_call: sample
                .attribute(PHONE_CALL_KEY)
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            driver_id: text(sample, DRIVER_KEY),
            event_code: EVENT_KEYS.iter().find_map(|key| text(sample, key)),
            distance_today_km,
            fuel_litres,
            fuel_percent: self.fuel.percent_of_capacity(fuel_litres),
        }
    }
}

pub fn total_distance_m(sample: &Sample) -> Option<f64> {
    number(sample, TOTAL_DISTANCE_KEY)
}

fn number(sample: &Sample, key: &str) -> Option<f64> {
    sample.attribute(key).and_then(|v| v.as_f64())
}

fn first_number(sample: &Sample, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| number(sample, key))
}

fn text(sample: &Sample, key: &str) -> Option<String> {
    let value = sample.attribute(key)?;
    let s = match value.as_str() {
        Some(s) => s.trim().to_string(),
        None => value.as_f64().map(|n| format!("{n}"))?,
    };
    (!s.is_empty()).then_some(s)
}
