use crate::engine::attributes::total_distance_m;
use crate::models::{AlertKind, Sample};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;

/// Derived, mutable state for one device.
#[derive(Debug, Clone, Default)]
pub struct DeviceRuntimeState {
    pub last_sample: Option<Sample>,
    /// Timestamp of the first zero-speed sample of the current stop.
    pub stop_started_at: Option<DateTime<Utc>>,
    /// Cooldown bookkeeping, maintained by the gate.
    pub last_alert_at_by_rule: HashMap<AlertKind, DateTime<Utc>>,
    pub driver_missing_reported: bool,
    pub offline_reported: bool,
    pub odometer_day: Option<NaiveDate>,
    pub odometer_day_start_m: Option<f64>,
    pub last_protocol_position: Option<i64>,
    /// Liveness evidence from the device list (`lastUpdate`, or when the
    /// device was first registered) for devices not heard from directly.
    pub reported_at: Option<DateTime<Utc>>,
}

impl DeviceRuntimeState {
    pub fn stopped_for(&self, at: DateTime<Utc>) -> Option<Duration> {
        self.stop_started_at.map(|start| at - start)
    }

    /// Latest moment the device is known to have been alive.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        let sampled = self.last_sample.as_ref().map(|s| s.timestamp);
        sampled.max(self.reported_at)
    }
}

/// Holds at most one [`DeviceRuntimeState`] per device.
#[derive(Debug, Default)]
pub struct StateTracker {
    devices: HashMap<String, DeviceRuntimeState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `sample` as the device's latest and returns the one it replaces.
    ///
    /// Samples no newer than the current latest (redeliveries, late arrivals)
    /// leave the state untouched and return `None`.
    pub fn update(&mut self, device_id: &str, sample: &Sample) -> Option<Sample> {
        let state = self.state_mut(device_id);

        let newest = state.last_sample.as_ref().map(|s| s.timestamp);
        if newest.is_some_and(|t| sample.timestamp <= t) {
            return None;
        }
        if state.last_seen().map_or(true, |t| sample.timestamp > t) {
            state.offline_reported = false;
        }

        if sample.is_stopped() {
            if state.stop_started_at.is_none() {
                state.stop_started_at = Some(sample.timestamp);
            }
        } else {
            state.stop_started_at = None;
            state.driver_missing_reported = false;
        }

        if let Some(total) = total_distance_m(sample) {
            let day = sample.timestamp.date_naive();
            if state.odometer_day != Some(day) || state.odometer_day_start_m.is_none() {
                state.odometer_day = Some(day);
                state.odometer_day_start_m = Some(total);
            }
        }

        std::mem::replace(&mut state.last_sample, Some(sample.clone()))
    }

    /// Records liveness reported by the platform rather than by a sample.
    /// Re-arms the offline alert only when `at` is newer than anything seen.
    pub fn note_reported(&mut self, device_id: &str, at: DateTime<Utc>) {
        let state = self.state_mut(device_id);
        if state.last_seen().map_or(true, |t| at > t) {
            state.reported_at = Some(at);
            state.offline_reported = false;
        }
    }

    /// Starts the liveness clock for a device with no evidence at all.
    pub fn seed_liveness(&mut self, device_id: &str, at: DateTime<Utc>) {
        let state = self.state_mut(device_id);
        if state.last_seen().is_none() {
            state.reported_at = Some(at);
        }
    }

    pub fn state(&self, device_id: &str) -> Option<&DeviceRuntimeState> {
        self.devices.get(device_id)
    }

    pub fn state_mut(&mut self, device_id: &str) -> &mut DeviceRuntimeState {
        self.devices.entry(device_id.to_string()).or_default()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut DeviceRuntimeState)> {
        self.devices.iter_mut()
    }

    pub fn known_devices(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn forget(&mut self, device_id: &str) -> Option<DeviceRuntimeState> {
        self.devices.remove(device_id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
