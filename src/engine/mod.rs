//! Derived-alert engine.
//!
//! [`AlertEngine`] owns all per-device state and turns position samples into
//! deduplicated [`AlertEvent`]s:
//!
//! sample -> [`tracker`] -> [`attributes`] -> [`rules`] -> [`gate`] -> [`sink`]
//!
//! It is a plain synchronous struct; the caller serialises access (one task
//! drives it), so no locking is involved.

pub mod attributes;
pub mod fuel;
pub mod gate;
pub mod rules;
pub mod sink;
pub mod tracker;

#[cfg(test)]
mod tests;

use crate::models::{AlertEvent, Device, Sample};
use attributes::AttributeResolver;
use chrono::{DateTime, Utc};
use fuel::FuelModel;
use gate::{Cooldowns, DedupGate};
use rules::{OfflineRule, ProtocolEventTable, RuleContext, RuleEvaluator, Thresholds};
use sink::{AlertFilter, AlertSink, AlertSummary};
use std::collections::HashMap;
use tracker::StateTracker;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub thresholds: Thresholds,
    pub fuel: FuelModel,
    pub cooldowns: Cooldowns,
    pub protocol_events: ProtocolEventTable,
    /// Maximum alerts kept in the sink.
    pub retention: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            fuel: FuelModel::default(),
            cooldowns: Cooldowns::default(),
            protocol_events: ProtocolEventTable::default(),
            retention: sink::DEFAULT_RETENTION,
        }
    }
}

pub struct AlertEngine {
    tracker: StateTracker,
    resolver: AttributeResolver,
    evaluator: RuleEvaluator,
    offline: OfflineRule,
    gate: DedupGate,
    sink: AlertSink,
    device_names: HashMap<String, String>,
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl AlertEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            tracker: StateTracker::new(),
            resolver: AttributeResolver::new(config.fuel),
            evaluator: RuleEvaluator::with_defaults(&config.thresholds, config.protocol_events),
            offline: OfflineRule {
                after: config.thresholds.offline_after,
            },
            gate: DedupGate::new(config.cooldowns),
            sink: AlertSink::new(config.retention),
            device_names: HashMap::new(),
        }
    }

    /// Records display names used in alert messages and starts liveness
    /// tracking, so a listed device that never reports still goes offline.
    pub fn register_devices(&mut self, devices: &[Device]) {
        self.register_devices_at(devices, Utc::now());
    }

    /// As [`register_devices`](Self::register_devices), with `now` used as
    /// the liveness start for devices that carry no `last_update`.
    pub fn register_devices_at(&mut self, devices: &[Device], now: DateTime<Utc>) {
        for device in devices {
            self.device_names
                .insert(device.id.clone(), device.name.clone());
            match device.last_update {
                Some(at) => self.tracker.note_reported(&device.id, at),
                None => self.tracker.seed_liveness(&device.id, now),
            }
        }
    }

    pub fn device_name<'a>(&'a self, device_id: &'a str) -> &'a str {
        self.device_names
            .get(device_id)
            .map(String::as_str)
            .unwrap_or(device_id)
    }

    /// Runs every rule for one sample. Returns the alerts admitted to the sink.
    pub fn process(&mut self, sample: Sample) -> Vec<AlertEvent> {
        let device_id = sample.device_id.clone();
        let previous = self.tracker.update(&device_id, &sample);
        let state = self.tracker.state_mut(&device_id);
        let position_changed = DedupGate::mark_position(state, &sample);
        let telemetry = self.resolver.resolve(&sample, state);
        let device_name = self
            .device_names
            .get(&device_id)
            .map(String::as_str)
            .unwrap_or(device_id.as_str());

        let candidates = {
            let ctx = RuleContext {
                device_id: &device_id,
                device_name,
                sample: &sample,
                previous: previous.as_ref(),
                state: &*state,
                telemetry: &telemetry,
                position_changed,
            };
            self.evaluator.evaluate(&ctx)
        };
        if !candidates.is_empty() {
            debug!(
                device_id = %device_id,
                count = candidates.len(),
                "Rules fired"
            );
        }

        let mut admitted = Vec::new();
        for candidate in candidates {
            if let Some(event) = self.gate.admit(candidate, state) {
                store(&mut self.sink, &event);
                admitted.push(event);
            }
        }
        admitted
    }

    /// Processes a batch in timestamp order.
    pub fn process_batch(&mut self, mut samples: Vec<Sample>) -> Vec<AlertEvent> {
        samples.sort_by_key(|s| s.timestamp);
        samples
            .into_iter()
            .flat_map(|sample| self.process(sample))
            .collect()
    }

    /// Feeds historical samples through the rules as if they arrived live.
    pub fn replay(&mut self, history: Vec<Sample>) -> Vec<AlertEvent> {
        info!("Replaying {} historical samples", history.len());
        self.process_batch(history)
    }

    /// Raises `offline` for devices that have been silent too long.
    pub fn check_liveness(&mut self, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let mut admitted = Vec::new();
        for (device_id, state) in self.tracker.iter_mut() {
            let device_name = self
                .device_names
                .get(device_id)
                .map(String::as_str)
                .unwrap_or(device_id.as_str());
            let candidate = self.offline.evaluate(device_id, device_name, state, now);
            if let Some(event) = candidate.and_then(|c| self.gate.admit(c, state)) {
                store(&mut self.sink, &event);
                admitted.push(event);
            }
        }
        admitted
    }

    pub fn acknowledge(&mut self, id: Uuid) -> bool {
        self.sink.acknowledge(id)
    }

    pub fn acknowledge_all(&mut self, filter: &AlertFilter) -> usize {
        self.sink.acknowledge_all(filter)
    }

    pub fn alerts(&self, filter: &AlertFilter) -> Vec<&AlertEvent> {
        self.sink.list(filter)
    }

    pub fn summary(&self) -> AlertSummary {
        self.sink.summary()
    }

    pub fn sink(&self) -> &AlertSink {
        &self.sink
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }
}

fn store(sink: &mut AlertSink, event: &AlertEvent) {
    info!(
        device_id = %event.device_id,
        kind = %event.kind,
        severity = %event.severity,
        "{}",
        event.message
    );
    if let Some(evicted) = sink.add(event.clone()) {
        debug!(alert_id = %evicted.id, "Evicted alert to stay within retention");
    }
}
