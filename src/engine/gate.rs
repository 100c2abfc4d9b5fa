use crate::engine::rules::AlertCandidate;
use crate::engine::tracker::DeviceRuntimeState;
use crate::models::{AlertEvent, AlertKind, Sample};
use chrono::Duration;
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

pub const DEFAULT_SEEN_CAPACITY: usize = 10_000;

/// Per-rule cooldown windows.
#[derive(Debug, Clone, PartialEq)]
pub struct Cooldowns {
    by_kind: HashMap<AlertKind, Duration>,
}

impl Default for Cooldowns {
    fn default() -> Self {
        let by_kind = AlertKind::ALL
            .into_iter()
            .map(|kind| {
                let secs = match kind {
                    AlertKind::HarshBraking
                    | AlertKind::HarshAcceleration
                    | AlertKind::HarshCornering
                    | AlertKind::PhoneCall
                    | AlertKind::ProtocolEvent => 30,
                    AlertKind::Overspeed
                    | AlertKind::LowFuel
                    | AlertKind::LowBattery
                    | AlertKind::DriverMissing
                    | AlertKind::Offline
                    | AlertKind::HighTemperature => 60,
                };
                (kind, Duration::seconds(secs))
            })
            .collect();
        Self { by_kind }
    }
}

impl Cooldowns {
    /// Same window for every rule.
    pub fn uniform(window: Duration) -> Self {
        Self {
            by_kind: AlertKind::ALL.into_iter().map(|kind| (kind, window)).collect(),
        }
    }

    pub fn with(mut self, kind: AlertKind, window: Duration) -> Self {
        self.by_kind.insert(kind, window);
        self
    }

    pub fn get(&self, kind: AlertKind) -> Duration {
        self.by_kind.get(&kind).copied().unwrap_or_else(Duration::zero)
    }
}

/// Drops repeated and too-frequent candidates before they reach the sink.
pub struct DedupGate {
    cooldowns: Cooldowns,
    seen: HashSet<Uuid>,
    seen_order: VecDeque<Uuid>,
    seen_capacity: usize,
}

impl DedupGate {
    pub fn new(cooldowns: Cooldowns) -> Self {
        Self::with_capacity(cooldowns, DEFAULT_SEEN_CAPACITY)
    }

    pub fn with_capacity(cooldowns: Cooldowns, seen_capacity: usize) -> Self {
        Self {
            cooldowns,
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            seen_capacity: seen_capacity.max(1),
        }
    }

    pub fn cooldowns(&self) -> &Cooldowns {
        &self.cooldowns
    }

    /// Admits `candidate` or returns `None` when it is a duplicate or still
    /// inside its rule's cooldown. Timestamps that go backwards relative to
    /// the last admitted alert count as inside the cooldown.
    pub fn admit(
        &mut self,
        candidate: AlertCandidate,
        state: &mut DeviceRuntimeState,
    ) -> Option<AlertEvent> {
        let id = AlertEvent::derive_id(&candidate.device_id, candidate.kind, candidate.timestamp);
        if self.seen.contains(&id) {
            tracing::debug!(
                device_id = %candidate.device_id,
                kind = %candidate.kind,
                "Alert dropped (duplicate id)"
            );
            return None;
        }

        let cooldown = self.cooldowns.get(candidate.kind);
        let cooling = state
            .last_alert_at_by_rule
            .get(&candidate.kind)
            .is_some_and(|last| candidate.timestamp - *last < cooldown);
        if cooling {
            tracing::debug!(
                device_id = %candidate.device_id,
                kind = %candidate.kind,
                "Alert suppressed (cooldown)"
            );
            return None;
        }

        self.remember(id);
        state
            .last_alert_at_by_rule
            .insert(candidate.kind, candidate.timestamp);
        match candidate.kind {
            AlertKind::DriverMissing => state.driver_missing_reported = true,
            AlertKind::Offline => state.offline_reported = true,
            _ => {}
        }

        Some(AlertEvent {
            id,
            device_id: candidate.device_id,
            device_name: candidate.device_name,
            kind: candidate.kind,
            severity: candidate.severity,
            message: candidate.message,
            value: candidate.value,
            threshold: candidate.threshold,
            timestamp: candidate.timestamp,
            latitude: candidate.latitude,
            longitude: candidate.longitude,
            acknowledged: false,
            acknowledged_at: None,
        })
    }

    /// Records `sample` as processed for protocol events and reports whether
    /// it is a new position. Samples without an upstream id always count as new.
    pub fn mark_position(state: &mut DeviceRuntimeState, sample: &Sample) -> bool {
        match sample.id {
            Some(id) if state.last_protocol_position == Some(id) => false,
            Some(id) => {
                state.last_protocol_position = Some(id);
                true
            }
            None => true,
        }
    }

    fn remember(&mut self, id: Uuid) {
        if self.seen_order.len() >= self.seen_capacity {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(id);
        self.seen_order.push_back(id);
    }
}
