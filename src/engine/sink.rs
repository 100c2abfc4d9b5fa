use crate::models::{AlertEvent, AlertKind, Severity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet, VecDeque};
use uuid::Uuid;

pub const DEFAULT_RETENTION: usize = 1_000;

/// Selection over stored alerts. `None` on a field means "any".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertFilter {
    pub severities: Option<HashSet<Severity>>,
    pub kinds: Option<HashSet<AlertKind>>,
    pub acknowledged: Option<bool>,
    pub device_id: Option<String>,
}

impl AlertFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severities.get_or_insert_with(HashSet::new).insert(severity);
        self
    }

    pub fn kind(mut self, kind: AlertKind) -> Self {
        self.kinds.get_or_insert_with(HashSet::new).insert(kind);
        self
    }

    pub fn acknowledged(mut self, acknowledged: bool) -> Self {
        self.acknowledged = Some(acknowledged);
        self
    }

    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn matches(&self, event: &AlertEvent) -> bool {
        self.severities
            .as_ref()
            .map_or(true, |set| set.contains(&event.severity))
            && self.kinds.as_ref().map_or(true, |set| set.contains(&event.kind))
            && self.acknowledged.map_or(true, |ack| event.acknowledged == ack)
            && self
                .device_id
                .as_deref()
                .map_or(true, |id| event.device_id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    pub total: usize,
    pub unacknowledged: usize,
    pub by_severity: BTreeMap<Severity, usize>,
}

/// In-memory, append-only alert store for the session.
///
/// Bounded by `capacity`: when full, the oldest acknowledged alert is
/// evicted first, otherwise the oldest alert.
#[derive(Debug)]
pub struct AlertSink {
    events: VecDeque<AlertEvent>,
    capacity: usize,
}

impl Default for AlertSink {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl AlertSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Appends `event`, returning whatever had to be evicted to make room.
    pub fn add(&mut self, event: AlertEvent) -> Option<AlertEvent> {
        let evicted = if self.events.len() >= self.capacity {
            let victim = self
                .events
                .iter()
                .position(|e| e.acknowledged)
                .unwrap_or(0);
            self.events.remove(victim)
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    /// Idempotent. Returns false only if no alert has this id.
    pub fn acknowledge(&mut self, id: Uuid) -> bool {
        self.acknowledge_at(id, Utc::now())
    }

    pub fn acknowledge_at(&mut self, id: Uuid, at: DateTime<Utc>) -> bool {
        match self.events.iter_mut().find(|e| e.id == id) {
            Some(event) => {
                event.acknowledge(at);
                true
            }
            None => false,
        }
    }

    /// Acknowledges every matching alert; returns how many changed.
    pub fn acknowledge_all(&mut self, filter: &AlertFilter) -> usize {
        let now = Utc::now();
        let mut changed = 0;
        for event in self.events.iter_mut() {
            if filter.matches(event) && event.acknowledge(now) {
                changed += 1;
            }
        }
        changed
    }

    pub fn get(&self, id: Uuid) -> Option<&AlertEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    /// Matching alerts, oldest first.
    pub fn list(&self, filter: &AlertFilter) -> Vec<&AlertEvent> {
        self.events.iter().filter(|e| filter.matches(e)).collect()
    }

    pub fn summary(&self) -> AlertSummary {
        let mut summary = AlertSummary::default();
        for event in &self.events {
            summary.total += 1;
            if !event.acknowledged {
                summary.unacknowledged += 1;
            }
            *summary.by_severity.entry(event.severity).or_insert(0) += 1;
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
