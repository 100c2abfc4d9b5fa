use super::{AlertCandidate, Rule, RuleContext};
use crate::models::{AlertKind, Severity};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolEvent {
    pub label: String,
    pub severity: Severity,
}

/// Device-reported event codes that raise an alert, keyed by a normalised
/// code so that `powerCut`, `Power Cut` and `power_cut` all match.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolEventTable {
    entries: HashMap<String, ProtocolEvent>,
}

impl Default for ProtocolEventTable {
    fn default() -> Self {
        Self::empty()
            .with_entry("sos", "SOS / panic button", Severity::Critical)
            .with_entry("accident", "Accident detected", Severity::Critical)
            .with_entry("powerCut", "Power cut", Severity::High)
            .with_entry("jamming", "GPS/GSM jamming", Severity::High)
            .with_entry("tampering", "Device tampering", Severity::High)
            .with_entry("tow", "Vehicle towed", Severity::High)
            .with_entry("lowBattery", "Low backup battery", Severity::Medium)
            .with_entry("powerRestored", "Power restored", Severity::Low)
            .with_entry("vibration", "Vibration", Severity::Low)
            .with_entry("door", "Door opened", Severity::Low)
            .with_entry("geofenceEnter", "Geofence entered", Severity::Low)
            .with_entry("geofenceExit", "Geofence exited", Severity::Low)
    }
}

impl ProtocolEventTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn with_entry(mut self, code: &str, label: &str, severity: Severity) -> Self {
        self.insert(code, label, severity);
        self
    }

    pub fn insert(&mut self, code: &str, label: &str, severity: Severity) {
        self.entries.insert(
            normalize_code(code),
            ProtocolEvent {
                label: label.to_string(),
                severity,
            },
        );
    }

    pub fn lookup(&self, code: &str) -> Option<&ProtocolEvent> {
        self.entries.get(&normalize_code(code))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub struct ProtocolEventRule {
    table: ProtocolEventTable,
}

impl ProtocolEventRule {
    pub fn new(table: ProtocolEventTable) -> Self {
        Self { table }
    }
}

impl Rule for ProtocolEventRule {
    fn kind(&self) -> AlertKind {
        AlertKind::ProtocolEvent
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        if !ctx.position_changed {
            return None;
        }
        let code = ctx.telemetry.event_code.as_deref()?;
        let event = self.table.lookup(code)?;
        let message = format!("{} reported on {} (code '{}')", event.label, ctx.device_name, code);
        Some(AlertCandidate::at_sample(ctx, self.kind(), event.severity, message))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::engine::attributes::AttributeResolver;
    use crate::engine::tracker::DeviceRuntimeState;

    #[test]
    fn codes_match_regardless_of_spelling() {
        let table = ProtocolEventTable::default();
        assert_eq!(table.lookup("Power Cut").unwrap().severity, Severity::High);
        assert_eq!(table.lookup("power_cut").unwrap().severity, Severity::High);
        assert_eq!(table.lookup("SOS").unwrap().severity, Severity::Critical);
        assert!(table.lookup("ignitionOn").is_none());
    }

    #[test]
    fn severity_comes_from_table() {
        let rule = ProtocolEventRule::new(ProtocolEventTable::default());
        let state = DeviceRuntimeState::default();
        let s = sample(0, 0.0).with_attribute("alarm", "Jamming");
        let candidate = run(&rule, &s, None, &state).unwrap();
        assert_eq!(candidate.kind, AlertKind::ProtocolEvent);
        assert_eq!(candidate.severity, Severity::High);
        assert!(candidate.message.contains("Jamming"));

        assert!(run(&rule, &sample(0, 0.0).with_attribute("event", "deviceMoving"), None, &state).is_none());
    }

    #[test]
    fn custom_entries_extend_the_table() {
        let table = ProtocolEventTable::empty().with_entry("fatigueDriving", "Driver fatigue", Severity::High);
        assert_eq!(table.len(), 1);
        let rule = ProtocolEventRule::new(table);
        let s = sample(0, 50.0).with_attribute("event", "fatigue_driving");
        assert!(run(&rule, &s, None, &DeviceRuntimeState::default()).is_some());
    }

    #[test]
    fn repeated_position_is_not_reevaluated() {
        let rule = ProtocolEventRule::new(ProtocolEventTable::default());
        let state = DeviceRuntimeState::default();
        let s = sample(0, 0.0).with_id(42).with_attribute("event", "sos");
        let telemetry = AttributeResolver::default().resolve(&s, &state);
        let ctx = RuleContext {
            device_id: "dev-1",
            device_name: "Unit 1",
            sample: &s,
            previous: None,
            state: &state,
            telemetry: &telemetry,
            position_changed: false,
        };
        assert!(rule.evaluate(&ctx).is_none());
    }
}
