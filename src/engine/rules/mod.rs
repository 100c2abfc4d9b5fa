//! Driving-event and telemetry rules.
//!
//! Every rule is an independent predicate over the current sample, the
//! previous sample for the same device and that device's runtime state.
//! Rules never fail: when an input they need is missing they simply do not
//! fire. Cooldown and dedup are the gate's job, not the rules'.

pub mod cornering;
pub mod offline;
pub mod protocol;
pub mod speed;
pub mod stop;
pub mod telemetry;

use crate::engine::attributes::Telemetry;
use crate::engine::tracker::DeviceRuntimeState;
use crate::models::{AlertKind, Sample, Severity};
use chrono::{DateTime, Duration, Utc};

pub use cornering::{course_delta, turn_direction, HarshCorneringRule, TurnDirection};
pub use offline::OfflineRule;
pub use protocol::{ProtocolEventRule, ProtocolEventTable};
pub use speed::{HarshAccelerationRule, HarshBrakingRule, OverspeedRule};
pub use stop::DriverMissingRule;
pub use telemetry::{HighTemperatureRule, LowBatteryRule, LowFuelRule, PhoneCallRule};

/// Which overspeed limit applies. The general fleet view and the
/// protocol-specific view historically disagree (20 vs 60 km/h).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RuleProfile {
    #[default]
    General,
    Protocol,
}

impl std::str::FromStr for RuleProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" => Ok(Self::General),
            "protocol" => Ok(Self::Protocol),
            _ => Err(format!("unknown rule profile: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub speed_limit_kmh: f64,
    pub low_fuel_percent: f64,
    pub low_battery_percent: f64,
    pub harsh_braking_kmh: f64,
    pub harsh_acceleration_kmh: f64,
    pub harsh_cornering_deg: f64,
    pub cornering_min_speed_kmh: f64,
    pub driver_missing_after: Duration,
    pub high_temperature_c: f64,
    pub offline_after: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::for_profile(RuleProfile::General)
    }
}

impl Thresholds {
    pub fn for_profile(profile: RuleProfile) -> Self {
        let speed_limit_kmh = match profile {
            RuleProfile::General => 20.0,
            RuleProfile::Protocol => 60.0,
        };
        Self {
            speed_limit_kmh,
            low_fuel_percent: 20.0,
            low_battery_percent: 30.0,
            harsh_braking_kmh: 10.0,
            harsh_acceleration_kmh: 20.0,
            harsh_cornering_deg: 45.0,
            cornering_min_speed_kmh: 5.0,
            driver_missing_after: Duration::minutes(2),
            high_temperature_c: 50.0,
            offline_after: Duration::minutes(10),
        }
    }
}

/// Everything a rule may look at for one sample.
pub struct RuleContext<'a> {
    pub device_id: &'a str,
    pub device_name: &'a str,
    pub sample: &'a Sample,
    pub previous: Option<&'a Sample>,
    pub state: &'a DeviceRuntimeState,
    pub telemetry: &'a Telemetry,
    /// False when this sample id was already evaluated for protocol events.
    pub position_changed: bool,
}

/// A rule firing, before dedup and cooldown.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCandidate {
    pub device_id: String,
    pub device_name: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub value: Option<f64>,
    pub threshold: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl AlertCandidate {
    /// Candidate positioned at the context's current sample.
    pub fn at_sample(
        ctx: &RuleContext<'_>,
        kind: AlertKind,
        severity: Severity,
        message: String,
    ) -> Self {
        Self {
            device_id: ctx.device_id.to_string(),
            device_name: ctx.device_name.to_string(),
            kind,
            severity,
            message,
            value: None,
            threshold: None,
            timestamp: ctx.sample.timestamp,
            latitude: Some(ctx.sample.latitude),
            longitude: Some(ctx.sample.longitude),
        }
    }

    pub fn with_measure(mut self, value: f64, threshold: f64) -> Self {
        self.value = Some(value);
        self.threshold = Some(threshold);
        self
    }
}

pub trait Rule: Send + Sync {
    fn kind(&self) -> AlertKind;

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<AlertCandidate>;
}

pub struct RuleEvaluator {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleEvaluator {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// The full per-sample rule set. Offline is not included: it is driven
    /// by the liveness sweep, not by samples.
    pub fn with_defaults(thresholds: &Thresholds, events: ProtocolEventTable) -> Self {
        Self::new(vec![
            Box::new(OverspeedRule {
                limit_kmh: thresholds.speed_limit_kmh,
            }),
            Box::new(LowFuelRule {
                min_percent: thresholds.low_fuel_percent,
            }),
            Box::new(LowBatteryRule {
                min_percent: thresholds.low_battery_percent,
            }),
            Box::new(HarshBrakingRule {
                max_drop_kmh: thresholds.harsh_braking_kmh,
            }),
            Box::new(HarshAccelerationRule {
                max_gain_kmh: thresholds.harsh_acceleration_kmh,
            }),
            Box::new(HarshCorneringRule {
                max_delta_deg: thresholds.harsh_cornering_deg,
                min_speed_kmh: thresholds.cornering_min_speed_kmh,
            }),
            Box::new(DriverMissingRule {
                after: thresholds.driver_missing_after,
            }),
            Box::new(HighTemperatureRule {
                max_c: thresholds.high_temperature_c,
            }),
            Box::new(PhoneCallRule),
            Box::new(ProtocolEventRule::new(events)),
        ])
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<AlertCandidate> {
        self.rules.iter().filter_map(|rule| rule.evaluate(ctx)).collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::engine::attributes::AttributeResolver;
    use chrono::TimeZone;

    pub fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    pub fn sample(secs: i64, speed: f64) -> Sample {
        Sample::new("dev-1", at(secs), 20.6525, -100.3914).with_speed(speed)
    }

    /// Runs `rule` against `current` with an optional previous sample.
    pub fn run(
        rule: &dyn Rule,
        current: &Sample,
        previous: Option<&Sample>,
        state: &DeviceRuntimeState,
    ) -> Option<AlertCandidate> {
        let telemetry = AttributeResolver::default().resolve(current, state);
        let ctx = RuleContext {
            device_id: &current.device_id,
            device_name: "Unit 1",
            sample: current,
            previous,
            state,
            telemetry: &telemetry,
            position_changed: true,
        };
        rule.evaluate(&ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::engine::attributes::AttributeResolver;

    #[test]
    fn profiles_differ_only_in_speed_limit() {
        let general = Thresholds::for_profile(RuleProfile::General);
        let protocol = Thresholds::for_profile(RuleProfile::Protocol);
        assert_eq!(general.speed_limit_kmh, 20.0);
        assert_eq!(protocol.speed_limit_kmh, 60.0);
        assert_eq!(
            Thresholds {
                speed_limit_kmh: 60.0,
                ..general
            },
            protocol
        );
    }

    #[test]
    fn multiple_rules_fire_from_one_sample() {
        let evaluator = RuleEvaluator::with_defaults(&Thresholds::default(), ProtocolEventTable::default());
        let prev = sample(0, 10.0);
        let current = sample(5, 45.0)
            .with_attribute("phoneCall", true)
            .with_attribute("battery", 12.0);
        let state = DeviceRuntimeState::default();
        let telemetry = AttributeResolver::default().resolve(&current, &state);
        let ctx = RuleContext {
            device_id: "dev-1",
            device_name: "Unit 1",
            sample: &current,
            previous: Some(&prev),
            state: &state,
            telemetry: &telemetry,
            position_changed: true,
        };
        let mut kinds: Vec<_> = evaluator.evaluate(&ctx).into_iter().map(|c| c.kind).collect();
        kinds.sort();
        assert_eq!(
            kinds,
            vec![
                AlertKind::Overspeed,
                AlertKind::LowBattery,
                AlertKind::HarshAcceleration,
                AlertKind::PhoneCall,
            ]
        );
    }

    #[test]
    fn quiet_sample_fires_nothing() {
        let evaluator = RuleEvaluator::with_defaults(&Thresholds::default(), ProtocolEventTable::default());
        let prev = sample(0, 12.0);
        let current = sample(5, 15.0);
        let state = DeviceRuntimeState::default();
        let telemetry = AttributeResolver::default().resolve(&current, &state);
        let ctx = RuleContext {
            device_id: "dev-1",
            device_name: "Unit 1",
            sample: &current,
            previous: Some(&prev),
            state: &state,
            telemetry: &telemetry,
            position_changed: true,
        };
        assert!(evaluator.evaluate(&ctx).is_empty());
        assert_eq!(evaluator.rules().len(), 10);
    }
}
