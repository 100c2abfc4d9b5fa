use super::{AlertCandidate, Rule, RuleContext};
use crate::models::{AlertKind, Severity};

/// Compares the derived fuel level, not a raw sensor attribute.
pub struct LowFuelRule {
    pub min_percent: f64,
}

impl Rule for LowFuelRule {
    fn kind(&self) -> AlertKind {
        AlertKind::LowFuel
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        let t = ctx.telemetry;
        if t.fuel_percent >= self.min_percent {
            return None;
        }
        let message = format!(
            "Low fuel on {}: {:.0} L left ({:.1}%), below {:.0}%",
            ctx.device_name, t.fuel_litres, t.fuel_percent, self.min_percent
        );
        Some(
            AlertCandidate::at_sample(ctx, self.kind(), Severity::Medium, message)
                .with_measure(t.fuel_percent, self.min_percent),
        )
    }
}

pub struct LowBatteryRule {
    pub min_percent: f64,
}

impl Rule for LowBatteryRule {
    fn kind(&self) -> AlertKind {
        AlertKind::LowBattery
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        let battery = ctx.telemetry.battery_percent;
        if battery >= self.min_percent {
            return None;
        }
        let message = format!(
            "Low battery on {}: {:.0}%, below {:.0}%",
            ctx.device_name, battery, self.min_percent
        );
        Some(
            AlertCandidate::at_sample(ctx, self.kind(), Severity::Medium, message)
                .with_measure(battery, self.min_percent),
        )
    }
}

pub struct HighTemperatureRule {
    pub max_c: f64,
}

impl Rule for HighTemperatureRule {
    fn kind(&self) -> AlertKind {
        AlertKind::HighTemperature
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        let temp = ctx.telemetry.temperature_c?;
        if temp <= self.max_c {
            return None;
        }
        let message = format!(
            "High temperature on {}: {:.1} °C, above {:.0} °C",
            ctx.device_name, temp, self.max_c
        );
        Some(
            AlertCandidate::at_sample(ctx, self.kind(), Severity::Medium, message)
                .with_measure(temp, self.max_c),
        )
    }
}

pub struct PhoneCallRule;

impl Rule for PhoneCallRule {
    fn kind(&self) -> AlertKind {
        AlertKind::PhoneCall
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        if !ctx.telemetry.phone_call {
            return None;
        }
        let message = format!(
            "Phone call in progress on {} at {:.1} km/h",
            ctx.device_name, ctx.sample.speed
        );
        Some(AlertCandidate::at_sample(ctx, self.kind(), Severity::Low, message))
    }
}
