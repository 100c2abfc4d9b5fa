use super::{AlertCandidate, Rule, RuleContext};
use crate::models::{AlertKind, Severity};

pub struct OverspeedRule {
    pub limit_kmh: f64,
}

impl Rule for OverspeedRule {
    fn kind(&self) -> AlertKind {
        AlertKind::Overspeed
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        let speed = ctx.sample.speed;
        if speed <= self.limit_kmh {
            return None;
        }
        let message = format!(
            "{} is travelling at {:.1} km/h, above the {:.0} km/h limit",
            ctx.device_name, speed, self.limit_kmh
        );
        Some(
            AlertCandidate::at_sample(ctx, self.kind(), Severity::High, message)
                .with_measure(speed, self.limit_kmh),
        )
    }
}

/// Speed drop between consecutive samples.
pub struct HarshBrakingRule {
    pub max_drop_kmh: f64,
}

impl Rule for HarshBrakingRule {
    fn kind(&self) -> AlertKind {
        AlertKind::HarshBraking
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        let previous = ctx.previous?;
        let drop = previous.speed - ctx.sample.speed;
        if drop <= self.max_drop_kmh {
            return None;
        }
        let message = format!(
            "Harsh braking on {}: {:.1} -> {:.1} km/h (drop of {:.1} km/h, limit {:.0})",
            ctx.device_name, previous.speed, ctx.sample.speed, drop, self.max_drop_kmh
        );
        Some(
            AlertCandidate::at_sample(ctx, self.kind(), Severity::High, message)
                .with_measure(drop, self.max_drop_kmh),
        )
    }
}

/// Speed gain between consecutive samples.
pub struct HarshAccelerationRule {
    pub max_gain_kmh: f64,
}

impl Rule for HarshAccelerationRule {
    fn kind(&self) -> AlertKind {
        AlertKind::HarshAcceleration
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        let previous = ctx.previous?;
        let gain = ctx.sample.speed - previous.speed;
        if gain <= self.max_gain_kmh {
            return None;
        }
        let message = format!(
            "Harsh acceleration on {}: {:.1} -> {:.1} km/h (gain of {:.1} km/h, limit {:.0})",
            ctx.device_name, previous.speed, ctx.sample.speed, gain, self.max_gain_kmh
        );
        Some(
            AlertCandidate::at_sample(ctx, self.kind(), Severity::Medium, message)
                .with_measure(gain, self.max_gain_kmh),
        )
    }
}
