use super::{AlertCandidate, Rule, RuleContext};
use crate::models::{AlertKind, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDirection {
    Left,
    Right,
}

impl std::fmt::Display for TurnDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnDirection::Left => write!(f, "left"),
            TurnDirection::Right => write!(f, "right"),
        }
    }
}

/// Smallest angle between two headings, in `[0, 180]`.
pub fn course_delta(from: f64, to: f64) -> f64 {
    let raw = (to - from).abs() % 360.0;
    if raw > 180.0 {
        360.0 - raw
    } else {
        raw
    }
}

/// Sign of `((to - from + 360) mod 360) - 180`: negative is a clockwise turn.
pub fn turn_direction(from: f64, to: f64) -> TurnDirection {
    let signed = (to - from + 360.0).rem_euclid(360.0) - 180.0;
    if signed < 0.0 {
        TurnDirection::Right
    } else {
        TurnDirection::Left
    }
}

pub struct HarshCorneringRule {
    pub max_delta_deg: f64,
    /// Heading is noise at walking pace.
    pub min_speed_kmh: f64,
}

impl Rule for HarshCorneringRule {
    fn kind(&self) -> AlertKind {
        AlertKind::HarshCornering
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        let previous = ctx.previous?;
        if ctx.sample.speed <= self.min_speed_kmh {
            return None;
        }
        let delta = course_delta(previous.course, ctx.sample.course);
        if delta <= self.max_delta_deg {
            return None;
        }
        let direction = turn_direction(previous.course, ctx.sample.course);
        let message = format!(
            "Harsh {} turn on {}: heading changed {:.0}° at {:.1} km/h (limit {:.0}°)",
            direction, ctx.device_name, delta, ctx.sample.speed, self.max_delta_deg
        );
        Some(
            AlertCandidate::at_sample(ctx, self.kind(), Severity::Medium, message)
                .with_measure(delta, self.max_delta_deg),
        )
    }
}
