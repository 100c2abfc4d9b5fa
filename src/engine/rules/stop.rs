use super::{AlertCandidate, Rule, RuleContext};
use crate::models::{AlertKind, Severity};
use chrono::Duration;

/// Vehicle stopped for too long with no identified driver. Fires at most
/// once per stop; the flag is reset by the tracker when the vehicle moves.
pub struct DriverMissingRule {
    pub after: Duration,
}

impl Rule for DriverMissingRule {
    fn kind(&self) -> AlertKind {
        AlertKind::DriverMissing
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<AlertCandidate> {
        if !ctx.sample.is_stopped()
            || ctx.state.driver_missing_reported
            || ctx.telemetry.driver_id.is_some()
        {
            return None;
        }
        let stopped = ctx.state.stopped_for(ctx.sample.timestamp)?;
        // inclusive: a stop of exactly `after` fires
        if stopped < self.after {
            return None;
        }
        let minutes = stopped.num_seconds() as f64 / 60.0;
        let limit = self.after.num_seconds() as f64 / 60.0;
        let message = format!(
            "{} stopped for {:.1} min with no driver identified (limit {:.0} min)",
            ctx.device_name, minutes, limit
        );
        Some(
            AlertCandidate::at_sample(ctx, self.kind(), Severity::High, message)
                .with_measure(minutes, limit),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::engine::tracker::DeviceRuntimeState;

    fn rule() -> DriverMissingRule {
        DriverMissingRule {
            after: Duration::minutes(2),
        }
    }

    fn stopped_since(secs: i64) -> DeviceRuntimeState {
        DeviceRuntimeState {
            stop_started_at: Some(at(secs)),
            ..Default::default()
        }
    }

    #[test]
    fn does_not_fire_before_two_minutes() {
        let state = stopped_since(0);
        assert!(run(&rule(), &sample(119, 0.0), None, &state).is_none());
        let candidate = run(&rule(), &sample(120, 0.0), None, &state).unwrap();
        assert_eq!(candidate.severity, Severity::High);
        assert_eq!(candidate.value, Some(2.0));
    }

    #[test]
    fn does_not_fire_while_moving_or_with_driver() {
        let state = stopped_since(0);
        assert!(run(&rule(), &sample(300, 3.0), None, &state).is_none());
        let with_driver = sample(300, 0.0).with_attribute("driverUniqueId", "D-77");
        assert!(run(&rule(), &with_driver, None, &state).is_none());
    }

    #[test]
    fn does_not_fire_twice_in_one_stop() {
        let state = DeviceRuntimeState {
            driver_missing_reported: true,
            ..stopped_since(0)
        };
        assert!(run(&rule(), &sample(600, 0.0), None, &state).is_none());
    }
}
