use super::AlertCandidate;
use crate::engine::tracker::DeviceRuntimeState;
use crate::models::{AlertKind, Severity};
use chrono::{DateTime, Duration, Utc};

/// Liveness check. Unlike the per-sample rules this runs on a timer, since
/// its trigger is the absence of samples.
pub struct OfflineRule {
    pub after: Duration,
}

impl OfflineRule {
    pub fn evaluate(
        &self,
        device_id: &str,
        device_name: &str,
        state: &DeviceRuntimeState,
        now: DateTime<Utc>,
    ) -> Option<AlertCandidate> {
        if state.offline_reported {
            return None;
        }
        let silent = now - state.last_seen()?;
        if silent <= self.after {
            return None;
        }
        let minutes = silent.num_seconds() as f64 / 60.0;
        let limit = self.after.num_seconds() as f64 / 60.0;
        Some(AlertCandidate {
            device_id: device_id.to_string(),
            device_name: device_name.to_string(),
            kind: AlertKind::Offline,
            severity: Severity::High,
            message: format!(
                "{} has not reported for {:.0} min (limit {:.0} min)",
                device_name, minutes, limit
            ),
            value: Some(minutes),
            threshold: Some(limit),
            timestamp: now,
            latitude: state.last_sample.as_ref().map(|s| s.latitude),
            longitude: state.last_sample.as_ref().map(|s| s.longitude),
        })
    }
}
