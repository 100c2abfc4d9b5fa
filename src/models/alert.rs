use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deterministic alert ids.
const ALERT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x5c3e_9a41_7d2b_4f0e_8a6c_1b9d_2e4f_7a10);

/// Alert severity, ordered from least to most urgent.
///
/// ```
/// use siscom_alerts::models::Severity;
///
/// let sev: Severity = "high".parse().unwrap();
/// assert_eq!(sev, Severity::High);
/// assert!(Severity::Critical > Severity::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    Overspeed,
    LowFuel,
    LowBattery,
    HarshBraking,
    HarshCornering,
    HarshAcceleration,
    DriverMissing,
    Offline,
    HighTemperature,
    PhoneCall,
    ProtocolEvent,
}

impl AlertKind {
    pub const ALL: [AlertKind; 11] = [
        AlertKind::Overspeed,
        AlertKind::LowFuel,
        AlertKind::LowBattery,
        AlertKind::HarshBraking,
        AlertKind::HarshCornering,
        AlertKind::HarshAcceleration,
        AlertKind::DriverMissing,
        AlertKind::Offline,
        AlertKind::HighTemperature,
        AlertKind::PhoneCall,
        AlertKind::ProtocolEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Overspeed => "overspeed",
            AlertKind::LowFuel => "low-fuel",
            AlertKind::LowBattery => "low-battery",
            AlertKind::HarshBraking => "harsh-braking",
            AlertKind::HarshCornering => "harsh-cornering",
            AlertKind::HarshAcceleration => "harsh-acceleration",
            AlertKind::DriverMissing => "driver-missing",
            AlertKind::Offline => "offline",
            AlertKind::HighTemperature => "high-temperature",
            AlertKind::PhoneCall => "phone-call",
            AlertKind::ProtocolEvent => "protocol-event",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        AlertKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| format!("unknown alert kind: {s}"))
    }
}

/// An alert produced by a rule and admitted by the dedup gate.
///
/// Position and measurement fields are copied from the triggering sample, so
/// the event stays displayable after newer samples arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub id: Uuid,
    pub device_id: String,
    pub device_name: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    /// Measured value that tripped the rule, if numeric.
    pub value: Option<f64>,
    pub threshold: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl AlertEvent {
    /// Deterministic id for a (device, kind, trigger second) triple.
    pub fn derive_id(device_id: &str, kind: AlertKind, timestamp: DateTime<Utc>) -> Uuid {
        let name = format!("{}:{}:{}", device_id, kind.as_str(), timestamp.timestamp());
        Uuid::new_v5(&ALERT_ID_NAMESPACE, name.as_bytes())
    }

    /// Marks the event acknowledged. Returns false if it already was.
    pub fn acknowledge(&mut self, at: DateTime<Utc>) -> bool {
        if self.acknowledged {
            return false;
        }
        self.acknowledged = true;
        self.acknowledged_at = Some(at);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn alert_kind_round_trips_through_str() {
        for kind in AlertKind::ALL {
            assert_eq!(kind.as_str().parse::<AlertKind>(), Ok(kind));
        }
        assert_eq!("LOW_FUEL".parse::<AlertKind>(), Ok(AlertKind::LowFuel));
        assert!("speeding".parse::<AlertKind>().is_err());
    }

    #[test]
    fn alert_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&AlertKind::HarshCornering).unwrap();
        assert_eq!(json, "\"harsh-cornering\"");
    }

    #[test]
    fn derived_id_buckets_by_second() {
        let t = Utc.with_ymd_and_hms(2025, 11, 29, 6, 15, 15).unwrap();
        let a = AlertEvent::derive_id("7", AlertKind::Overspeed, t);
        let b = AlertEvent::derive_id("7", AlertKind::Overspeed, t + Duration::milliseconds(400));
        let c = AlertEvent::derive_id("7", AlertKind::Overspeed, t + Duration::seconds(1));
        let d = AlertEvent::derive_id("8", AlertKind::Overspeed, t);
        let e = AlertEvent::derive_id("7", AlertKind::HarshBraking, t);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(a, e);
    }
}
