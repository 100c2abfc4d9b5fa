use crate::error::DecodeError;
use crate::models::device::{Device, DeviceStatus};
use crate::models::sample::{normalize_course, AttributeValue, Attributes, Sample};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// The platform reports speed in knots.
pub const KNOTS_TO_KMH: f64 = 1.852;

/// Push envelope as delivered by the platform's live channel.
/// The REST endpoints return the bare `positions` / `devices` arrays.
///
/// Records stay raw JSON until [`FeedEnvelope::into_batch`] so that one
/// malformed record cannot fail the whole message.
#[derive(Debug, Default, Deserialize)]
pub struct FeedEnvelope {
    #[serde(default)]
    pub positions: Vec<Value>,
    #[serde(default)]
    pub devices: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionMessage {
    #[serde(default, deserialize_with = "parse_i64_option")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "parse_id_option")]
    pub device_id: Option<String>,
    pub fix_time: Option<String>,
    pub device_time: Option<String>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub longitude: Option<f64>,
    /// knots
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub course: Option<f64>,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMessage {
    #[serde(default, deserialize_with = "parse_id_option")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub last_update: Option<String>,
}

/// Decoded devices and samples from one poll or push delivery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedBatch {
    pub devices: Vec<Device>,
    pub samples: Vec<Sample>,
}

impl FeedBatch {
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.samples.is_empty()
    }
}

impl FeedEnvelope {
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Converts the envelope, skipping (and logging) records that fail to decode.
    pub fn into_batch(self) -> FeedBatch {
        FeedBatch {
            devices: decode_devices(self.devices),
            samples: decode_positions(self.positions),
        }
    }
}

impl PositionMessage {
    pub fn into_sample(self) -> Result<Sample, DecodeError> {
        let device_id = self.device_id.ok_or(DecodeError::MissingDeviceId)?;

        let time_str = self
            .fix_time
            .as_deref()
            .or(self.device_time.as_deref())
            .unwrap_or("");
        let timestamp = parse_timestamp(time_str)
            .ok_or_else(|| DecodeError::InvalidTimestamp(time_str.to_string()))?;

        let (latitude, longitude) = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return Err(DecodeError::MissingCoordinates),
        };

        let speed_kmh = self.speed.unwrap_or(0.0) * KNOTS_TO_KMH;

        Ok(Sample {
            id: self.id,
            device_id,
            timestamp,
            latitude,
            longitude,
            speed: speed_kmh.max(0.0),
            course: normalize_course(self.course.unwrap_or(0.0)),
            attributes: convert_attributes(self.attributes),
        })
    }
}

impl DeviceMessage {
    pub fn into_device(self) -> Result<Device, DecodeError> {
        let id = self.id.ok_or(DecodeError::MissingId)?;
        Ok(Device {
            name: self.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| id.clone()),
            status: self
                .status
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DeviceStatus::Unknown),
            last_update: self.last_update.as_deref().and_then(parse_timestamp),
            id,
        })
    }
}

pub fn decode_positions(records: Vec<Value>) -> Vec<Sample> {
    records
        .into_iter()
        .filter_map(|record| {
            match serde_json::from_value::<PositionMessage>(record)
                .map_err(|e| DecodeError::Malformed(e.to_string()))
                .and_then(PositionMessage::into_sample)
            {
                Ok(sample) => Some(sample),
                Err(e) => {
                    warn!("Skipping position: {}", e);
                    None
                }
            }
        })
        .collect()
}

pub fn decode_devices(records: Vec<Value>) -> Vec<Device> {
    records
        .into_iter()
        .filter_map(|record| {
            match serde_json::from_value::<DeviceMessage>(record)
                .map_err(|e| DecodeError::Malformed(e.to_string()))
                .and_then(DeviceMessage::into_device)
            {
                Ok(device) => Some(device),
                Err(e) => {
                    warn!("Skipping device: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// Accepts RFC 3339, the platform's `+0000` offset form, and naive
/// `YYYY-MM-DD HH:MM:SS` timestamps (taken as UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|t| t.and_utc())
}

fn convert_attributes(raw: HashMap<String, Value>) -> Attributes {
    raw.into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Bool(b) => AttributeValue::Bool(b),
                Value::Number(n) => AttributeValue::Number(n.as_f64()?),
                Value::String(s) => AttributeValue::Text(s),
                Value::Null | Value::Array(_) | Value::Object(_) => return None,
            };
            Some((key, value))
        })
        .collect()
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}

/// Unreadable ids resolve to `None`.
fn parse_i64_option<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        String(String),
        Int(i64),
        Other(serde::de::IgnoredAny),
    }

    // the position id only gates protocol events; an unreadable one is dropped
    Ok(match Option::<StringOrInt>::deserialize(deserializer)? {
        Some(StringOrInt::Int(i)) => Some(i),
        Some(StringOrInt::String(s)) => s.trim().parse().ok(),
        Some(StringOrInt::Other(_)) | None => None,
    })
}

/// Device ids arrive as integers from REST and as strings from some gateways.
fn parse_id_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        String(String),
        Int(i64),
    }

    Ok(match Option::<StringOrInt>::deserialize(deserializer)? {
        Some(StringOrInt::Int(i)) => Some(i.to_string()),
        Some(StringOrInt::String(s)) if s.trim().is_empty() => None,
        Some(StringOrInt::String(s)) => Some(s.trim().to_string()),
        None => None,
    })
}
