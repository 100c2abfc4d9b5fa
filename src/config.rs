use crate::engine::fuel::FuelModel;
use crate::engine::rules::{RuleProfile, Thresholds};
use crate::engine::sink::DEFAULT_RETENTION;
use crate::engine::EngineConfig;
use crate::feed::{KafkaSettings, ReconnectPolicy};
use crate::models::message::parse_timestamp;
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Replays one device's history instead of following the live feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    pub device_id: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub traccar_url: String,
    pub traccar_user: String,
    pub traccar_password: String,
    pub http_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Push feed; `None` when `KAFKA_BOOTSTRAP_SERVERS` is unset.
    pub kafka: Option<KafkaSettings>,
    pub reconnect_base_ms: u64,
    pub reconnect_max_attempts: u32,
    pub profile: RuleProfile,
    pub thresholds: Thresholds,
    pub fuel: FuelModel,
    pub retention: usize,
    pub liveness_interval_secs: u64,
    pub replay: Option<ReplayConfig>,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset or unparseable numeric
    /// values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let string_or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let traccar_url = string_or("TRACCAR_URL", "http://localhost:8082");
        let traccar_user = string_or("TRACCAR_USER", "admin");
        let traccar_password = var("TRACCAR_PASSWORD").unwrap_or_default();
        let http_timeout_secs = parse_or(var("HTTP_TIMEOUT_SECS"), 10);
        let poll_interval_secs = parse_or::<u64>(var("POLL_INTERVAL_SECS"), 5).max(1);

        let kafka = var("KAFKA_BOOTSTRAP_SERVERS").map(|bootstrap_servers| KafkaSettings {
            bootstrap_servers,
            topic: string_or("KAFKA_TOPIC", "siscom-positions"),
            group_id: string_or("KAFKA_GROUP_ID", "siscom-alerts-consumer"),
            auto_offset_reset: string_or("KAFKA_AUTO_OFFSET_RESET", "latest"),
            security_protocol: string_or("KAFKA_SECURITY_PROTOCOL", "SASL_PLAINTEXT"),
            sasl_mechanism: string_or("KAFKA_SASL_MECHANISM", "SCRAM-SHA-256"),
            username: var("KAFKA_USERNAME").unwrap_or_default(),
            password: var("KAFKA_PASSWORD").unwrap_or_default(),
        });

        let reconnect_base_ms = parse_or(var("RECONNECT_BASE_MS"), 3_000);
        let reconnect_max_attempts = parse_or(var("RECONNECT_MAX_ATTEMPTS"), 5);

        let profile = match var("ALERT_PROFILE") {
            Some(p) => RuleProfile::from_str(&p).map_err(|e| anyhow!(e))?,
            None => RuleProfile::default(),
        };
        let mut thresholds = Thresholds::for_profile(profile);
        thresholds.speed_limit_kmh = parse_or(var("ALERT_SPEED_LIMIT_KMH"), thresholds.speed_limit_kmh);
        thresholds.low_fuel_percent = parse_or(var("ALERT_LOW_FUEL_PERCENT"), thresholds.low_fuel_percent);
        thresholds.low_battery_percent =
            parse_or(var("ALERT_LOW_BATTERY_PERCENT"), thresholds.low_battery_percent);
        thresholds.harsh_braking_kmh = parse_or(var("ALERT_HARSH_BRAKING_KMH"), thresholds.harsh_braking_kmh);
        thresholds.harsh_acceleration_kmh =
            parse_or(var("ALERT_HARSH_ACCELERATION_KMH"), thresholds.harsh_acceleration_kmh);
        thresholds.harsh_cornering_deg =
            parse_or(var("ALERT_HARSH_CORNERING_DEG"), thresholds.harsh_cornering_deg);
        thresholds.high_temperature_c =
            parse_or(var("ALERT_HIGH_TEMPERATURE_C"), thresholds.high_temperature_c);
        if let Some(secs) = var("DRIVER_MISSING_AFTER_SECS").and_then(|v| v.parse::<i64>().ok()) {
            thresholds.driver_missing_after = chrono::Duration::seconds(secs);
        }
        if let Some(secs) = var("OFFLINE_AFTER_SECS").and_then(|v| v.parse::<i64>().ok()) {
            thresholds.offline_after = chrono::Duration::seconds(secs);
        }

        let defaults = FuelModel::default();
        let fuel = FuelModel {
            tank_capacity_l: parse_or(var("FUEL_TANK_CAPACITY_L"), defaults.tank_capacity_l),
            km_per_litre: parse_or(var("FUEL_KM_PER_LITRE"), defaults.km_per_litre),
        };

        let retention = parse_or(var("ALERT_RETENTION"), DEFAULT_RETENTION);
        let liveness_interval_secs = parse_or::<u64>(var("LIVENESS_INTERVAL_SECS"), 60).max(1);

        let replay = match var("REPLAY_DEVICE_ID") {
            Some(device_id) => {
                let from = required_timestamp(var("REPLAY_FROM"), "REPLAY_FROM")?;
                let to = required_timestamp(var("REPLAY_TO"), "REPLAY_TO")?;
                if from > to {
                    bail!("REPLAY_FROM must not be after REPLAY_TO");
                }
                Some(ReplayConfig { device_id, from, to })
            }
            None => None,
        };

        let log_level = string_or("LOG_LEVEL", "info");

        Ok(Self {
            traccar_url,
            traccar_user,
            traccar_password,
            http_timeout_secs,
            poll_interval_secs,
            kafka,
            reconnect_base_ms,
            reconnect_max_attempts,
            profile,
            thresholds,
            fuel,
            retention,
            liveness_interval_secs,
            replay,
            log_level,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            thresholds: self.thresholds.clone(),
            fuel: self.fuel,
            retention: self.retention,
            ..EngineConfig::default()
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base: Duration::from_millis(self.reconnect_base_ms),
            max_attempts: self.reconnect_max_attempts,
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn required_timestamp(value: Option<String>, key: &str) -> Result<DateTime<Utc>> {
    let raw = value.ok_or_else(|| anyhow!("{} is required for replay", key))?;
    parse_timestamp(&raw).ok_or_else(|| anyhow!("{} is not a valid timestamp: {}", key, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.traccar_url, "http://localhost:8082");
        assert_eq!(cfg.poll_interval_secs, 5);
        assert!(cfg.kafka.is_none());
        assert!(cfg.replay.is_none());
        assert_eq!(cfg.profile, RuleProfile::General);
        assert_eq!(cfg.thresholds.speed_limit_kmh, 20.0);
        assert_eq!(cfg.retention, 1_000);
        assert_eq!(cfg.reconnect_policy(), ReconnectPolicy::default());
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn profile_and_overrides() {
        let cfg = config(&[
            ("ALERT_PROFILE", "protocol"),
            ("ALERT_LOW_FUEL_PERCENT", "15"),
            ("OFFLINE_AFTER_SECS", "300"),
            ("FUEL_TANK_CAPACITY_L", "400"),
            ("POLL_INTERVAL_SECS", "not-a-number"),
        ])
        .unwrap();
        assert_eq!(cfg.thresholds.speed_limit_kmh, 60.0);
        assert_eq!(cfg.thresholds.low_fuel_percent, 15.0);
        assert_eq!(cfg.thresholds.offline_after, chrono::Duration::minutes(5));
        assert_eq!(cfg.engine_config().fuel.tank_capacity_l, 400.0);
        assert_eq!(cfg.poll_interval_secs, 5);

        let explicit = config(&[("ALERT_PROFILE", "protocol"), ("ALERT_SPEED_LIMIT_KMH", "90")]).unwrap();
        assert_eq!(explicit.thresholds.speed_limit_kmh, 90.0);
    }

    #[test]
    fn unknown_profile_is_rejected() {
        assert!(config(&[("ALERT_PROFILE", "strict")]).is_err());
    }

    #[test]
    fn kafka_enabled_by_bootstrap_servers() {
        let cfg = config(&[("KAFKA_BOOTSTRAP_SERVERS", "broker:9092"), ("KAFKA_TOPIC", "gps")]).unwrap();
        let kafka = cfg.kafka.unwrap();
        assert_eq!(kafka.bootstrap_servers, "broker:9092");
        assert_eq!(kafka.topic, "gps");
        assert_eq!(kafka.group_id, "siscom-alerts-consumer");
        assert!(kafka.username.is_empty());
    }

    #[test]
    fn replay_window_is_validated() {
        let cfg = config(&[
            ("REPLAY_DEVICE_ID", "12"),
            ("REPLAY_FROM", "2025-11-29T00:00:00Z"),
            ("REPLAY_TO", "2025-11-29 12:00:00"),
        ])
        .unwrap();
        let replay = cfg.replay.unwrap();
        assert_eq!(replay.device_id, "12");
        assert!(replay.from < replay.to);

        assert!(config(&[("REPLAY_DEVICE_ID", "12")]).is_err());
        assert!(config(&[
            ("REPLAY_DEVICE_ID", "12"),
            ("REPLAY_FROM", "2025-11-30T00:00:00Z"),
            ("REPLAY_TO", "2025-11-29T00:00:00Z"),
        ])
        .is_err());
    }
}
