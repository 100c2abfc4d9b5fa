//! Deterministic demo fleet served when the upstream platform is unreachable.

use crate::models::{Device, DeviceStatus, FeedBatch, Sample};
use chrono::{DateTime, Utc};

/// Fleet centre, Querétaro.
const BASE_LAT: f64 = 20.652494;
const BASE_LON: f64 = -100.391404;

struct MockUnit {
    id: &'static str,
    name: &'static str,
    speed_kmh: f64,
    course: f64,
    offset: (f64, f64),
    battery: f64,
    total_distance_m: f64,
}

const FLEET: [MockUnit; 5] = [
    MockUnit {
        id: "1001",
        name: "Unidad 01",
        speed_kmh: 48.0,
        course: 90.0,
        offset: (0.010, 0.012),
        battery: 88.0,
        total_distance_m: 120_000.0,
    },
    MockUnit {
        id: "1002",
        name: "Unidad 02",
        speed_kmh: 0.0,
        course: 0.0,
        offset: (-0.008, 0.004),
        battery: 74.0,
        total_distance_m: 98_500.0,
    },
    MockUnit {
        id: "1003",
        name: "Unidad 03",
        speed_kmh: 62.0,
        course: 215.0,
        offset: (0.021, -0.017),
        battery: 25.0,
        total_distance_m: 410_000.0,
    },
    MockUnit {
        id: "1004",
        name: "Unidad 04",
        speed_kmh: 15.0,
        course: 330.0,
        offset: (-0.015, -0.009),
        battery: 95.0,
        total_distance_m: 15_000.0,
    },
    MockUnit {
        id: "1005",
        name: "Unidad 05",
        speed_kmh: 0.0,
        course: 180.0,
        offset: (0.003, 0.027),
        battery: 61.0,
        total_distance_m: 260_000.0,
    },
];

pub fn devices() -> Vec<Device> {
    FLEET
        .iter()
        .map(|unit| Device {
            status: DeviceStatus::Online,
            ..Device::new(unit.id, unit.name)
        })
        .collect()
}

/// One position per demo device, stamped `now`.
pub fn positions(now: DateTime<Utc>) -> Vec<Sample> {
    FLEET
        .iter()
        .map(|unit| {
            Sample::new(
                unit.id,
                now,
                BASE_LAT + unit.offset.0,
                BASE_LON + unit.offset.1,
            )
            .with_speed(unit.speed_kmh)
            .with_course(unit.course)
            .with_attribute("batteryLevel", unit.battery)
            .with_attribute("totalDistance", unit.total_distance_m)
            .with_attribute("ignition", unit.speed_kmh > 0.0)
        })
        .collect()
}

pub fn batch(now: DateTime<Utc>) -> FeedBatch {
    FeedBatch {
        devices: devices(),
        samples: positions(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn dataset_is_deterministic() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(batch(now), batch(now));
        assert_eq!(devices().len(), positions(now).len());
    }

    #[test]
    fn every_position_belongs_to_a_listed_device() {
        let now = Utc::now();
        let ids: Vec<String> = devices().into_iter().map(|d| d.id).collect();
        for sample in positions(now) {
            assert!(ids.contains(&sample.device_id));
            assert_eq!(sample.timestamp, now);
            assert!(sample.attribute("batteryLevel").is_some());
        }
    }
}
