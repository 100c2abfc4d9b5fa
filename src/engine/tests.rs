use crate::engine::rules::{course_delta, turn_direction, RuleProfile, Thresholds, TurnDirection};
use crate::engine::sink::AlertFilter;
use crate::engine::{AlertEngine, EngineConfig};
use crate::models::{AlertKind, Device, Sample, Severity};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 29, 6, 0, 0).unwrap()
}

fn tick(device: &str, secs: i64, speed: f64) -> Sample {
    Sample::new(device, t0() + Duration::seconds(secs), 20.652494, -100.391404).with_speed(speed)
}

fn kinds(events: &[crate::models::AlertEvent]) -> Vec<AlertKind> {
    events.iter().map(|e| e.kind).collect()
}

#[test]
fn driver_missing_fires_once_after_two_minutes_stopped() {
    let mut engine = AlertEngine::default();

    assert!(engine.process(tick("A", 0, 0.0)).is_empty());
    assert!(engine.process(tick("A", 60, 0.0)).is_empty());

    let fired = engine.process(tick("A", 120, 0.0));
    assert_eq!(kinds(&fired), vec![AlertKind::DriverMissing]);
    assert_eq!(fired[0].severity, Severity::High);

    assert!(engine.process(tick("A", 180, 0.0)).is_empty());
    assert!(engine.process(tick("A", 600, 0.0)).is_empty());

    let all = engine.alerts(&AlertFilter::all().kind(AlertKind::DriverMissing));
    assert_eq!(all.len(), 1);
}

#[test]
fn driver_missing_fires_again_for_a_new_stop() {
    let mut engine = AlertEngine::default();
    engine.process(tick("A", 0, 0.0));
    assert_eq!(engine.process(tick("A", 130, 0.0)).len(), 1);

    engine.process(tick("A", 200, 15.0));
    engine.process(tick("A", 260, 0.0));
    let fired = engine.process(tick("A", 400, 0.0));
    assert_eq!(kinds(&fired), vec![AlertKind::DriverMissing]);
}

#[test]
fn harsh_acceleration_threshold_end_to_end() {
    let mut engine = AlertEngine::new(EngineConfig {
        thresholds: Thresholds::for_profile(RuleProfile::Protocol),
        ..Default::default()
    });

    engine.process(tick("B", 0, 15.0));
    assert!(engine.process(tick("B", 10, 30.0)).is_empty());

    engine.process(tick("B", 20, 15.0));
    let fired = engine.process(tick("B", 30, 40.0));
    assert_eq!(kinds(&fired), vec![AlertKind::HarshAcceleration]);
    assert_eq!(fired[0].severity, Severity::Medium);
}

#[test]
fn sustained_overspeed_is_reported_once_per_cooldown() {
    let mut engine = AlertEngine::default();
    let mut total = 0;
    for i in 0..6 {
        total += engine
            .process(tick("C", i * 10, 80.0))
            .iter()
            .filter(|e| e.kind == AlertKind::Overspeed)
            .count();
    }
    assert_eq!(total, 1);

    let later = engine.process(tick("C", 70, 80.0));
    assert_eq!(kinds(&later), vec![AlertKind::Overspeed]);
}

#[test]
fn duplicate_delivery_does_not_refire_protocol_events() {
    let mut engine = AlertEngine::default();
    let sos = tick("D", 0, 0.0).with_id(501).with_attribute("event", "sos");

    let first = engine.process(sos.clone());
    assert_eq!(kinds(&first), vec![AlertKind::ProtocolEvent]);
    assert_eq!(first[0].severity, Severity::Critical);

    // same tick delivered again well after the cooldown
    let mut replayed = sos.clone();
    replayed.timestamp = sos.timestamp + Duration::seconds(90);
    assert!(engine.process(replayed).is_empty());

    let next = tick("D", 100, 0.0).with_id(502).with_attribute("event", "sos");
    assert_eq!(kinds(&engine.process(next)), vec![AlertKind::ProtocolEvent]);
}

#[test]
fn offline_is_raised_once_per_silence() {
    let mut engine = AlertEngine::default();
    engine.register_devices_at(&[Device::new("E", "Truck 12")], t0());
    engine.process(tick("E", 0, 30.0));

    assert!(engine.check_liveness(t0() + Duration::minutes(5)).is_empty());

    let fired = engine.check_liveness(t0() + Duration::minutes(11));
    assert_eq!(kinds(&fired), vec![AlertKind::Offline]);
    assert_eq!(fired[0].device_name, "Truck 12");
    assert!(fired[0].message.starts_with("Truck 12"));

    assert!(engine.check_liveness(t0() + Duration::minutes(30)).is_empty());

    engine.process(tick("E", 40 * 60, 30.0));
    let again = engine.check_liveness(t0() + Duration::minutes(55));
    assert_eq!(kinds(&again), vec![AlertKind::Offline]);
}

#[test]
fn redelivered_position_does_not_rearm_offline() {
    let mut engine = AlertEngine::default();
    let last = tick("R", 0, 25.0).with_id(900);
    engine.process(last.clone());

    let mut offline = 0;
    for minute in 11..16 {
        // the poll endpoint keeps returning the same latest position
        engine.process(last.clone());
        offline += engine
            .check_liveness(t0() + Duration::minutes(minute))
            .iter()
            .filter(|e| e.kind == AlertKind::Offline)
            .count();
    }
    assert_eq!(offline, 1);
}

#[test]
fn late_sample_is_not_used_as_previous() {
    let mut engine = AlertEngine::default();
    engine.process(tick("L", 0, 50.0));
    engine.process(tick("L", 20, 50.0));

    // arrives after the 20 s sample but was taken before it
    assert!(engine
        .process(tick("L", 10, 5.0))
        .iter()
        .all(|e| e.kind != AlertKind::HarshBraking));

    let fired = engine.process(tick("L", 30, 52.0));
    assert!(fired.iter().all(|e| e.kind != AlertKind::HarshAcceleration));
    assert_eq!(
        engine.tracker().state("L").unwrap().last_sample.as_ref().unwrap().speed,
        52.0
    );
}

#[test]
fn registered_device_that_never_reports_goes_offline() {
    let mut engine = AlertEngine::default();
    engine.register_devices_at(&[Device::new("N", "Trailer 3")], t0());

    assert!(engine.check_liveness(t0() + Duration::minutes(5)).is_empty());
    let fired = engine.check_liveness(t0() + Duration::days(3));
    assert_eq!(kinds(&fired), vec![AlertKind::Offline]);
    assert_eq!(fired[0].latitude, None);
    assert!(engine.check_liveness(t0() + Duration::days(4)).is_empty());
}

#[test]
fn device_list_last_update_counts_as_liveness() {
    let mut engine = AlertEngine::default();
    let mut device = Device::new("U", "Van 1");
    device.last_update = Some(t0());
    engine.register_devices(&[device.clone()]);

    assert_eq!(kinds(&engine.check_liveness(t0() + Duration::minutes(11))), vec![AlertKind::Offline]);

    // same listing again is not new evidence
    engine.register_devices(&[device.clone()]);
    assert!(engine.check_liveness(t0() + Duration::minutes(30)).is_empty());

    device.last_update = Some(t0() + Duration::minutes(31));
    engine.register_devices(&[device]);
    assert!(engine.check_liveness(t0() + Duration::minutes(35)).is_empty());
    assert_eq!(kinds(&engine.check_liveness(t0() + Duration::minutes(45))), vec![AlertKind::Offline]);
}

#[test]
fn four_zero_speed_samples_raise_one_driver_missing() {
    // samples at T, T+60, T+120 and the fourth still at T+120
    let mut engine = AlertEngine::default();
    let mut fired = Vec::new();
    for secs in [0, 60, 120, 120] {
        fired.extend(engine.process(tick("S", secs, 0.0)));
    }
    assert_eq!(kinds(&fired), vec![AlertKind::DriverMissing]);
    assert_eq!(fired[0].severity, Severity::High);

    // same outcome when the fourth sample comes a minute later
    let mut engine = AlertEngine::default();
    let mut fired = Vec::new();
    for secs in [0, 60, 120, 180] {
        fired.extend(engine.process(tick("S", secs, 0.0)));
    }
    assert_eq!(kinds(&fired), vec![AlertKind::DriverMissing]);
}

#[test]
fn alerts_keep_their_own_copy_of_the_sample() {
    let mut engine = AlertEngine::default();
    let fired = engine.process(tick("F", 0, 90.0));
    let id = fired[0].id;

    engine.process(
        Sample::new("F", t0() + Duration::seconds(30), 19.0, -99.0).with_speed(0.0),
    );

    let stored = engine.sink().get(id).unwrap();
    assert_eq!(stored.latitude, Some(20.652494));
    assert_eq!(stored.value, Some(90.0));
}

#[test]
fn acknowledge_twice_is_harmless() {
    let mut engine = AlertEngine::default();
    let id = engine.process(tick("G", 0, 90.0))[0].id;

    assert!(engine.acknowledge(id));
    assert!(engine.acknowledge(id));
    assert_eq!(engine.summary().total, 1);
    assert_eq!(engine.summary().unacknowledged, 0);
    assert!(engine.alerts(&AlertFilter::all().acknowledged(true))[0].acknowledged);
}

#[test]
fn batch_is_processed_in_time_order() {
    let mut engine = AlertEngine::default();
    let fired = engine.process_batch(vec![tick("H", 10, 45.0), tick("H", 0, 10.0)]);
    assert!(kinds(&fired).contains(&AlertKind::HarshAcceleration));
    assert_eq!(
        engine.tracker().state("H").unwrap().last_sample.as_ref().unwrap().speed,
        45.0
    );
}

#[test]
fn low_fuel_follows_todays_odometer() {
    let mut engine = AlertEngine::default();
    let odo = |secs: i64, metres: f64| tick("I", secs, 10.0).with_attribute("totalDistance", metres);

    assert!(engine.process(odo(0, 10_000_000.0)).is_empty());
    // 160 km today -> 240 L
    assert!(engine.process(odo(600, 10_160_000.0)).is_empty());
    // 1672 km today -> 51 L
    let fired = engine.process(odo(1200, 11_672_000.0));
    assert_eq!(kinds(&fired), vec![AlertKind::LowFuel]);
}

#[test]
fn course_normalisation_example() {
    assert_eq!(course_delta(350.0, 10.0), 20.0);
    assert_eq!(turn_direction(350.0, 10.0), TurnDirection::Right);
}

proptest! {
    #[test]
    fn overspeed_never_fires_at_or_below_limit(speed in 0.0f64..=20.0, secs in 0i64..10_000) {
        let mut engine = AlertEngine::default();
        let fired = engine.process(tick("P", secs, speed));
        prop_assert!(fired.iter().all(|e| e.kind != AlertKind::Overspeed));
    }

    #[test]
    fn two_overspeeds_within_cooldown_yield_one_alert(
        first in 21.0f64..200.0,
        second in 21.0f64..200.0,
        gap in 0i64..60,
    ) {
        let mut engine = AlertEngine::default();
        engine.process(tick("Q", 0, first));
        engine.process(tick("Q", gap, second));
        let overspeeds = engine.alerts(&AlertFilter::all().kind(AlertKind::Overspeed));
        prop_assert_eq!(overspeeds.len(), 1);
    }

    #[test]
    fn course_delta_is_symmetric_and_bounded(a in 0.0f64..360.0, b in 0.0f64..360.0) {
        let d = course_delta(a, b);
        prop_assert!((0.0..=180.0).contains(&d));
        prop_assert!((d - course_delta(b, a)).abs() < 1e-9);
    }
}
