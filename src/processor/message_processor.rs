use crate::engine::AlertEngine;
use crate::models::{AlertEvent, FeedBatch, FeedEnvelope};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Hands one feed delivery to the engine.
pub fn process_batch(engine: &mut AlertEngine, batch: FeedBatch) -> Vec<AlertEvent> {
    if batch.is_empty() {
        debug!("Empty batch, nothing to process");
        return Vec::new();
    }

    if !batch.devices.is_empty() {
        info!("Registering {} devices", batch.devices.len());
        engine.register_devices(&batch.devices);
    }

    let sample_count = batch.samples.len();
    let alerts = engine.process_batch(batch.samples);
    debug!(
        samples = sample_count,
        alerts = alerts.len(),
        "Processed batch"
    );
    alerts
}

/// Decodes a raw push envelope and processes it. Malformed payloads are
/// logged and dropped.
pub fn process_payload(engine: &mut AlertEngine, payload: &[u8]) -> Vec<AlertEvent> {
    let envelope = match FeedEnvelope::decode(payload) {
        Ok(e) => e,
        Err(e) => {
            warn!("Failed to parse message: {}", e);
            return Vec::new();
        }
    };
    process_batch(engine, envelope.into_batch())
}

/// Periodic liveness sweep.
pub fn sweep(engine: &mut AlertEngine, now: DateTime<Utc>) -> Vec<AlertEvent> {
    let alerts = engine.check_liveness(now);
    if !alerts.is_empty() {
        warn!("{} devices went offline", alerts.len());
    }
    alerts
}
