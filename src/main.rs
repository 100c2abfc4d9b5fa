use siscom_alerts::config::{AppConfig, ReplayConfig};
use siscom_alerts::feed::{
    FeedSupervisor, HttpPositionApi, KafkaSource, PollSource, PositionApi, SampleSource,
};
use siscom_alerts::models::FeedBatch;
use siscom_alerts::processor;
use siscom_alerts::AlertEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

const BATCH_QUEUE: usize = 16;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Siscom Alerts Service...");
    info!(
        "Rule profile {:?}, speed limit {} km/h",
        config.profile, config.thresholds.speed_limit_kmh
    );

    let mut engine = AlertEngine::new(config.engine_config());
    let api = Arc::new(HttpPositionApi::new(
        &config.traccar_url,
        &config.traccar_user,
        &config.traccar_password,
        Duration::from_secs(config.http_timeout_secs),
    )?);

    if let Some(replay) = &config.replay {
        return run_replay(&mut engine, api.as_ref(), replay).await;
    }

    let push: Option<Box<dyn SampleSource>> = config
        .kafka
        .clone()
        .map(|settings| Box::new(KafkaSource::new(settings)) as Box<dyn SampleSource>);
    let poll = Box::new(PollSource::new(
        api,
        Duration::from_secs(config.poll_interval_secs),
    ));
    let mut feed = FeedSupervisor::new(push, poll, config.reconnect_policy());
    feed.start().await;
    info!("Feed started in {:?} mode", feed.mode());

    // The feed runs in its own task so the liveness sweep never cancels an
    // in-flight fetch or reconnect backoff.
    let (batch_tx, mut batch_rx) = mpsc::channel::<FeedBatch>(BATCH_QUEUE);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let feed_task = tokio::spawn(feed.forward(batch_tx, stop_rx));

    let mut liveness = tokio::time::interval(Duration::from_secs(config.liveness_interval_secs));
    liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            batch = batch_rx.recv() => match batch {
                Some(batch) => {
                    processor::process_batch(&mut engine, batch);
                }
                None => {
                    error!("Feed stopped");
                    break;
                }
            },
            _ = liveness.tick() => {
                processor::sweep(&mut engine, chrono::Utc::now());
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    let _ = stop_tx.send(());
    drop(batch_rx);
    if let Err(e) = feed_task.await {
        error!("Feed task failed: {}", e);
    }
    let summary = engine.summary();
    info!(
        total = summary.total,
        unacknowledged = summary.unacknowledged,
        "Session summary"
    );
    Ok(())
}

async fn run_replay(
    engine: &mut AlertEngine,
    api: &impl PositionApi,
    replay: &ReplayConfig,
) -> anyhow::Result<()> {
    info!(
        "Replaying device {} from {} to {}",
        replay.device_id, replay.from, replay.to
    );
    engine.register_devices(&api.get_devices().await?);
    let history = api
        .get_positions_history(&replay.device_id, replay.from, replay.to)
        .await?;
    let alerts = engine.replay(history);
    for alert in &alerts {
        println!("{}", serde_json::to_string(alert)?);
    }
    info!("Replay produced {} alerts", alerts.len());
    Ok(())
}
