//! Headless demo binary.
//!
//! Spawns the hub with all canonical sources, logs every surface frame,
//! and acknowledges asset loads immediately so cards progress on their
//! own. Use this to watch the scheduling behavior from a terminal.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use greeting_hub::source::run_trigger_loop;
use greeting_hub::sources::{InactivitySource, OfflineSource, RandomTipSource, TimeOfDaySource};
use greeting_hub::{GreetingHub, HubConfig, SurfaceEvent, SurfaceFrame, TriggerPlan};
use greeting_store::Store;

fn data_dir() -> PathBuf {
    match std::env::var("GREETING_HUB_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => PathBuf::from(".greeting-hub"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting greeting hub demo");

    let dir = data_dir();
    std::fs::create_dir_all(&dir)?;
    let store = Store::open(dir.join("greeting-hub.db"))?;
    let config = HubConfig::load(&store);

    let hub = GreetingHub::spawn(config);
    let token = hub.shutdown_token();

    // Surface stand-in: log frames and report assets as instantly loaded.
    let mut frames = hub.subscribe_frames();
    let reporter = hub.surface_reporter();
    let frame_token = token.child_token();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = frame_token.cancelled() => return,
                frame = frames.recv() => match frame {
                    Ok(SurfaceFrame::Mount { card }) => {
                        tracing::info!(
                            content_id = card.content_id,
                            text = card.text_body,
                            "Mount"
                        );
                        reporter.report(SurfaceEvent::AssetReady {
                            content_id: card.content_id,
                        });
                    }
                    Ok(frame) => tracing::info!(?frame, "Frame"),
                    Err(_) => return,
                },
            }
        }
    });

    let publisher = hub.publisher();

    let time_of_day = Arc::new(TimeOfDaySource::new(store.clone()));
    hub.attach(time_of_day.clone());
    run_trigger_loop(
        time_of_day,
        publisher.clone(),
        TriggerPlan::once_after(Duration::from_secs(2)),
        token.child_token(),
    );

    let inactivity = Arc::new(InactivitySource::new(
        store.clone(),
        Duration::from_secs(60),
        0.3,
    ));
    hub.attach(inactivity.clone());
    run_trigger_loop(
        inactivity,
        publisher.clone(),
        TriggerPlan::every(Duration::from_secs(30), Duration::from_secs(30)),
        token.child_token(),
    );

    let random_tip = Arc::new(RandomTipSource::new(store.clone(), 0.15));
    hub.attach(random_tip.clone());
    run_trigger_loop(
        random_tip,
        publisher.clone(),
        TriggerPlan::every(Duration::from_secs(45), Duration::from_secs(45)),
        token.child_token(),
    );

    let offline = Arc::new(OfflineSource::new(store.clone(), 0.5));
    hub.attach(offline.clone());
    let (online_tx, online_rx) = tokio::sync::watch::channel(true);
    offline.watch_connectivity(online_rx, publisher.clone(), token.child_token());

    tracing::info!("Hub running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    drop(online_tx);
    hub.shutdown().await;
    Ok(())
}
