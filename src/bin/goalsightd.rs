//! goalsightd - robot vision daemon
//!
//! Startup order:
//! 1. Load and validate the JSON configuration (fatal on error)
//! 2. Build the camera registry
//! 3. Connect the parameter store link; the authority seeds the threshold
//! 4. Register the output streams and start one router per switched output
//! 5. Start the pipeline driver on camera 0, if a camera is configured
//! 6. Park until ctrl-c, then shut everything down in order

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use goalsight::{
    open_source, CameraRegistry, FramePipeline, GoalsightConfig, MqttLink, MqttLinkConfig,
    ParamStore, PipelineDriver, SourceRouter, StreamHub, SwitchedOutput,
};

/// Overlay and mask stream names, as the streaming transport sees them.
const OVERLAY_STREAM: &str = "overlay";
const MASK_STREAM: &str = "mask";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Robot vision daemon: contour pipeline with switched camera routing"
)]
struct Args {
    /// Path to the JSON configuration document.
    #[arg(long, env = "GOALSIGHT_CONFIG", default_value = "/boot/vision.json")]
    config: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // Configuration errors are fatal: do not proceed to streaming.
    let cfg = GoalsightConfig::load(&args.config)?;
    let registry = Arc::new(CameraRegistry::new(cfg.camera_entries())?);
    log::info!(
        "loaded {} cameras, {} switched outputs from {}",
        registry.len(),
        cfg.switched_cameras.len(),
        args.config.display()
    );

    let store = Arc::new(ParamStore::new(cfg.store.role, &cfg.store.namespace));
    let link = MqttLink::connect(
        MqttLinkConfig {
            broker: cfg.store.broker.clone(),
            client_id: "goalsightd".to_string(),
            namespace: cfg.store.namespace.clone(),
        },
        store.clone(),
    )
    .context("connect parameter store link")?;
    store.publish_defaults()?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            log::info!("shutdown requested");
            stop.store(true, Ordering::SeqCst);
        })
        .context("install shutdown handler")?;
    }

    // Output streams: the two pipeline outputs plus one per switched
    // output, all pulled by the streaming transport at its own cadence.
    let mut hub = StreamHub::new();
    let overlay_cell = hub.register(OVERLAY_STREAM);
    let mask_cell = hub.register(MASK_STREAM);

    let mut routers = Vec::new();
    let mut outputs = Vec::new();
    for switched in &cfg.switched_cameras {
        log::info!(
            "starting switched camera '{}' on key '{}'",
            switched.name,
            switched.key
        );
        // The capture transport publishes the routed camera's frames into
        // this cell, following the output's current binding.
        hub.register(&switched.name);
        let output = Arc::new(SwitchedOutput::new(&switched.name));
        let events = store.subscribe(&switched.key)?;
        let router = SourceRouter::new(registry.clone(), output.clone(), events);
        routers.push(router.spawn()?);
        outputs.push(output);
    }

    // Image processing on camera 0 if present.
    let driver_handle = match registry.get(0) {
        Some(entry) => {
            let source = open_source(entry)?;
            let pipeline = FramePipeline::new(store.clone());
            let driver = PipelineDriver::new(
                source,
                pipeline,
                Box::new(mask_cell.clone()),
                Box::new(overlay_cell.clone()),
                stop.clone(),
            );
            Some(driver.spawn()?)
        }
        None => {
            log::warn!("no cameras configured; routing control plane only");
            None
        }
    };

    log::info!(
        "goalsightd running: streams [{}]",
        hub.names().collect::<Vec<_>>().join(", ")
    );

    while !stop.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(250));
    }

    // Shutdown: frame loop first, then the store link; dropping the store
    // closes the event channels and lets the routers drain out.
    if let Some(handle) = driver_handle {
        let _ = handle.join();
    }
    link.disconnect()?;
    drop(store);
    for handle in routers {
        let _ = handle.join();
    }
    for output in &outputs {
        match output.resolve(&registry) {
            Some(entry) => log::info!(
                "output '{}' was showing camera '{}'",
                output.name(),
                entry.name()
            ),
            None => log::info!("output '{}' never bound a camera", output.name()),
        }
    }
    log::info!("goalsightd stopped");
    Ok(())
}
