//! # blecentrald — BLE central daemon
//!
//! Composition root that wires a radio backend to the central.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialise `tracing` with the configured filter
//! - Open the radio backend (`btleplug` or the virtual demo radio)
//! - Scan, pick a peripheral, connect, and log the exchange
//! - Disconnect cleanly on Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod console;
mod demo;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use blecentral_adapter_ble::BleRadio;
use blecentral_app::Central;
use blecentral_app::ports::{LinkPrimitive, ScanPrimitive};
use blecentral_domain::address::Address;
use blecentral_domain::capability::CapabilityDescriptor;
use blecentral_domain::peripheral::PeripheralRecord;

use config::{Backend, Config};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    match config.radio.backend {
        Backend::Btleplug => {
            let radio = BleRadio::open(&config.radio.ble, &config.capability).await?;
            run(radio, &config).await
        }
        Backend::Virtual => {
            tracing::info!("using the virtual radio");
            let radio = demo::radio();
            let chatter = demo::spawn_chatter(radio.clone(), config.capability);
            let result = run(radio, &config).await;
            chatter.abort();
            result
        }
    }
}

async fn run<R>(radio: R, config: &Config) -> Result<(), Box<dyn std::error::Error>>
where
    R: ScanPrimitive + LinkPrimitive + Clone + 'static,
{
    let central = Central::new(
        radio.clone(),
        radio,
        &config.capability,
        config.session_settings(),
    );
    tokio::spawn(console::watch_events(central.subscribe()));

    tracing::info!(seconds = config.scan.duration_secs, "scanning");
    central.scan(Arc::new(console::ScanLog)).await?;
    tokio::select! {
        () = tokio::time::sleep(config.scan_duration()) => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            central.stop();
            return Ok(());
        }
    }
    central.stop_scan();

    let peripherals = central.peripherals();
    let Some(peripheral) = pick_target(&peripherals, config.scan.target, &central.capability())
    else {
        tracing::warn!(found = peripherals.len(), "no connectable peripheral found");
        return Ok(());
    };

    tracing::info!(address = %peripheral.address, name = %peripheral.display_name(), "connecting");
    central.connect(peripheral, Arc::new(console::SessionLog));

    tokio::signal::ctrl_c().await?;
    central.stop();

    let mut changes = central.state_changes();
    if tokio::time::timeout(SHUTDOWN_GRACE, changes.wait_for(|state| !state.is_active()))
        .await
        .is_err()
    {
        tracing::warn!("session did not close in time");
    }
    Ok(())
}

/// The configured target when it was seen, otherwise the first peripheral
/// advertising the primary service.
fn pick_target(
    peripherals: &[PeripheralRecord],
    target: Option<Address>,
    capability: &CapabilityDescriptor,
) -> Option<PeripheralRecord> {
    match target {
        Some(address) => peripherals.iter().find(|p| p.address == address),
        None => peripherals.iter().find(|p| p.is_connectable(capability)),
    }
    .cloned()
}
