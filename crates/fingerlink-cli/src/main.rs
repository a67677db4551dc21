//! Desktop runner for the fingerlink client.
//!
//! Connects to the attendance server with a simulated sensor. The finger
//! is driven from stdin (`place <print>`, `lift`, `quit`) and the LCD is
//! printed to stdout. Logging goes through `RUST_LOG` (default `info`);
//! settings come from the JSON file named by `FINGERLINK_CONFIG`.

mod config;
mod console;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fingerlink_device::{DeviceContext, DeviceError, RunExit};
use fingerlink_network::ConnectionManager;
use fingerlink_sensor::mock::MockSensor;

use crate::config::FileConfig;
use crate::console::ConsoleLcd;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let (connection_config, device_config) = FileConfig::from_env()?.resolve();
    info!(
        server = %connection_config.server_addr,
        "fingerlink {} starting",
        env!("CARGO_PKG_VERSION")
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C"),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
        on_signal.cancel();
    });

    let (mut sensor, finger) = MockSensor::with_capacity(device_config.store_capacity);
    let on_quit = cancel.clone();
    std::thread::spawn(move || console::drive_finger(finger, on_quit));

    loop {
        let connection = ConnectionManager::new(connection_config.clone());
        let mut device = DeviceContext::new(device_config.clone(), sensor, connection)
            .with_status(ConsoleLcd::default())
            .with_cancel(cancel.clone());

        match device.start().await {
            Ok(()) => {}
            Err(DeviceError::Cancelled) => break,
            Err(e) => return Err(e).context("Device startup failed"),
        }

        let exit = device.run().await.context("Control loop failed")?;
        sensor = device.into_sensor();

        match exit {
            RunExit::Reboot => info!("Rebooting"),
            RunExit::Shutdown => break,
        }
    }

    info!("Stopped");
    Ok(())
}
