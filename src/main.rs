// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Clocklink monitor: connect to the accessory and log its events.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clocklink::link::Transport;
use clocklink::state::DeviceState;
use clocklink::{Config, DeviceEvent, DeviceSession};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clocklink=info".parse().unwrap()),
        )
        .init();

    info!("Starting clocklink v{}...", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("Configuration loaded");

    let transport = open_transport(&config).await?;
    let state = DeviceState::new();
    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<DeviceEvent>(32);

    let session: Arc<DeviceSession> =
        DeviceSession::connect(transport, &config.link, state.clone(), event_tx).await?;

    tokio::spawn({
        let session = session.clone();
        async move {
            if let Err(e) = session.set_device_time_now().await {
                warn!("clock sync failed: {}", e);
            }
        }
    });

    while let Some(event) = event_rx.recv().await {
        match event {
            DeviceEvent::SettingsChanged => {
                let v = state.snapshot();
                info!(
                    "settings: alarm {:02}:{:02} ({}), color #{:06X}, brightness {}, volume {}",
                    v.alarm_time / 60,
                    v.alarm_time % 60,
                    if v.alarm_on { "on" } else { "off" },
                    v.color,
                    v.brightness,
                    v.volume
                );
            }
            DeviceEvent::Disconnected => {
                info!("Disconnected");
                break;
            }
            other => info!("{:?}", other),
        }
    }

    info!("Session ended");
    Ok(())
}

async fn open_transport(config: &Config) -> Result<Transport> {
    if let Some(address) = &config.bluetooth.address {
        let address = address
            .parse()
            .with_context(|| format!("invalid Bluetooth address '{}'", address))?;
        return Transport::bluetooth(address, config.bluetooth.channel)
            .await
            .context("Bluetooth connect failed");
    }
    if config.usb.device.exists() {
        return Transport::usb(&config.usb.device)
            .await
            .context("USB open failed");
    }
    bail!(
        "no transport configured: set bluetooth.address in the config file \
         or attach the accessory over USB"
    );
}
