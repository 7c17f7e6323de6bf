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

//! Device session: handshake, polling, and the application-facing API.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::events::DeviceEvent;
use crate::link::{Link, LinkEvent, LinkState, Transport};
use crate::protocol::{commands, Dispatcher, Opcode, ALARM_FOLDER};
use crate::state::{ConnectionStatus, DeviceState};

/// One connected device.
///
/// Owns the link and the reply pump for its lifetime. When the link
/// drops, the session reports `Disconnected` and goes quiet; opening a
/// fresh transport and calling [`DeviceSession::connect`] again is the
/// caller's job.
pub struct DeviceSession {
    state: Arc<DeviceState>,
    link: Arc<Link>,
    dispatcher: Arc<Mutex<Dispatcher>>,
    echo_window: Duration,
}

impl DeviceSession {
    /// Adopt an open transport: spawn the reply pump and the poll task,
    /// then issue the handshake burst.
    pub async fn connect(
        transport: Transport,
        config: &LinkConfig,
        state: Arc<DeviceState>,
        event_tx: mpsc::Sender<DeviceEvent>,
    ) -> Result<Arc<Self>, LinkError> {
        state.set_status(ConnectionStatus::Connecting);

        let (link_tx, link_rx) = mpsc::channel(64);
        let link = Link::open(transport, link_tx, config.write_timeout());
        let dispatcher = Arc::new(Mutex::new(Dispatcher::new(state.clone())));

        let session = Arc::new(Self {
            state: state.clone(),
            link: link.clone(),
            dispatcher: dispatcher.clone(),
            echo_window: config.echo_window(),
        });

        tokio::spawn(Self::pump(
            link_rx,
            link.clone(),
            dispatcher,
            state.clone(),
            event_tx.clone(),
        ));
        tokio::spawn(Self::poll(link.clone(), config.poll_interval()));

        session.handshake().await?;
        state.set_status(ConnectionStatus::Connected);
        let _ = event_tx.send(DeviceEvent::Connected).await;
        info!("device session established over {}", link.kind().as_str());
        Ok(session)
    }

    pub fn state(&self) -> &Arc<DeviceState> {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.link.state() == LinkState::Open
    }

    /// Close the link. The pump reports `Disconnected` once the read
    /// task winds down.
    pub async fn disconnect(&self) {
        self.link.close().await;
    }

    /// Initial burst: learn the device's identity and current values.
    async fn handshake(&self) -> Result<(), LinkError> {
        for opcode in [
            Opcode::GetProtoVersion,
            Opcode::GetUniqueId,
            Opcode::Settings,
            Opcode::DisplayMode,
            Opcode::Lock,
            Opcode::BtName,
            Opcode::AlarmFile,
        ] {
            self.link.send(&commands::query(opcode)).await?;
        }
        self.request_sound_files().await
    }

    /// Reply pump: decode-dispatch each frame, send any follow-up, and
    /// forward the resulting events.
    async fn pump(
        mut link_rx: mpsc::Receiver<LinkEvent>,
        link: Arc<Link>,
        dispatcher: Arc<Mutex<Dispatcher>>,
        state: Arc<DeviceState>,
        event_tx: mpsc::Sender<DeviceEvent>,
    ) {
        while let Some(event) = link_rx.recv().await {
            match event {
                LinkEvent::Frame(frame) => {
                    let outcome = dispatcher.lock().handle(&frame);
                    if let Some(follow_up) = outcome.follow_up {
                        if let Err(e) = link.send(&follow_up).await {
                            warn!("follow-up send failed: {}", e);
                        }
                    }
                    for event in outcome.events {
                        if event_tx.send(event).await.is_err() {
                            debug!("event receiver dropped");
                            return;
                        }
                    }
                }
                LinkEvent::Closed { error } => {
                    state.set_status(ConnectionStatus::Disconnected);
                    if let Some(e) = error {
                        let _ = event_tx.send(DeviceEvent::LinkFailed(e.to_string())).await;
                    }
                    let _ = event_tx.send(DeviceEvent::Disconnected).await;
                    return;
                }
            }
        }
    }

    /// Periodic refresh of the values the device can change on its own
    /// (front-panel buttons, lockout timer). Stops with the link.
    async fn poll(link: Arc<Link>, interval: Duration) {
        // First tick lands one interval after the handshake, which has
        // already queried everything.
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if link.state() != LinkState::Open {
                debug!("poll task stopping, link no longer open");
                return;
            }
            for opcode in [Opcode::Settings, Opcode::DisplayMode, Opcode::Lock] {
                if link.send(&commands::query(opcode)).await.is_err() {
                    return;
                }
            }
        }
    }

    /// Push the whole settings struct after mutating the mirror.
    async fn send_settings(
        &self,
        mutate: impl FnOnce(&mut crate::state::DeviceValues),
    ) -> Result<(), LinkError> {
        let v = self.state.update_for_send(self.echo_window, mutate);
        self.link
            .send(&commands::settings(
                v.alarm_time,
                v.alarm_on,
                v.brightness,
                v.color,
                v.volume,
            ))
            .await
    }

    pub async fn set_color(&self, color: u32) -> Result<(), LinkError> {
        self.send_settings(|v| v.color = color & 0x00FF_FFFF).await
    }

    pub async fn set_brightness(&self, brightness: u8) -> Result<(), LinkError> {
        self.send_settings(|v| v.brightness = brightness).await
    }

    pub async fn set_volume(&self, volume: u8) -> Result<(), LinkError> {
        self.send_settings(|v| v.volume = volume).await
    }

    /// `alarm_time` is minutes since midnight.
    pub async fn set_alarm(&self, alarm_time: u16, alarm_on: bool) -> Result<(), LinkError> {
        self.send_settings(|v| {
            v.alarm_time = alarm_time;
            v.alarm_on = alarm_on;
        })
        .await
    }

    pub async fn set_display_mode(&self, mode: u8) -> Result<(), LinkError> {
        self.state
            .update_for_send(self.echo_window, |v| v.display_mode = mode);
        self.link.send(&commands::display_mode(mode)).await
    }

    pub async fn set_locked(&self, locked: bool) -> Result<(), LinkError> {
        self.state
            .update_for_send(self.echo_window, |v| v.locked = locked);
        self.link.send(&commands::lock(locked)).await
    }

    /// Select the alarm sound by bare file name; the device stores the
    /// full path under the alarm folder.
    pub async fn set_alarm_sound(&self, name: &str) -> Result<(), LinkError> {
        self.state
            .update_for_send(self.echo_window, |v| v.alarm_sound = name.to_string());
        let path = format!("{}/{}", ALARM_FOLDER, name);
        self.link.send(&commands::alarm_file(&path)).await
    }

    pub async fn rename_device(&self, name: &str) -> Result<(), LinkError> {
        self.state
            .update_for_send(self.echo_window, |v| v.device_name = name.to_string());
        self.link.send(&commands::bt_name(name)).await
    }

    pub async fn set_bt_pin(&self, pin: &str) -> Result<(), LinkError> {
        self.link.send(&commands::bt_pin(pin)).await
    }

    /// Sync the accessory clock to host time.
    pub async fn set_device_time_now(&self) -> Result<(), LinkError> {
        self.link.send(&commands::set_time_now()).await
    }

    /// Kick off a listing of the alarm sound folder. Completion arrives
    /// as [`DeviceEvent::SoundFilesListed`].
    pub async fn request_sound_files(&self) -> Result<(), LinkError> {
        let list = commands::file_list(ALARM_FOLDER);
        self.dispatcher.lock().track_file_list(list.clone());
        self.link.send(&list).await
    }

    /// Fetch the firmware license text. Completion arrives as
    /// [`DeviceEvent::LicenseReady`].
    pub async fn request_license(&self) -> Result<(), LinkError> {
        self.link.send(&commands::query(Opcode::GetLicense)).await
    }

    pub async fn request_sensors(&self) -> Result<(), LinkError> {
        self.link.send(&commands::query(Opcode::GetSensors)).await
    }

    /// Upload a sound file into the alarm folder.
    pub async fn upload_sound_file(&self, name: &str, data: &[u8]) -> Result<(), LinkError> {
        let path = format!("{}/{}", ALARM_FOLDER, name);
        self.link.send(&commands::file_open(&path)).await?;
        // The payload length field caps a chunk at 64 KiB; stay well
        // under it so one write never monopolizes the link.
        for chunk in data.chunks(4096) {
            self.link.send(&commands::file_write(chunk)).await?;
        }
        self.link.send(&commands::file_close()).await
    }

    pub async fn delete_sound_file(&self, name: &str) -> Result<(), LinkError> {
        let path = format!("{}/{}", ALARM_FOLDER, name);
        self.link.send(&commands::file_delete(&path)).await
    }
}
