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

//! Mirrored device state.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default alarm time, 6:30 as minutes since midnight.
pub const DEFAULT_ALARM_TIME: u16 = 390;

/// Default LED color.
pub const DEFAULT_COLOR: u32 = 0x804020;

/// Connection status as seen by the embedding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Connected => "Connected",
        }
    }
}

/// The mirrored value set.
///
/// Created with defaults at session start, overwritten by matching reply
/// frames and optimistically by outbound commands, discarded with the
/// session.
#[derive(Debug, Clone)]
pub struct DeviceValues {
    /// Alarm time, minutes since midnight.
    pub alarm_time: u16,
    pub alarm_on: bool,
    /// Alarm sound file name, folder prefix stripped.
    pub alarm_sound: String,
    /// Packed 24-bit RGB.
    pub color: u32,
    pub brightness: u8,
    pub volume: u8,
    pub display_mode: u8,
    pub locked: bool,
    /// Names from the paginated directory listing.
    pub sound_files: Vec<String>,
    pub license_text: Option<String>,
    pub device_name: String,
    pub unique_id: Option<String>,
    pub protocol_version: Option<u8>,
    /// Last color captured by the accessory's color sensor.
    pub sensed_color: u32,
}

impl Default for DeviceValues {
    fn default() -> Self {
        Self {
            alarm_time: DEFAULT_ALARM_TIME,
            alarm_on: false,
            alarm_sound: String::new(),
            color: DEFAULT_COLOR,
            brightness: 255,
            volume: 128,
            display_mode: 0,
            locked: false,
            sound_files: Vec::new(),
            license_text: None,
            device_name: String::new(),
            unique_id: None,
            protocol_version: None,
            sensed_color: 0,
        }
    }
}

/// Shared mirror of the accessory's state.
///
/// One mutex scope guards the whole value set: the reply decoders read
/// then write composite fields (packing RGB into the color word, for
/// instance) and must never observe a partially updated peer field.
#[derive(Debug)]
pub struct DeviceState {
    values: Mutex<DeviceValues>,
    /// While now < ignore_until, inbound reply-driven updates of
    /// app-settable values are suppressed so an echoed acknowledgement
    /// does not re-trigger the outbound path.
    ignore_until: Mutex<Instant>,
    status: RwLock<ConnectionStatus>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            values: Mutex::new(DeviceValues::default()),
            ignore_until: Mutex::new(Instant::now()),
            status: RwLock::new(ConnectionStatus::Disconnected),
        }
    }
}

impl DeviceState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        *self.status.write() = status;
    }

    /// Clone the current value set.
    pub fn snapshot(&self) -> DeviceValues {
        self.values.lock().clone()
    }

    /// Mutate the value set in one lock scope, engage the echo window,
    /// and return the resulting snapshot. Used by the outbound path for
    /// optimistic updates.
    pub fn update_for_send(
        &self,
        window: Duration,
        mutate: impl FnOnce(&mut DeviceValues),
    ) -> DeviceValues {
        let snapshot = {
            let mut values = self.values.lock();
            mutate(&mut values);
            values.clone()
        };
        *self.ignore_until.lock() = Instant::now() + window;
        snapshot
    }

    /// Mutate the value set from a decoded reply, in one lock scope.
    pub fn apply(&self, mutate: impl FnOnce(&mut DeviceValues)) {
        mutate(&mut self.values.lock());
    }

    /// Whether reply-driven updates of app-settable values are currently
    /// suppressed.
    pub fn echo_suppressed(&self) -> bool {
        Instant::now() < *self.ignore_until.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = DeviceState::new();
        let values = state.snapshot();
        assert_eq!(values.alarm_time, DEFAULT_ALARM_TIME);
        assert_eq!(values.color, DEFAULT_COLOR);
        assert!(!values.alarm_on);
        assert_eq!(state.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_update_for_send_engages_echo_window() {
        let state = DeviceState::new();
        assert!(!state.echo_suppressed());

        let snapshot = state.update_for_send(Duration::from_millis(500), |v| {
            v.brightness = 10;
        });
        assert_eq!(snapshot.brightness, 10);
        assert!(state.echo_suppressed());
    }

    #[test]
    fn test_zero_window_does_not_suppress() {
        let state = DeviceState::new();
        state.update_for_send(Duration::ZERO, |v| v.volume = 1);
        assert!(!state.echo_suppressed());
    }
}
