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

//! Inbound reply dispatch: decode payloads and apply them to the mirror.
//!
//! A reply whose payload does not match its opcode's expected shape is a
//! no-op; the frame was well-formed at the transport level, so nothing
//! else is disturbed. Replies that echo an app-originated change inside
//! the suppression window are dropped before touching app-settable state.

use flate2::read::GzDecoder;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{commands, curve, Opcode, ALARM_FOLDER};
use crate::events::DeviceEvent;
use crate::link::{InboundFrame, OutboundCommand};
use crate::state::DeviceState;

/// Result of dispatching one reply frame.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Command to send next (file-list pagination, license chunking).
    pub follow_up: Option<OutboundCommand>,
    /// Events for the embedding application.
    pub events: Vec<DeviceEvent>,
}

impl Outcome {
    fn event(event: DeviceEvent) -> Self {
        Self {
            follow_up: None,
            events: vec![event],
        }
    }
}

/// Maps decoded reply frames to state updates and follow-up commands.
pub struct Dispatcher {
    state: Arc<DeviceState>,
    /// Accumulates gzip-compressed license chunks.
    license_buf: Vec<u8>,
    /// The list command to re-issue for the next directory entry.
    pending_list: Option<OutboundCommand>,
    /// Names collected so far for the in-flight listing.
    files: Vec<String>,
}

impl Dispatcher {
    pub fn new(state: Arc<DeviceState>) -> Self {
        Self {
            state,
            license_buf: Vec::new(),
            pending_list: None,
            files: Vec::new(),
        }
    }

    /// Begin a directory listing. The identical command is re-issued for
    /// each subsequent entry until the device sends an empty reply.
    pub fn track_file_list(&mut self, command: OutboundCommand) {
        self.files.clear();
        self.pending_list = Some(command);
    }

    /// Dispatch one decoded reply frame.
    pub fn handle(&mut self, frame: &InboundFrame) -> Outcome {
        let Some(opcode) = Opcode::from_u8(frame.opcode) else {
            warn!("reply with unknown opcode {}", frame.opcode);
            return Outcome::default();
        };

        let payload = frame.payload.as_slice();
        match opcode {
            Opcode::GetProtoVersion => self.handle_proto_version(payload),
            Opcode::GetSensors => self.handle_sensors(payload),
            Opcode::FileList => self.handle_file_list(payload),
            Opcode::GetUniqueId => self.handle_unique_id(payload),
            Opcode::BtName => self.handle_bt_name(payload),
            Opcode::Settings => self.handle_settings(payload),
            Opcode::AlarmFile => self.handle_alarm_file(payload),
            Opcode::GetLicense => self.handle_license(payload),
            Opcode::DisplayMode => self.handle_display_mode(payload),
            Opcode::Lock => self.handle_lock(payload),
            Opcode::FileDelete
            | Opcode::FileOpen
            | Opcode::FileWrite
            | Opcode::FileClose
            | Opcode::BtPin
            | Opcode::Time => {
                debug!("{:?} acknowledged ({} byte(s))", opcode, payload.len());
                Outcome::default()
            }
        }
    }

    fn handle_proto_version(&self, payload: &[u8]) -> Outcome {
        let Some(&version) = payload.first() else {
            return Outcome::default();
        };
        self.state.apply(|v| v.protocol_version = Some(version));
        Outcome::event(DeviceEvent::ProtocolVersion(version))
    }

    /// Settings reply: exactly `[hour, minute, on, brightness, r, g, b,
    /// volume]`. Any other length is ignored, no partial apply.
    fn handle_settings(&self, payload: &[u8]) -> Outcome {
        if payload.len() != 8 {
            warn!("settings reply with length {}, ignored", payload.len());
            return Outcome::default();
        }
        if self.state.echo_suppressed() {
            debug!("settings echo suppressed");
            return Outcome::default();
        }

        let alarm_time = payload[0] as u16 * 60 + payload[1] as u16;
        let alarm_on = payload[2] != 0;
        let brightness = payload[3];
        let color =
            ((payload[4] as u32) << 16) | ((payload[5] as u32) << 8) | payload[6] as u32;
        let volume = payload[7];

        let mut changed = false;
        self.state.apply(|v| {
            changed = v.alarm_time != alarm_time
                || v.alarm_on != alarm_on
                || v.brightness != brightness
                || v.color != color
                || v.volume != volume;
            v.alarm_time = alarm_time;
            v.alarm_on = alarm_on;
            v.brightness = brightness;
            v.color = color;
            v.volume = volume;
        });

        if changed {
            Outcome::event(DeviceEvent::SettingsChanged)
        } else {
            Outcome::default()
        }
    }

    /// Sensor snapshot: three little-endian u16 color channels at fixed
    /// offsets, third channel scaled x3, max-normalized to 8 bits, then
    /// mapped through the calibration curve.
    fn handle_sensors(&self, payload: &[u8]) -> Outcome {
        if payload.len() <= 23 {
            return Outcome::default();
        }
        let channel =
            |i: usize| u16::from_le_bytes([payload[i], payload[i + 1]]) as u32;
        let r = channel(18);
        let g = channel(20);
        let b = channel(22) * 3;

        let max = r.max(g).max(b).max(1);
        let normalize = |v: u32| ((v * 255) / max) as u8;
        let color = curve::map_rgb(normalize(r), normalize(g), normalize(b));

        self.state.apply(|v| v.sensed_color = color);
        Outcome::event(DeviceEvent::SensedColor(color))
    }

    /// Directory listing, one entry per reply. A single zero byte
    /// terminates; otherwise the filename sits at bytes `5..len-1` and
    /// the same list command is re-issued for the next entry.
    fn handle_file_list(&mut self, payload: &[u8]) -> Outcome {
        if self.pending_list.is_none() {
            debug!("file-list reply with no listing in flight, ignored");
            return Outcome::default();
        }
        if payload.len() == 1 && payload[0] == 0 {
            let files = std::mem::take(&mut self.files);
            self.pending_list = None;
            debug!("file listing complete, {} entries", files.len());
            self.state.apply(|v| v.sound_files = files.clone());
            return Outcome::event(DeviceEvent::SoundFilesListed(files));
        }
        if payload.len() > 6 {
            let name =
                String::from_utf8_lossy(&payload[5..payload.len() - 1]).into_owned();
            debug!("file entry: {}", name);
            self.files.push(name);
            return Outcome {
                follow_up: self.pending_list.clone(),
                events: Vec::new(),
            };
        }
        Outcome::default()
    }

    fn handle_unique_id(&self, payload: &[u8]) -> Outcome {
        if payload.is_empty() {
            return Outcome::default();
        }
        let hex: String = payload.iter().map(|b| format!("{:02x}", b)).collect();
        self.state.apply(|v| v.unique_id = Some(hex));
        Outcome::default()
    }

    /// Device name reply: bare or null-terminated string; strip one
    /// trailing terminator if the payload is longer than one byte or
    /// starts with the terminator.
    fn handle_bt_name(&self, payload: &[u8]) -> Outcome {
        if payload.is_empty() {
            return Outcome::default();
        }
        let end = if payload.len() > 1 || payload[0] == 0 {
            payload.len() - 1
        } else {
            payload.len()
        };
        let name = String::from_utf8_lossy(&payload[..end]).into_owned();
        self.state.apply(|v| v.device_name = name.clone());
        Outcome::event(DeviceEvent::DeviceNameChanged(name))
    }

    /// Alarm-file reply: path string with the alarm folder prefix
    /// stripped case-insensitively.
    fn handle_alarm_file(&self, payload: &[u8]) -> Outcome {
        if payload.len() <= 1 {
            return Outcome::default();
        }
        if self.state.echo_suppressed() {
            debug!("alarm-file echo suppressed");
            return Outcome::default();
        }
        let end = payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(payload.len());
        let path = String::from_utf8_lossy(&payload[..end]).into_owned();

        let prefix = format!("{}/", ALARM_FOLDER);
        let sound = if path.to_lowercase().starts_with(&prefix.to_lowercase()) {
            path[prefix.len()..].to_string()
        } else {
            path
        };

        self.state.apply(|v| v.alarm_sound = sound.clone());
        Outcome::event(DeviceEvent::AlarmSoundChanged(sound))
    }

    /// License text arrives in gzip-compressed chunks. A non-terminal
    /// chunk appends its payload (first byte is the continuation marker)
    /// and re-issues the fetch; the terminal chunk triggers
    /// decompression of the accumulated buffer.
    fn handle_license(&mut self, payload: &[u8]) -> Outcome {
        if payload.len() > 1 && payload[0] != 0 {
            self.license_buf.extend_from_slice(&payload[1..]);
            return Outcome {
                follow_up: Some(commands::query(Opcode::GetLicense)),
                events: Vec::new(),
            };
        }

        let compressed = std::mem::take(&mut self.license_buf);
        if compressed.is_empty() {
            return Outcome::default();
        }
        let mut text = String::new();
        match GzDecoder::new(compressed.as_slice()).read_to_string(&mut text) {
            Ok(_) => {
                debug!("license text decompressed, {} chars", text.len());
                self.state.apply(|v| v.license_text = Some(text));
                Outcome::event(DeviceEvent::LicenseReady)
            }
            Err(e) => {
                warn!("license decompression failed: {}", e);
                Outcome::default()
            }
        }
    }

    fn handle_display_mode(&self, payload: &[u8]) -> Outcome {
        let Some(&mode) = payload.first() else {
            return Outcome::default();
        };
        if self.state.echo_suppressed() {
            debug!("display-mode echo suppressed");
            return Outcome::default();
        }
        let mut changed = false;
        self.state.apply(|v| {
            changed = v.display_mode != mode;
            v.display_mode = mode;
        });
        if changed {
            Outcome::event(DeviceEvent::DisplayModeChanged(mode))
        } else {
            Outcome::default()
        }
    }

    /// Lock reply: first byte 1 means "no change"; 2 means locked;
    /// anything else means unlocked.
    fn handle_lock(&self, payload: &[u8]) -> Outcome {
        let Some(&value) = payload.first() else {
            return Outcome::default();
        };
        if value == 1 {
            return Outcome::default();
        }
        if self.state.echo_suppressed() {
            debug!("lock echo suppressed");
            return Outcome::default();
        }
        let locked = value == commands::LOCK_LOCKED;
        let mut changed = false;
        self.state.apply(|v| {
            changed = v.locked != locked;
            v.locked = locked;
        });
        if changed {
            Outcome::event(DeviceEvent::LockChanged(locked))
        } else {
            Outcome::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::time::Duration;

    fn frame(opcode: Opcode, payload: Vec<u8>) -> InboundFrame {
        InboundFrame {
            opcode: opcode.as_u8(),
            sequence: opcode.as_u8(),
            payload,
        }
    }

    fn dispatcher() -> (Dispatcher, Arc<DeviceState>) {
        let state = DeviceState::new();
        (Dispatcher::new(state.clone()), state)
    }

    #[test]
    fn test_settings_reply_applies() {
        let (mut d, state) = dispatcher();
        let out = d.handle(&frame(
            Opcode::Settings,
            vec![6, 30, 1, 255, 0x80, 0x40, 0x20, 128],
        ));

        let v = state.snapshot();
        assert_eq!(v.alarm_time, 390);
        assert!(v.alarm_on);
        assert_eq!(v.brightness, 255);
        assert_eq!(v.color, 0x804020);
        assert_eq!(v.volume, 128);
        assert_eq!(out.events, vec![DeviceEvent::SettingsChanged]);
    }

    #[test]
    fn test_settings_wrong_length_is_noop() {
        let (mut d, state) = dispatcher();
        let before = state.snapshot();
        let out = d.handle(&frame(Opcode::Settings, vec![6, 30, 1]));
        let after = state.snapshot();
        assert_eq!(before.alarm_time, after.alarm_time);
        assert_eq!(before.color, after.color);
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_settings_echo_suppressed() {
        let (mut d, state) = dispatcher();
        // App just sent brightness 10; the window is engaged.
        state.update_for_send(Duration::from_millis(500), |v| v.brightness = 10);

        let out = d.handle(&frame(
            Opcode::Settings,
            vec![6, 30, 1, 200, 0, 0, 0, 0],
        ));
        assert!(out.events.is_empty());
        assert_eq!(state.snapshot().brightness, 10);
    }

    #[test]
    fn test_sensor_reply() {
        let (mut d, state) = dispatcher();
        let mut payload = vec![0u8; 24];
        // Red dominates: r=300, g=150, b=50*3=150.
        payload[18..20].copy_from_slice(&300u16.to_le_bytes());
        payload[20..22].copy_from_slice(&150u16.to_le_bytes());
        payload[22..24].copy_from_slice(&50u16.to_le_bytes());

        let out = d.handle(&frame(Opcode::GetSensors, payload));
        let color = state.snapshot().sensed_color;
        // Dominant channel normalizes to 255, which the curve maps to 255.
        assert_eq!(color >> 16, 0xFF);
        assert_eq!(out.events, vec![DeviceEvent::SensedColor(color)]);
    }

    #[test]
    fn test_sensor_reply_too_short() {
        let (mut d, state) = dispatcher();
        let out = d.handle(&frame(Opcode::GetSensors, vec![0u8; 23]));
        assert!(out.events.is_empty());
        assert_eq!(state.snapshot().sensed_color, 0);
    }

    #[test]
    fn test_file_list_pagination() {
        let (mut d, state) = dispatcher();
        let list_cmd = commands::file_list(ALARM_FOLDER);
        d.track_file_list(list_cmd.clone());

        // Entry reply: 5 header bytes, name, terminator.
        let mut payload = vec![0u8; 5];
        payload.extend_from_slice(b"chime.ogg");
        payload.push(0);
        let out = d.handle(&frame(Opcode::FileList, payload));
        assert_eq!(out.follow_up, Some(list_cmd));
        assert!(out.events.is_empty());

        // Terminal reply stops the pagination and publishes the list.
        let out = d.handle(&frame(Opcode::FileList, vec![0]));
        assert!(out.follow_up.is_none());
        assert_eq!(
            out.events,
            vec![DeviceEvent::SoundFilesListed(vec!["chime.ogg".to_string()])]
        );
        assert_eq!(state.snapshot().sound_files, vec!["chime.ogg".to_string()]);

        // A further terminal reply must not re-request anything.
        let out = d.handle(&frame(Opcode::FileList, vec![0]));
        assert!(out.follow_up.is_none());
    }

    #[test]
    fn test_unsolicited_file_list_terminator_keeps_mirror() {
        let (mut d, state) = dispatcher();
        state.apply(|v| v.sound_files = vec!["chime.ogg".to_string()]);

        let out = d.handle(&frame(Opcode::FileList, vec![0]));
        assert!(out.follow_up.is_none());
        assert!(out.events.is_empty());
        assert_eq!(state.snapshot().sound_files, vec!["chime.ogg".to_string()]);
    }

    #[test]
    fn test_license_chunks() {
        let (mut d, state) = dispatcher();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"Licensed under Apache 2.0").unwrap();
        let compressed = encoder.finish().unwrap();

        let (first, second) = compressed.split_at(compressed.len() / 2);
        let mut chunk = vec![1u8];
        chunk.extend_from_slice(first);
        let out = d.handle(&frame(Opcode::GetLicense, chunk));
        assert!(out.follow_up.is_some());

        let mut chunk = vec![1u8];
        chunk.extend_from_slice(second);
        let out = d.handle(&frame(Opcode::GetLicense, chunk));
        assert!(out.follow_up.is_some());

        let out = d.handle(&frame(Opcode::GetLicense, vec![0]));
        assert_eq!(out.events, vec![DeviceEvent::LicenseReady]);
        assert_eq!(
            state.snapshot().license_text.as_deref(),
            Some("Licensed under Apache 2.0")
        );
    }

    #[test]
    fn test_bt_name_strips_terminator() {
        let (mut d, state) = dispatcher();
        let mut payload = b"Bedside Clock".to_vec();
        payload.push(0);
        let out = d.handle(&frame(Opcode::BtName, payload));
        assert_eq!(state.snapshot().device_name, "Bedside Clock");
        assert_eq!(
            out.events,
            vec![DeviceEvent::DeviceNameChanged("Bedside Clock".to_string())]
        );
    }

    #[test]
    fn test_alarm_file_strips_folder_prefix() {
        let (mut d, state) = dispatcher();
        let mut payload = b"/tunes/morning.ogg".to_vec();
        payload.push(0);
        d.handle(&frame(Opcode::AlarmFile, payload));
        assert_eq!(state.snapshot().alarm_sound, "morning.ogg");
    }

    #[test]
    fn test_lock_reply_convention() {
        let (mut d, state) = dispatcher();

        let out = d.handle(&frame(Opcode::Lock, vec![2]));
        assert!(state.snapshot().locked);
        assert_eq!(out.events, vec![DeviceEvent::LockChanged(true)]);

        // 1 means "no change".
        let out = d.handle(&frame(Opcode::Lock, vec![1]));
        assert!(state.snapshot().locked);
        assert!(out.events.is_empty());

        let out = d.handle(&frame(Opcode::Lock, vec![0]));
        assert!(!state.snapshot().locked);
        assert_eq!(out.events, vec![DeviceEvent::LockChanged(false)]);
    }

    #[test]
    fn test_unknown_opcode_ignored() {
        let (mut d, _state) = dispatcher();
        let out = d.handle(&InboundFrame {
            opcode: 0x55,
            sequence: 0,
            payload: vec![1, 2, 3],
        });
        assert!(out.follow_up.is_none());
        assert!(out.events.is_empty());
    }
}
