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

//! Events delivered to the embedding application.

/// Session-level events. The embedding application renders these; the
/// core never retries or reconnects on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Link established and handshake issued.
    Connected,
    /// Link lost or closed; reconnection is up to the caller.
    Disconnected,
    /// The 8-byte settings struct (alarm, color, brightness, volume)
    /// changed on the device.
    SettingsChanged,
    DisplayModeChanged(u8),
    LockChanged(bool),
    AlarmSoundChanged(String),
    DeviceNameChanged(String),
    /// Color captured by the accessory's sensor, packed 24-bit RGB.
    SensedColor(u32),
    /// Directory listing completed.
    SoundFilesListed(Vec<String>),
    /// License text fully received and decompressed.
    LicenseReady,
    ProtocolVersion(u8),
    /// Fatal link fault, precedes `Disconnected`.
    LinkFailed(String),
}
