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

//! Outbound command builders.
//!
//! The default sequence value mirrors the opcode, matching the accessory's
//! established request tagging. A get/set opcode with an empty payload is
//! a query; the device replies with the current value.

use chrono::Utc;

use super::Opcode;
use crate::link::OutboundCommand;

/// Lock payload value for a locked device.
pub const LOCK_LOCKED: u8 = 2;
/// Lock payload value for an unlocked device. 1 is reserved and means
/// "no change" in replies.
pub const LOCK_UNLOCKED: u8 = 0;

fn command(opcode: Opcode, payload: Vec<u8>) -> OutboundCommand {
    OutboundCommand::new(opcode.as_u8(), opcode.as_u8(), payload)
}

fn path_payload(path: &str) -> Vec<u8> {
    let mut payload = path.as_bytes().to_vec();
    payload.push(0);
    payload
}

/// Query the current value for a get/set opcode.
pub fn query(opcode: Opcode) -> OutboundCommand {
    command(opcode, Vec::new())
}

/// Pack the 8-byte settings struct:
/// `[hour, minute, alarm_on, brightness, r, g, b, volume]`.
/// `alarm_time` is minutes since midnight; `color` is packed 24-bit RGB.
pub fn settings(
    alarm_time: u16,
    alarm_on: bool,
    brightness: u8,
    color: u32,
    volume: u8,
) -> OutboundCommand {
    command(
        Opcode::Settings,
        vec![
            (alarm_time / 60) as u8,
            (alarm_time % 60) as u8,
            alarm_on as u8,
            brightness,
            (color >> 16) as u8,
            (color >> 8) as u8,
            color as u8,
            volume,
        ],
    )
}

pub fn lock(locked: bool) -> OutboundCommand {
    let value = if locked { LOCK_LOCKED } else { LOCK_UNLOCKED };
    command(Opcode::Lock, vec![value])
}

pub fn display_mode(mode: u8) -> OutboundCommand {
    command(Opcode::DisplayMode, vec![mode])
}

pub fn alarm_file(path: &str) -> OutboundCommand {
    command(Opcode::AlarmFile, path_payload(path))
}

pub fn bt_name(name: &str) -> OutboundCommand {
    command(Opcode::BtName, path_payload(name))
}

pub fn bt_pin(pin: &str) -> OutboundCommand {
    command(Opcode::BtPin, path_payload(pin))
}

/// Set the accessory clock, little-endian unix seconds.
pub fn set_time(unix_seconds: u32) -> OutboundCommand {
    command(Opcode::Time, unix_seconds.to_le_bytes().to_vec())
}

/// Set the accessory clock from host time.
pub fn set_time_now() -> OutboundCommand {
    set_time(Utc::now().timestamp() as u32)
}

/// Start (or continue) a directory listing. The device paginates: it
/// returns one entry per request until an empty reply.
pub fn file_list(path: &str) -> OutboundCommand {
    command(Opcode::FileList, path_payload(path))
}

pub fn file_delete(path: &str) -> OutboundCommand {
    command(Opcode::FileDelete, path_payload(path))
}

pub fn file_open(path: &str) -> OutboundCommand {
    command(Opcode::FileOpen, path_payload(path))
}

pub fn file_write(data: &[u8]) -> OutboundCommand {
    command(Opcode::FileWrite, data.to_vec())
}

pub fn file_close() -> OutboundCommand {
    command(Opcode::FileClose, Vec::new())
}
