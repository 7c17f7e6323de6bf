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

//! Accessory command set: opcodes, outbound builders, inbound dispatch.

pub mod commands;
pub mod curve;
pub mod dispatch;

pub use dispatch::{Dispatcher, Outcome};

/// Folder on the accessory's storage holding alarm sounds. Stripped
/// case-insensitively from alarm-file replies.
pub const ALARM_FOLDER: &str = "/Tunes";

/// Message type identifiers, shared between commands and replies.
/// Replies set the high bit over the same value space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    GetProtoVersion = 1,
    GetSensors = 2,
    FileList = 3,
    FileDelete = 4,
    FileOpen = 5,
    FileWrite = 6,
    FileClose = 7,
    GetUniqueId = 8,
    BtName = 9,
    BtPin = 10,
    Time = 11,
    Settings = 12,
    AlarmFile = 13,
    GetLicense = 14,
    DisplayMode = 15,
    Lock = 16,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Opcode::GetProtoVersion,
            2 => Opcode::GetSensors,
            3 => Opcode::FileList,
            4 => Opcode::FileDelete,
            5 => Opcode::FileOpen,
            6 => Opcode::FileWrite,
            7 => Opcode::FileClose,
            8 => Opcode::GetUniqueId,
            9 => Opcode::BtName,
            10 => Opcode::BtPin,
            11 => Opcode::Time,
            12 => Opcode::Settings,
            13 => Opcode::AlarmFile,
            14 => Opcode::GetLicense,
            15 => Opcode::DisplayMode,
            16 => Opcode::Lock,
            _ => return None,
        })
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for value in 1..=16u8 {
            let opcode = Opcode::from_u8(value).unwrap();
            assert_eq!(opcode.as_u8(), value);
        }
        assert_eq!(Opcode::from_u8(0), None);
        assert_eq!(Opcode::from_u8(17), None);
    }
}
