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

//! Wire framing for the accessory protocol.
//!
//! Frame format, all integers little-endian:
//! - OPCODE (1 byte): command opcode; replies set the high bit
//! - SEQUENCE (1 byte): caller-chosen tag echoed by the device
//! - LENGTH (2 bytes): payload length, low byte first
//! - PAYLOAD (LENGTH bytes)

use tracing::trace;

/// High bit marking an inbound byte as the start of a reply frame.
pub const REPLY_FLAG: u8 = 0x80;

/// Sentinel sequence value meaning "do not transmit this command".
pub const SEQUENCE_NONE: u8 = 0xFF;

/// Size of the opcode/sequence/length header.
pub const HEADER_LEN: usize = 4;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// A command to be written to the accessory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    pub opcode: u8,
    pub sequence: u8,
    pub payload: Vec<u8>,
}

impl OutboundCommand {
    /// Create a new command. The payload must fit the 16-bit length field.
    pub fn new(opcode: u8, sequence: u8, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);
        Self {
            opcode,
            sequence,
            payload,
        }
    }

    /// Whether this command carries the suppress-send sentinel and must
    /// be skipped by the write path.
    pub fn is_suppressed(&self) -> bool {
        self.sequence == SEQUENCE_NONE
    }

    /// Encode into wire bytes: header followed by payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.push(self.opcode);
        buf.push(self.sequence);
        let len = self.payload.len() as u16;
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// A decoded reply frame. The reply flag has been stripped from the opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub opcode: u8,
    pub sequence: u8,
    pub payload: Vec<u8>,
}

/// Incremental decoder over an accumulation buffer.
///
/// Bytes are appended as they arrive from the transport; complete frames
/// are drained off the front. A byte without the reply flag at a frame
/// boundary is line noise and is skipped silently. A frame whose payload
/// has not fully arrived consumes nothing until the rest shows up.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Try to decode the next complete frame.
    ///
    /// Returns `None` when the buffer holds no complete frame; already
    /// buffered partial-frame bytes are retained for the next read.
    pub fn next_frame(&mut self) -> Option<InboundFrame> {
        let mut pos = 0;
        let frame = loop {
            let Some(&head) = self.buf.get(pos) else {
                break None;
            };
            if head & REPLY_FLAG == 0 {
                // Resynchronization slop from the device; skip one byte.
                pos += 1;
                continue;
            }
            if self.buf.len() - pos < HEADER_LEN {
                break None;
            }
            let len = u16::from_le_bytes([self.buf[pos + 2], self.buf[pos + 3]]) as usize;
            if self.buf.len() - pos < HEADER_LEN + len {
                break None;
            }
            let start = pos + HEADER_LEN;
            let frame = InboundFrame {
                opcode: head & !REPLY_FLAG,
                sequence: self.buf[pos + 1],
                payload: self.buf[start..start + len].to_vec(),
            };
            pos = start + len;
            break Some(frame);
        };

        if pos > 0 {
            if frame.is_none() {
                trace!("skipped {} noise byte(s)", pos);
            }
            self.buf.drain(..pos);
        }
        frame
    }
}
