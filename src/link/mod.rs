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

//! Accessory link: transport abstraction, wire framing, and the read loop.

mod connection;
pub mod frame;
mod transport;

pub use connection::{Link, LinkEvent, LinkState};
pub use frame::{FrameDecoder, InboundFrame, OutboundCommand, REPLY_FLAG, SEQUENCE_NONE};
pub use transport::{Transport, TransportIo, TransportKind, ACCESSORY_SERVICE_UUID};
