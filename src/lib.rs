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

//! Host-side communication core for the alarm-clock accessory.
//!
//! Opens a [`link::Transport`] (USB character device or Bluetooth
//! RFCOMM), runs the framed command protocol over it, and mirrors the
//! device's state for an embedding application. The application drives
//! reconnection; the core never retries on its own.

pub mod config;
pub mod error;
pub mod events;
pub mod link;
pub mod protocol;
pub mod session;
pub mod state;

pub use config::Config;
pub use error::{LinkError, TransportError};
pub use events::DeviceEvent;
pub use link::{Link, LinkState, Transport, TransportKind};
pub use session::DeviceSession;
pub use state::{ConnectionStatus, DeviceState, DeviceValues};
