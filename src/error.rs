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

//! Error types for the transport and link layers.

use thiserror::Error;

/// Failure to construct or use a transport.
///
/// All transport errors are fatal to the link that owns the transport;
/// the core never retries them on its own.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Opening the USB accessory device node failed.
    #[error("failed to open accessory device: {0}")]
    Open(#[from] std::io::Error),

    /// Connecting the RFCOMM socket failed.
    #[error("bluetooth connect failed: {0}")]
    Bluetooth(#[from] bluer::Error),

    /// The profile-based connect resolved without delivering a
    /// connection request.
    #[error("profile connect yielded no rfcomm connection")]
    NoProfileConnection,
}

/// Failure on an open link.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The link is not in the `Open` state.
    #[error("link is not open")]
    NotOpen,

    /// The background read task observed an I/O error.
    #[error("link read failed: {0}")]
    Read(#[source] std::io::Error),

    /// Writing a full command frame failed. The command is not retried;
    /// resending a half-delivered command could desynchronize the
    /// peripheral's sequence tracking.
    #[error("link write failed: {0}")]
    Write(#[source] std::io::Error),

    /// A write did not complete within the configured bound.
    #[error("link write timed out")]
    WriteTimeout,
}
