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

//! Transport abstraction over the USB accessory and Bluetooth RFCOMM links.

use bluer::rfcomm::{Profile, Role, SocketAddr, Stream};
use bluer::{Address, Session};
use futures::StreamExt;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::TransportError;

/// Service UUID the accessory registers for its RFCOMM channel.
pub const ACCESSORY_SERVICE_UUID: Uuid = Uuid::from_u128(0x1dd35050_a437_11e1_b3dd_0800200c9a66);

/// Client profile registered with bluetoothd for the SDP-resolved
/// connect.
fn accessory_profile() -> Profile {
    Profile {
        uuid: ACCESSORY_SERVICE_UUID,
        role: Some(Role::Client),
        auto_connect: Some(false),
        ..Default::default()
    }
}

/// Byte-duplex stream a transport is built on.
pub trait TransportIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> TransportIo for T {}

/// Which concrete link a transport runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Usb,
    Bluetooth,
    /// In-memory stream, used by tests.
    Memory,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Usb => "usb",
            TransportKind::Bluetooth => "bluetooth",
            TransportKind::Memory => "memory",
        }
    }
}

/// An open duplex channel to the accessory.
///
/// The transport knows nothing about framing; it is consumed by a `Link`,
/// which splits it into its read and write halves. Construction either
/// yields a fully usable transport or an error, never a half-open one.
pub struct Transport {
    kind: TransportKind,
    io: Box<dyn TransportIo>,
}

impl Transport {
    /// Open the USB accessory character device.
    pub async fn usb(device: &Path) -> Result<Self, TransportError> {
        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .await?;
        info!("opened usb accessory device {}", device.display());
        Ok(Self {
            kind: TransportKind::Usb,
            io: Box::new(file),
        })
    }

    /// Connect to the accessory's RFCOMM service.
    ///
    /// The channel is resolved over SDP from the well-known service
    /// UUID; `fallback_channel` is only used when the profile-based
    /// connect is unavailable (no bluetoothd, no SDP record).
    pub async fn bluetooth(
        address: Address,
        fallback_channel: u8,
    ) -> Result<Self, TransportError> {
        let stream = match Self::connect_service(address).await {
            Ok(stream) => {
                info!("connected rfcomm profile on {}", address);
                stream
            }
            Err(e) => {
                warn!(
                    "profile connect to {} failed ({}), trying channel {}",
                    address, e, fallback_channel
                );
                let target = SocketAddr::new(address, fallback_channel);
                Stream::connect(target).await?
            }
        };
        Ok(Self {
            kind: TransportKind::Bluetooth,
            io: Box::new(stream),
        })
    }

    /// Resolve and connect the accessory service by UUID. bluetoothd
    /// looks the channel up in the remote SDP record and hands the
    /// connected socket to our client profile.
    async fn connect_service(address: Address) -> Result<Stream, TransportError> {
        let session = Session::new().await?;
        let adapter = session.default_adapter().await?;
        let device = adapter.device(address)?;

        let mut profile = session.register_profile(accessory_profile()).await?;
        let connect = device.connect_profile(&ACCESSORY_SERVICE_UUID);
        tokio::pin!(connect);

        // The connection request lands on the profile handle while the
        // ConnectProfile call is still in flight; accepting it is what
        // lets the call complete.
        let request = tokio::select! {
            req = profile.next() => req.ok_or(TransportError::NoProfileConnection)?,
            res = &mut connect => {
                res?;
                profile
                    .next()
                    .await
                    .ok_or(TransportError::NoProfileConnection)?
            }
        };
        Ok(request.accept()?)
    }

    /// Wrap an already-open stream. Used by tests to run the link over an
    /// in-memory duplex pipe.
    pub fn from_io(io: impl TransportIo + 'static) -> Self {
        Self {
            kind: TransportKind::Memory,
            io: Box::new(io),
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Split into independently owned read and write halves.
    pub fn into_split(
        self,
    ) -> (
        ReadHalf<Box<dyn TransportIo>>,
        WriteHalf<Box<dyn TransportIo>>,
    ) {
        tokio::io::split(self.io)
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").field("kind", &self.kind).finish()
    }
}
