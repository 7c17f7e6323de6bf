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

//! Link over a transport: background read loop plus serialized write path.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, error, info, trace, warn};

use super::frame::{FrameDecoder, InboundFrame, OutboundCommand};
use super::transport::{Transport, TransportIo, TransportKind};
use crate::error::LinkError;

/// Link lifecycle: `Closed → Connecting → Open → Closing → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Closed,
    Connecting,
    Open,
    Closing,
}

/// Events the read task forwards to the session.
#[derive(Debug)]
pub enum LinkEvent {
    /// A complete reply frame was decoded.
    Frame(InboundFrame),
    /// The link is down. `error` is `None` on clean end-of-stream or
    /// caller-initiated close.
    Closed { error: Option<LinkError> },
}

/// Owns a transport, exactly one background read task, and the write path.
///
/// Writes are serialized: a command's bytes are fully written before the
/// next command's bytes, because the peripheral expects one command in
/// flight at a time. `close` unblocks the in-flight read by shutting the
/// underlying stream down rather than waiting for the read task to poll
/// a flag.
pub struct Link {
    kind: TransportKind,
    writer: Mutex<WriteHalf<Box<dyn TransportIo>>>,
    state: Arc<RwLock<LinkState>>,
    shutdown: Arc<Notify>,
    write_timeout: Duration,
}

impl Link {
    /// Take ownership of an open transport and spawn the read task.
    ///
    /// Decoded frames and the final closed notification arrive on
    /// `event_tx`. A transport that failed to construct never reaches
    /// this point, so the link transitions straight through `Connecting`
    /// to `Open`.
    pub fn open(
        transport: Transport,
        event_tx: mpsc::Sender<LinkEvent>,
        write_timeout: Duration,
    ) -> Arc<Self> {
        let kind = transport.kind();
        let state = Arc::new(RwLock::new(LinkState::Connecting));
        let shutdown = Arc::new(Notify::new());
        let (reader, writer) = transport.into_split();

        *state.write() = LinkState::Open;
        info!("link open over {}", kind.as_str());

        tokio::spawn(Self::read_loop(
            reader,
            event_tx,
            state.clone(),
            shutdown.clone(),
        ));

        Arc::new(Self {
            kind,
            writer: Mutex::new(writer),
            state,
            shutdown,
            write_timeout,
        })
    }

    pub fn state(&self) -> LinkState {
        *self.state.read()
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Write a command frame, fully or not at all.
    ///
    /// A command carrying the suppress-send sequence sentinel is skipped
    /// without touching the transport. Write errors and timeouts are
    /// fatal: the link starts closing and the error is returned.
    pub async fn send(&self, command: &OutboundCommand) -> Result<(), LinkError> {
        if command.is_suppressed() {
            debug!("suppressed command, opcode {}", command.opcode);
            return Ok(());
        }
        if self.state() != LinkState::Open {
            return Err(LinkError::NotOpen);
        }

        let bytes = command.encode();
        trace!(
            "sending opcode {} seq {} ({} payload byte(s))",
            command.opcode,
            command.sequence,
            command.payload.len()
        );

        let mut writer = self.writer.lock().await;
        let write = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        };
        let result = match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => Err(LinkError::Write(e)),
            Err(_) => Err(LinkError::WriteTimeout),
        };
        drop(writer);

        error!("fatal write failure, closing link");
        self.close().await;
        result
    }

    /// Close the link. Idempotent; safe to call from any task.
    pub async fn close(&self) {
        {
            let mut state = self.state.write();
            if matches!(*state, LinkState::Closing | LinkState::Closed) {
                return;
            }
            *state = LinkState::Closing;
        }
        info!("closing link over {}", self.kind.as_str());

        // notify_one stores a permit for the single read task, so the
        // wakeup is not lost if the task is busy delivering a frame
        // instead of parked in its select when close runs.
        self.shutdown.notify_one();
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("shutdown on close: {}", e);
        }
    }

    async fn read_loop(
        mut reader: ReadHalf<Box<dyn TransportIo>>,
        event_tx: mpsc::Sender<LinkEvent>,
        state: Arc<RwLock<LinkState>>,
        shutdown: Arc<Notify>,
    ) {
        let mut decoder = FrameDecoder::new();
        let mut chunk = [0u8; 4096];

        let error = loop {
            let n = tokio::select! {
                _ = shutdown.notified() => break None,
                res = reader.read(&mut chunk) => match res {
                    Ok(0) => {
                        info!("link closed by remote");
                        break None;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        error!("link read error: {}", e);
                        break Some(LinkError::Read(e));
                    }
                },
            };

            decoder.extend(&chunk[..n]);
            let mut receiver_gone = false;
            while let Some(frame) = decoder.next_frame() {
                trace!(
                    "frame: opcode {} seq {} ({} byte(s))",
                    frame.opcode,
                    frame.sequence,
                    frame.payload.len()
                );
                if event_tx.send(LinkEvent::Frame(frame)).await.is_err() {
                    warn!("frame receiver dropped, stopping read loop");
                    receiver_gone = true;
                    break;
                }
            }
            if receiver_gone {
                break None;
            }
        };

        *state.write() = LinkState::Closed;
        let _ = event_tx.send(LinkEvent::Closed { error }).await;
    }
}
