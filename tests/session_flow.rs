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

//! End-to-end session tests against a scripted in-memory device.

use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

use clocklink::config::LinkConfig;
use clocklink::events::DeviceEvent;
use clocklink::link::{Transport, REPLY_FLAG};
use clocklink::session::DeviceSession;
use clocklink::state::{ConnectionStatus, DeviceState};

async fn read_command(device: &mut DuplexStream) -> (u8, u8, Vec<u8>) {
    let mut header = [0u8; 4];
    device.read_exact(&mut header).await.unwrap();
    let len = u16::from_le_bytes([header[2], header[3]]) as usize;
    let mut payload = vec![0u8; len];
    device.read_exact(&mut payload).await.unwrap();
    (header[0], header[1], payload)
}

async fn write_reply(device: &mut DuplexStream, opcode: u8, payload: &[u8]) {
    let mut frame = vec![
        opcode | REPLY_FLAG,
        opcode,
        (payload.len() & 0xFF) as u8,
        (payload.len() >> 8) as u8,
    ];
    frame.extend_from_slice(payload);
    device.write_all(&frame).await.unwrap();
}

async fn start_session() -> (
    Arc<DeviceSession>,
    Arc<DeviceState>,
    mpsc::Receiver<DeviceEvent>,
    DuplexStream,
) {
    let (host, device) = tokio::io::duplex(4096);
    let state = DeviceState::new();
    let (event_tx, event_rx) = mpsc::channel(32);
    let config = LinkConfig {
        // Echo window zeroed so replies apply immediately in tests.
        echo_window_ms: 0,
        ..LinkConfig::default()
    };
    let session = DeviceSession::connect(
        Transport::from_io(host),
        &config,
        state.clone(),
        event_tx,
    )
    .await
    .unwrap();
    (session, state, event_rx, device)
}

async fn expect_event(rx: &mut mpsc::Receiver<DeviceEvent>, wanted: DeviceEvent) {
    loop {
        let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if event == wanted {
            return;
        }
    }
}

#[tokio::test]
async fn test_handshake_queries_everything() {
    let (_session, state, mut event_rx, mut device) = start_session().await;
    assert_eq!(state.status(), ConnectionStatus::Connected);
    expect_event(&mut event_rx, DeviceEvent::Connected).await;

    // Proto version, unique id, settings, display mode, lock, name,
    // alarm file, then the directory listing kick-off.
    let mut opcodes = Vec::new();
    for _ in 0..8 {
        let (opcode, sequence, payload) = read_command(&mut device).await;
        assert_eq!(opcode, sequence);
        if opcode == 3 {
            // File list carries the folder path.
            assert_eq!(payload, b"/Tunes\0");
        } else {
            assert!(payload.is_empty());
        }
        opcodes.push(opcode);
    }
    assert_eq!(opcodes, vec![1, 8, 12, 15, 16, 9, 13, 3]);
}

#[tokio::test]
async fn test_settings_reply_updates_state() {
    let (_session, state, mut event_rx, mut device) = start_session().await;

    write_reply(&mut device, 12, &[7, 15, 1, 200, 0x12, 0x34, 0x56, 90]).await;
    expect_event(&mut event_rx, DeviceEvent::SettingsChanged).await;

    let values = state.snapshot();
    assert_eq!(values.alarm_time, 7 * 60 + 15);
    assert!(values.alarm_on);
    assert_eq!(values.brightness, 200);
    assert_eq!(values.color, 0x123456);
    assert_eq!(values.volume, 90);
}

#[tokio::test]
async fn test_file_list_pagination_round_trip() {
    let (_session, state, mut event_rx, mut device) = start_session().await;

    // Drain the handshake, remembering the original listing request.
    let mut list_request = None;
    for _ in 0..8 {
        let (opcode, _, payload) = read_command(&mut device).await;
        if opcode == 3 {
            list_request = Some(payload);
        }
    }
    let list_request = list_request.expect("handshake issued no listing");

    for name in ["chime.ogg", "birds.ogg"] {
        let mut payload = vec![0u8; 5];
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        write_reply(&mut device, 3, &payload).await;

        // Each entry triggers an identical follow-up request.
        let (opcode, _, payload) = read_command(&mut device).await;
        assert_eq!(opcode, 3);
        assert_eq!(payload, list_request);
    }
    write_reply(&mut device, 3, &[0]).await;

    expect_event(
        &mut event_rx,
        DeviceEvent::SoundFilesListed(vec!["chime.ogg".to_string(), "birds.ogg".to_string()]),
    )
    .await;
    assert_eq!(
        state.snapshot().sound_files,
        vec!["chime.ogg".to_string(), "birds.ogg".to_string()]
    );
}

#[tokio::test]
async fn test_set_alarm_pushes_full_settings_struct() {
    let (session, _state, _event_rx, mut device) = start_session().await;

    for _ in 0..8 {
        read_command(&mut device).await;
    }

    session.set_alarm(390, true).await.unwrap();
    let (opcode, _, payload) = read_command(&mut device).await;
    assert_eq!(opcode, 12);
    assert_eq!(payload.len(), 8);
    assert_eq!(&payload[..3], &[6, 30, 1]);
}

#[tokio::test]
async fn test_device_drop_reports_disconnected() {
    let (session, state, mut event_rx, device) = start_session().await;
    expect_event(&mut event_rx, DeviceEvent::Connected).await;

    drop(device);
    expect_event(&mut event_rx, DeviceEvent::Disconnected).await;
    assert_eq!(state.status(), ConnectionStatus::Disconnected);
    assert!(!session.is_open());
}
