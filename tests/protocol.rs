// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use duplex_responder::{
    ClientHandle, CommandData, CommandHandler, FrameHeader, NullCommandHandler, Opcode,
    RespError, Responder, cfg::config::ResponderConfig, frame,
};
use once_cell::sync::OnceCell;
use tokio::io::{AsyncReadExt, duplex};

/// Echoes a command's payload back as a response on the same `client_id`,
/// via a handle published into `reply_to` once the owning responder exists.
struct EchoHandler {
    reply_to: Arc<OnceCell<ClientHandle>>,
    calls: AtomicUsize,
}

#[async_trait]
impl CommandHandler for EchoHandler {
    async fn handle(
        &self,
        _header: FrameHeader,
        data: &mut CommandData<'_>,
    ) -> Result<(), RespError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let mut payload = vec![0u8; data.declared_len()];
        let mut filled = 0;
        while filled < payload.len() {
            let n = data.read_payload(&mut payload[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        payload.truncate(filled);

        let handle = self.reply_to.get().expect("reply handle published before first frame");
        handle.send_response(payload.len() as i32, Bytes::from(payload)).await?;
        Ok(())
    }
}

/// A handler that replies to every command with a fixed negative error code.
struct FailingHandler {
    reply_to: Arc<OnceCell<ClientHandle>>,
    code: i32,
}

#[async_trait]
impl CommandHandler for FailingHandler {
    async fn handle(
        &self,
        _header: FrameHeader,
        data: &mut CommandData<'_>,
    ) -> Result<(), RespError> {
        let mut scratch = vec![0u8; data.declared_len()];
        if !scratch.is_empty() {
            let _ = data.read_payload(&mut scratch).await?;
        }
        let handle = self.reply_to.get().expect("reply handle published before first frame");
        handle.send_response(self.code, Bytes::new()).await?;
        Ok(())
    }
}

#[tokio::test]
async fn echoes_command_payload_back_through_response() -> Result<()> {
    let (client_io, server_io) = duplex(8192);

    let reply_to = Arc::new(OnceCell::new());
    let handler = Arc::new(EchoHandler { reply_to: reply_to.clone(), calls: AtomicUsize::new(0) });
    let mut server = Responder::from_stream(server_io, handler.clone(), ResponderConfig::default());
    reply_to.set(server.handle_for(1)).expect("set reply handle");

    let mut client =
        Responder::from_stream(client_io, Arc::new(NullCommandHandler), ResponderConfig::default());
    let h = client.create_handle();
    assert_eq!(h.client_id(), 1);

    let payload = Bytes::from_static(b"ping-pong");
    let response = h
        .exec_command(Opcode::Print, 0, payload.len() as i32, payload.clone(), 64)
        .await?;

    assert!(!response.is_error());
    assert_eq!(response.code as usize, payload.len());
    assert_eq!(&response.data[..], &payload[..]);
    assert_eq!(handler.calls.load(Ordering::Relaxed), 1);

    client.shutdown().await;
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn negative_response_code_surfaces_as_resp_error() -> Result<()> {
    let (client_io, server_io) = duplex(4096);

    let reply_to = Arc::new(OnceCell::new());
    let handler = Arc::new(FailingHandler { reply_to: reply_to.clone(), code: -22 });
    let mut server = Responder::from_stream(server_io, handler, ResponderConfig::default());
    reply_to.set(server.handle_for(1)).expect("set reply handle");

    let mut client =
        Responder::from_stream(client_io, Arc::new(NullCommandHandler), ResponderConfig::default());
    let h = client.create_handle();

    let err = h
        .exec_command(Opcode::ReadAttr, 0, 0, Bytes::new(), 32)
        .await
        .expect_err("expected an error response");
    assert_eq!(err, RespError::InvalidArgument);

    client.shutdown().await;
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn get_and_request_response_reregisters_between_consecutive_replies() -> Result<()> {
    let (client_io, server_io) = duplex(8192);

    let reply_to = Arc::new(OnceCell::new());
    let handler = Arc::new(EchoHandler { reply_to: reply_to.clone(), calls: AtomicUsize::new(0) });
    let mut server = Responder::from_stream(server_io, handler.clone(), ResponderConfig::default());
    reply_to.set(server.handle_for(1)).expect("set reply handle");

    let mut client =
        Responder::from_stream(client_io, Arc::new(NullCommandHandler), ResponderConfig::default());
    let h = client.create_handle();
    assert_eq!(h.client_id(), 1);

    // First receive is registered the ordinary way, then the reply and the
    // next registration happen back to back via get_and_request_response,
    // with no caller code running between "consume the first reply" and
    // "listen for the second" the way two separate calls would allow.
    let first_payload = Bytes::from_static(b"first");
    let rx = h.request_response(64);
    h.send_command(Opcode::Print, 0, first_payload.len() as i32, first_payload.clone()).await?;
    let (first, rx) = h.get_and_request_response(rx, 64).await;
    let first = first?;
    assert_eq!(&first.data[..], &first_payload[..]);

    let second_payload = Bytes::from_static(b"second-reply");
    h.send_command(Opcode::Print, 0, second_payload.len() as i32, second_payload.clone()).await?;
    let second = ClientHandle::wait_for_response(rx).await?;
    assert_eq!(&second.data[..], &second_payload[..]);

    assert_eq!(handler.calls.load(Ordering::Relaxed), 2);

    client.shutdown().await;
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn oversized_response_is_truncated_to_waiter_capacity_and_framing_survives() -> Result<()> {
    let (mut peer, responder_io) = duplex(8192);
    let mut responder = Responder::from_stream(
        responder_io,
        Arc::new(NullCommandHandler),
        ResponderConfig::default(),
    );

    let first = responder.create_handle();
    assert_eq!(first.client_id(), 1);
    let rx = first.request_response(4);

    let full_payload = vec![0xABu8; 32];
    let header = FrameHeader { client_id: 1, op: 0, dev: 0, code: full_payload.len() as i32 };
    let header_bytes = header.to_bytes();
    frame::write_vectored(&mut peer, vec![&header_bytes[..], &full_payload[..]]).await?;

    let response = ClientHandle::wait_for_response(rx).await?;
    assert_eq!(response.data.len(), 4);
    assert_eq!(&response.data[..], &full_payload[..4]);

    // A second frame written right after must still be parsed correctly,
    // proving the 28 undelivered bytes were discarded rather than left on
    // the wire to desynchronize the next header. The waiter is registered
    // before the frame is written so the response can't race in as an
    // orphan.
    let second = responder.create_handle();
    let marker_rx = second.request_response(8);
    let marker_payload = b"ok";
    let marker =
        FrameHeader { client_id: second.client_id(), op: 0, dev: 0, code: marker_payload.len() as i32 };
    let marker_bytes = marker.to_bytes();
    frame::write_vectored(&mut peer, vec![&marker_bytes[..], &marker_payload[..]]).await?;

    let marker_response = ClientHandle::wait_for_response(marker_rx).await?;
    assert_eq!(&marker_response.data[..], &marker_payload[..]);

    responder.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn concurrent_sends_are_serialized_without_corrupting_frames() -> Result<()> {
    let (mut peer, responder_io) = duplex(1 << 16);
    let mut responder = Responder::from_stream(
        responder_io,
        Arc::new(NullCommandHandler),
        ResponderConfig::default(),
    );

    let handles: Vec<ClientHandle> = (0..8).map(|_| responder.create_handle()).collect();
    let tasks: Vec<_> = handles
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.clone();
            let payload = Bytes::from(vec![i as u8; 16]);
            tokio::spawn(async move { h.send_command(Opcode::Print, 0, 16, payload).await })
        })
        .collect();
    for task in tasks {
        task.await.expect("task should not panic").expect("send should succeed");
    }

    let mut seen = vec![false; handles.len()];
    for _ in 0..handles.len() {
        let mut hdr_buf = [0u8; 8];
        peer.read_exact(&mut hdr_buf).await?;
        let header = FrameHeader::from_bytes(&hdr_buf);
        assert_eq!(header.op, u8::from(Opcode::Print));
        assert_eq!(header.code, 16);

        let mut payload = [0u8; 16];
        peer.read_exact(&mut payload).await?;
        assert!(payload.iter().all(|&b| b == payload[0]));
        let idx = payload[0] as usize;
        assert!(!seen[idx], "frame for client {idx} delivered twice");
        seen[idx] = true;
    }
    assert!(seen.into_iter().all(|s| s), "every concurrent send should be observed exactly once");

    responder.shutdown().await;
    Ok(())
}
