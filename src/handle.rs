// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-client handle returned by [`crate::responder::Responder::create_handle`].
//!
//! A handle owns one `client_id` and lets an application send commands,
//! send responses, and wait for a matching response, without touching the
//! reader/writer tasks directly.

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::{
    error::RespError,
    frame::FrameHeader,
    opcode::Opcode,
    queue::{CleanupCb, Waiter, WaiterOutcome, WriteJob, WriteQueue},
    response::Response,
};

/// A single demultiplexed conversation with the peer, identified by
/// `client_id`. Cloning a handle is cheap (it's a thin wrapper over shared
/// `Arc`-owned state) and every clone shares the same `client_id`.
#[derive(Clone)]
pub struct ClientHandle {
    client_id: u16,
    waiters: std::sync::Arc<dashmap::DashMap<u16, Waiter>>,
    write_queue: std::sync::Arc<WriteQueue>,
}

impl ClientHandle {
    pub(crate) fn new(
        client_id: u16,
        waiters: std::sync::Arc<dashmap::DashMap<u16, Waiter>>,
        write_queue: std::sync::Arc<WriteQueue>,
    ) -> Self {
        Self { client_id, waiters, write_queue }
    }

    pub fn client_id(&self) -> u16 {
        self.client_id
    }

    /// Enqueue a command frame for the writer task and return a receiver
    /// that resolves once it has actually been written (or failed).
    fn enqueue(
        &self,
        op: Opcode,
        dev: u8,
        code: i32,
        payload: Bytes,
        cleanup: Option<CleanupCb>,
    ) -> oneshot::Receiver<Result<usize, RespError>> {
        let (tx, rx) = oneshot::channel();
        let header = FrameHeader { client_id: self.client_id, op: op.into(), dev, code };
        self.write_queue.push(WriteJob { header, payload, completion: tx, cleanup });
        rx
    }

    /// Queue a command frame and return immediately with a completion
    /// receiver, without blocking on the writer task.
    pub fn send_command_async(
        &self,
        op: Opcode,
        dev: u8,
        code: i32,
        payload: Bytes,
    ) -> oneshot::Receiver<Result<usize, RespError>> {
        self.enqueue(op, dev, code, payload, None)
    }

    /// Block until a previously-queued send completes.
    pub async fn wait_for_command_done(
        rx: oneshot::Receiver<Result<usize, RespError>>,
    ) -> Result<usize, RespError> {
        rx.await.map_err(|_| RespError::PipeClosed)?
    }

    /// Queue a command frame and wait for it to be written.
    pub async fn send_command(
        &self,
        op: Opcode,
        dev: u8,
        code: i32,
        payload: Bytes,
    ) -> Result<usize, RespError> {
        Self::wait_for_command_done(self.send_command_async(op, dev, code, payload)).await
    }

    /// Queue a response frame (`op = Response`) and return immediately.
    pub fn send_response_async(
        &self,
        code: i32,
        payload: Bytes,
    ) -> oneshot::Receiver<Result<usize, RespError>> {
        self.enqueue(Opcode::Response, 0, code, payload, None)
    }

    /// Queue a response frame and wait for it to be written.
    pub async fn send_response(&self, code: i32, payload: Bytes) -> Result<usize, RespError> {
        Self::wait_for_command_done(self.send_response_async(code, payload)).await
    }

    /// Register interest in the next response frame addressed to this
    /// `client_id`, with a buffer capacity of `capacity` bytes. Returns a
    /// receiver that resolves once the reader task delivers (or fails) it.
    ///
    /// Registering twice for the same `client_id` before the first
    /// registration resolves replaces the earlier waiter, which is then
    /// never woken — callers should await or cancel before re-registering.
    pub fn request_response(&self, capacity: usize) -> oneshot::Receiver<WaiterOutcome> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(
            self.client_id,
            Waiter { capacity, completion: tx, cleanup: None },
        );
        rx
    }

    /// Block until the registered waiter resolves.
    pub async fn wait_for_response(
        rx: oneshot::Receiver<WaiterOutcome>,
    ) -> Result<Response, RespError> {
        match rx.await.map_err(|_| RespError::PipeClosed)? {
            WaiterOutcome::Response(resp) => Ok(resp),
            WaiterOutcome::Err(e) => Err(e),
        }
    }

    /// Register a waiter and block until it resolves, in one call.
    pub async fn get_response(&self, capacity: usize) -> Result<Response, RespError> {
        Self::wait_for_response(self.request_response(capacity)).await
    }

    /// Register a response waiter, send the command, then wait for the
    /// reply and return it. Registering before sending closes the race
    /// where a fast peer answers before the waiter exists.
    pub async fn exec_command(
        &self,
        op: Opcode,
        dev: u8,
        code: i32,
        payload: Bytes,
        capacity: usize,
    ) -> Result<Response, RespError> {
        let response_rx = self.request_response(capacity);
        if let Err(e) = self.send_command(op, dev, code, payload).await {
            self.cancel();
            return Err(e);
        }
        Self::wait_for_response(response_rx).await
    }

    /// Complete an outstanding receive and register the next waiter in the
    /// same step, for streaming request/response patterns where a caller
    /// doing this as two separate calls would leave a gap in which a reply
    /// could arrive unwaited and be discarded as an orphan. Does not send
    /// anything; pair it with [`Self::send_command`] as needed.
    pub async fn get_and_request_response(
        &self,
        pending: oneshot::Receiver<WaiterOutcome>,
        next_capacity: usize,
    ) -> (Result<Response, RespError>, oneshot::Receiver<WaiterOutcome>) {
        let completed = Self::wait_for_response(pending).await;
        let next_rx = self.request_response(next_capacity);
        (completed, next_rx)
    }

    /// Cancel this handle's outstanding response waiter and any of its
    /// queued-but-not-yet-written sends. A waiter or send already completed
    /// (or already in flight on the wire) is unaffected: cancellation and
    /// completion race exactly once, never both.
    pub fn cancel(&self) {
        self.waiters.remove(&self.client_id);
        self.write_queue.cancel(self.client_id);
    }
}
