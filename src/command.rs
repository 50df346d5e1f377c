// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Dispatch for inbound non-`RESPONSE` frames.

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::{error::RespError, frame::FrameHeader};

/// Handle granting the right to pull a command's declared payload exactly
/// once.
pub struct CommandData<'a> {
    io: &'a mut (dyn AsyncRead + Unpin + Send),
    remaining: usize,
}

impl<'a> CommandData<'a> {
    pub(crate) fn new(io: &'a mut (dyn AsyncRead + Unpin + Send), code: i32) -> Self {
        Self { io, remaining: code.max(0) as usize }
    }

    /// Number of payload bytes the peer declared for this command.
    pub fn declared_len(&self) -> usize {
        self.remaining
    }

    /// Bytes the handler has not yet pulled via [`Self::read_payload`].
    pub(crate) fn unread(&self) -> usize {
        self.remaining
    }

    /// Read the command's additional data into `buf`. May be called
    /// repeatedly until [`CommandData::declared_len`] bytes have been
    /// consumed; reading more than was declared is a caller error.
    pub async fn read_payload(&mut self, buf: &mut [u8]) -> Result<usize, RespError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(self.remaining);
        if want == 0 {
            return Ok(0);
        }

        let n = crate::frame::read_vectored(self.io, vec![&mut buf[..want]], None)
            .await?;
        self.remaining -= n;
        Ok(n)
    }
}

/// User-supplied dispatcher for inbound frames whose `op != Response`.
///
/// Implementations are free to ignore opcodes they don't understand; the
/// responder does not interpret `FrameHeader::op` beyond "is it a response".
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    async fn handle(
        &self,
        header: FrameHeader,
        data: &mut CommandData<'_>,
    ) -> Result<(), RespError>;
}

/// A [`CommandHandler`] that discards every inbound command's payload and
/// takes no action. Useful for responders that only ever issue commands and
/// never receive unsolicited ones.
pub struct NullCommandHandler;

#[async_trait]
impl CommandHandler for NullCommandHandler {
    async fn handle(
        &self,
        _header: FrameHeader,
        data: &mut CommandData<'_>,
    ) -> Result<(), RespError> {
        let mut scratch = [0u8; 256];
        let mut remaining = data.declared_len();
        while remaining > 0 {
            let want = remaining.min(scratch.len());
            let n = data.read_payload(&mut scratch[..want]).await?;
            if n == 0 {
                break;
            }
            remaining -= n;
        }
        Ok(())
    }
}
