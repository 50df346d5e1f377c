// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire framing: the fixed 8-byte command header plus the scatter/gather
//! helpers used to read and write it (and its payload) over an arbitrary
//! `AsyncRead`/`AsyncWrite` half.
//!
//! The header layout is host-endian: this protocol targets a trusted,
//! same-host or otherwise homogeneous link, not cross-architecture wire
//! compatibility.
//!
//! ```text
//! offset 0  u16 client_id
//! offset 2  u8  op
//! offset 3  u8  dev
//! offset 4  i32 code
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::RespError;

/// Size in bytes of a serialized [`FrameHeader`].
pub const HEADER_LEN: usize = 8;

/// Maximum number of scatter/gather descriptors accepted per call. A caller
/// that needs more is a caller bug.
pub const MAX_DESCRIPTORS: usize = 32;

/// The fixed 8-byte command/response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    /// Demultiplexing key identifying the client this frame belongs to.
    pub client_id: u16,
    /// Opcode, see [`crate::opcode::Opcode`].
    pub op: u8,
    /// Device index, opaque to the responder.
    pub dev: u8,
    /// On request: opcode-specific argument. On response: payload byte
    /// count if `>= 0`, or a negative error code.
    pub code: i32,
}

impl FrameHeader {
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..2].copy_from_slice(&self.client_id.to_ne_bytes());
        buf[2] = self.op;
        buf[3] = self.dev;
        buf[4..8].copy_from_slice(&self.code.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_LEN]) -> Self {
        Self {
            client_id: u16::from_ne_bytes([buf[0], buf[1]]),
            op: buf[2],
            dev: buf[3],
            code: i32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }

    /// True if `code` should be interpreted as a payload byte count rather
    /// than a negative error code (only meaningful on response frames).
    pub const fn has_payload(self) -> bool {
        self.code > 0
    }
}

/// Read every descriptor in `segments` to completion, advancing through
/// partial reads until each segment is fully filled or the byte cap is hit.
///
/// `byte_cap`, if `Some`, truncates the overall read so it never consumes
/// more than that many bytes in total, stopping as soon as the cap is
/// reached (used when a waiter's buffer is smaller than the declared
/// response length).
///
/// Returns the total number of bytes read, [`RespError::InvalidArgument`] if
/// `segments` is empty or exceeds [`MAX_DESCRIPTORS`], or
/// [`RespError::PipeClosed`] on a zero-length read (peer closed).
pub async fn read_vectored<R: AsyncRead + Unpin>(
    io: &mut R,
    mut segments: Vec<&mut [u8]>,
    byte_cap: Option<usize>,
) -> Result<usize, RespError> {
    if segments.is_empty() || segments.len() > MAX_DESCRIPTORS {
        return Err(RespError::InvalidArgument);
    }

    let mut total = 0usize;
    let mut remaining_cap = byte_cap;
    let mut idx = 0;

    while idx < segments.len() {
        if remaining_cap == Some(0) {
            break;
        }

        let seg = &mut segments[idx];
        if seg.is_empty() {
            idx += 1;
            continue;
        }

        let want = match remaining_cap {
            Some(cap) => cap.min(seg.len()),
            None => seg.len(),
        };

        let n = io.read(&mut seg[..want]).await?;
        if n == 0 {
            return Err(RespError::PipeClosed);
        }

        total += n;
        if let Some(cap) = remaining_cap.as_mut() {
            *cap -= n;
        }

        let taken = std::mem::take(seg);
        *seg = &mut taken[n..];
        if seg.is_empty() {
            idx += 1;
        }
    }

    Ok(total)
}

/// Write every descriptor in `segments` to completion, advancing through
/// partial writes until the whole gather list has been emitted.
/// There is no byte cap on the write side: the whole gather list is always
/// fully emitted before the call returns, and no bytes from a later call are
/// ever interleaved with this one (the caller holds exclusive access to the
/// write half for the duration).
pub async fn write_vectored<W: AsyncWrite + Unpin>(
    io: &mut W,
    mut segments: Vec<&[u8]>,
) -> Result<usize, RespError> {
    if segments.is_empty() || segments.len() > MAX_DESCRIPTORS {
        return Err(RespError::InvalidArgument);
    }

    let mut total = 0usize;
    let mut idx = 0;

    while idx < segments.len() {
        let seg = &mut segments[idx];
        if seg.is_empty() {
            idx += 1;
            continue;
        }

        let n = io.write(seg).await?;
        if n == 0 {
            return Err(RespError::PipeClosed);
        }

        total += n;
        *seg = &seg[n..];
        if seg.is_empty() {
            idx += 1;
        }
    }

    io.flush().await?;

    Ok(total)
}
