// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Discard helper used when a declared payload is larger than the buffer a
//! waiter registered, or when a response arrives for a `client_id` nobody is
//! waiting on anymore (an orphan response).

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::RespError;

/// Read and drop `len` bytes from `io` in chunks of at most `chunk_size`,
/// so an oversized or orphaned payload doesn't desynchronize framing for
/// the next command on the wire.
pub async fn discard<R: AsyncRead + Unpin>(
    io: &mut R,
    mut len: usize,
    chunk_size: usize,
) -> Result<(), RespError> {
    if len == 0 {
        return Ok(());
    }
    let chunk_size = chunk_size.max(1);
    let mut scratch = vec![0u8; chunk_size.min(len)];

    while len > 0 {
        let want = len.min(scratch.len());
        let n = io.read(&mut scratch[..want]).await?;
        if n == 0 {
            return Err(RespError::PipeClosed);
        }
        len -= n;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    use super::*;

    #[tokio::test]
    async fn discards_exact_length_in_small_chunks() {
        let (mut a, mut b) = duplex(1024);
        b.write_all(&[9u8; 100]).await.expect("write fixture");

        discard(&mut a, 100, 16).await.expect("discard");

        b.write_all(&[1u8]).await.expect("write marker");
        let mut marker = [0u8; 1];
        a.read_exact(&mut marker).await.expect("read marker");
        assert_eq!(marker, [1u8]);
    }

    #[tokio::test]
    async fn zero_length_is_a_no_op() {
        let (mut a, _b) = duplex(64);
        discard(&mut a, 0, 16).await.expect("no-op discard");
    }

    #[tokio::test]
    async fn closed_peer_yields_pipe_closed() {
        let (mut a, b) = duplex(64);
        drop(b);
        let err = discard(&mut a, 10, 16).await.unwrap_err();
        assert_eq!(err, RespError::PipeClosed);
    }
}
