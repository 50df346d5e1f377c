// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::BytesMut;

use crate::error::RespError;

/// The result of waiting for a response frame: the header's `code` field
/// verbatim (positive payload length or negative peer-reported error), plus
/// whatever payload bytes were actually captured into the caller's buffer.
///
/// `data.len() <= declared payload length`: if the declared length exceeded
/// the buffer capacity the waiter registered, the remainder was discarded
/// by the reader task to preserve framing.
#[derive(Debug, Clone)]
pub struct Response {
    pub code: i32,
    pub data: BytesMut,
}

impl Response {
    pub fn is_error(&self) -> bool {
        self.code < 0
    }

    /// Convert a negative `code` into a [`RespError`]. Returns `None` for a
    /// non-negative (payload-length) code.
    pub fn error(&self) -> Option<RespError> {
        self.is_error().then(|| RespError::from_code(self.code))
    }
}
