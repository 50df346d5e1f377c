// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::io;

use thiserror::Error;

/// POSIX-flavored error taxonomy for the responder.
///
/// Inbound `RESPONSE` frames carry a negative `code` on failure; these
/// variants round-trip through [`RespError::from_code`] / [`RespError::to_code`]
/// so a peer's error can be reported as a small integer on the wire and
/// matched on as a proper enum locally.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RespError {
    #[error("resource busy")]
    Busy,
    #[error("bad file descriptor")]
    BadFileDescriptor,
    #[error("transport closed")]
    PipeClosed,
    #[error("I/O error")]
    Io,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("operation timed out")]
    TimedOut,
    #[error("no such device")]
    NoSuchDevice,
    #[error("interrupted")]
    Interrupted,
    #[error("out of memory")]
    OutOfMemory,
    #[error("operation not supported")]
    NotImplemented,
    #[error("unrecognized error code {0}")]
    Unknown(i32),
}

impl RespError {
    /// Map a negative `code` carried by an inbound response frame to a
    /// [`RespError`]. `code` must be `< 0`; callers are expected to have
    /// already branched on `code >= 0` meaning "payload length".
    pub fn from_code(code: i32) -> Self {
        let errno = -code;
        if errno == Self::EBUSY {
            Self::Busy
        } else if errno == Self::EBADF {
            Self::BadFileDescriptor
        } else if errno == Self::EPIPE {
            Self::PipeClosed
        } else if errno == Self::EIO {
            Self::Io
        } else if errno == Self::EINVAL {
            Self::InvalidArgument
        } else if errno == Self::ETIMEDOUT {
            Self::TimedOut
        } else if errno == Self::ENODEV {
            Self::NoSuchDevice
        } else if errno == Self::EINTR {
            Self::Interrupted
        } else if errno == Self::ENOMEM {
            Self::OutOfMemory
        } else if errno == Self::ENOSYS {
            Self::NotImplemented
        } else {
            Self::Unknown(code)
        }
    }

    /// Map a [`RespError`] to the small negative integer that would be
    /// carried in a response frame's `code` field.
    pub fn to_code(self) -> i32 {
        -match self {
            Self::Busy => Self::EBUSY,
            Self::BadFileDescriptor => Self::EBADF,
            Self::PipeClosed => Self::EPIPE,
            Self::Io => Self::EIO,
            Self::InvalidArgument => Self::EINVAL,
            Self::TimedOut => Self::ETIMEDOUT,
            Self::NoSuchDevice => Self::ENODEV,
            Self::Interrupted => Self::EINTR,
            Self::OutOfMemory => Self::ENOMEM,
            Self::NotImplemented => Self::ENOSYS,
            Self::Unknown(code) => code,
        }
    }

    const EBUSY: i32 = 16;
    const EBADF: i32 = 9;
    const EPIPE: i32 = 32;
    const EIO: i32 = 5;
    const EINVAL: i32 = 22;
    const ETIMEDOUT: i32 = 110;
    const ENODEV: i32 = 19;
    const EINTR: i32 = 4;
    const ENOMEM: i32 = 12;
    const ENOSYS: i32 = 38;
}

impl From<io::Error> for RespError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => {
                Self::PipeClosed
            },
            io::ErrorKind::TimedOut => Self::TimedOut,
            io::ErrorKind::Interrupted => Self::Interrupted,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
                Self::InvalidArgument
            },
            _ => Self::Io,
        }
    }
}
