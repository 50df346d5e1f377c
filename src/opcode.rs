// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::error::RespError;

/// Closed opcode enumeration carried in the `op` byte of a [`crate::frame::FrameHeader`].
///
/// The responder itself only ever distinguishes [`Opcode::Response`] from
/// everything else; all other variants are opaque payload routed to the
/// registered [`crate::command::CommandHandler`] unchanged.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    #[default]
    Response = 0,
    Print = 1,
    Version = 2,
    Timeout = 3,
    Open = 4,
    OpenCyclic = 5,
    Close = 6,
    ReadAttr = 7,
    ReadDbgAttr = 8,
    ReadBufAttr = 9,
    ReadChnAttr = 10,
    WriteAttr = 11,
    WriteDbgAttr = 12,
    WriteBufAttr = 13,
    WriteChnAttr = 14,
    ReadBuf = 15,
    WriteBuf = 16,
    GetTrig = 17,
    SetTrig = 18,
    SetBufCnt = 19,
}

impl Opcode {
    pub const fn is_response(self) -> bool {
        matches!(self, Self::Response)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = RespError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Response,
            1 => Self::Print,
            2 => Self::Version,
            3 => Self::Timeout,
            4 => Self::Open,
            5 => Self::OpenCyclic,
            6 => Self::Close,
            7 => Self::ReadAttr,
            8 => Self::ReadDbgAttr,
            9 => Self::ReadBufAttr,
            10 => Self::ReadChnAttr,
            11 => Self::WriteAttr,
            12 => Self::WriteDbgAttr,
            13 => Self::WriteBufAttr,
            14 => Self::WriteChnAttr,
            15 => Self::ReadBuf,
            16 => Self::WriteBuf,
            17 => Self::GetTrig,
            18 => Self::SetTrig,
            19 => Self::SetBufCnt,
            _ => return Err(RespError::InvalidArgument),
        })
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> Self {
        op as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        for raw in 0u8..=19 {
            let op = Opcode::try_from(raw).expect("known opcode");
            assert_eq!(u8::from(op), raw);
        }
    }

    #[test]
    fn rejects_unknown_opcode() {
        assert_eq!(Opcode::try_from(20), Err(RespError::InvalidArgument));
    }

    #[test]
    fn only_response_is_response() {
        assert!(Opcode::Response.is_response());
        assert!(!Opcode::Print.is_response());
    }
}
