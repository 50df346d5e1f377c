// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A bidirectional, multiplexed request/response protocol engine over an
//! arbitrary duplex byte transport.
//!
//! A [`responder::Responder`] owns a reader task and a writer task driving
//! one transport. Either side of the conversation can send commands and
//! wait for responses concurrently; frames are demultiplexed by a 16-bit
//! `client_id` carried in each frame's header, so many outstanding
//! request/response pairs can be in flight on the same transport at once.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use duplex_responder::{
//!     cfg::config::ResponderConfig, command::NullCommandHandler, opcode::Opcode,
//!     responder::Responder,
//! };
//!
//! # async fn example(stream: tokio::net::TcpStream) -> Result<(), Box<dyn std::error::Error>> {
//! let responder =
//!     Responder::from_tcp(stream, Arc::new(NullCommandHandler), ResponderConfig::default());
//! let handle = responder.create_handle();
//! let resp = handle
//!     .exec_command(Opcode::Version, 0, 0, bytes::Bytes::new(), 64)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod cfg;
pub mod command;
pub mod error;
pub mod frame;
pub mod handle;
pub mod opcode;
pub(crate) mod queue;
pub mod responder;
pub mod response;
pub mod transport;

pub use command::{CommandData, CommandHandler, NullCommandHandler};
pub use error::RespError;
pub use frame::FrameHeader;
pub use handle::ClientHandle;
pub use opcode::Opcode;
pub use responder::Responder;
pub use response::Response;
