// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Internal coordination structures shared between the reader/writer tasks
//! and [`crate::handle::ClientHandle`].
//!
//! Response waiters live in a `DashMap<u16, Waiter>` keyed by `client_id`
//! (owned by [`crate::responder::Responder`]); the writer queue is a
//! `VecDeque` guarded by a `std::sync::Mutex` with a `tokio::sync::Notify`
//! for wakeups, giving O(1) push/pop and a bounded linear scan to cancel
//! all queued writes for one client.

use std::{collections::VecDeque, sync::Mutex};

use bytes::Bytes;
use tokio::sync::{Notify, oneshot};

use crate::{error::RespError, frame::FrameHeader, response::Response};

/// Invoked once a send or receive completes, carrying the final result.
pub type CleanupCb = Box<dyn FnOnce(Result<usize, RespError>) + Send + 'static>;

pub(crate) struct WriteJob {
    pub header: FrameHeader,
    pub payload: Bytes,
    pub completion: oneshot::Sender<Result<usize, RespError>>,
    pub cleanup: Option<CleanupCb>,
}

/// An entry in the responder's waiters ("readers") table: a handle with an
/// outstanding, registered receive.
pub(crate) struct Waiter {
    pub capacity: usize,
    pub completion: oneshot::Sender<WaiterOutcome>,
    pub cleanup: Option<CleanupCb>,
}

pub(crate) enum WaiterOutcome {
    Response(Response),
    Err(RespError),
}

/// FIFO queue of outbound frames awaiting the writer task, with O(1) push
/// and a cancel-by-`client_id` scan bounded by the number of concurrently
/// in-flight sends.
#[derive(Default)]
pub(crate) struct WriteQueue {
    items: Mutex<VecDeque<WriteJob>>,
    notify: Notify,
}

impl WriteQueue {
    pub fn push(&self, job: WriteJob) {
        self.items.lock().expect("write queue mutex poisoned").push_back(job);
        self.notify.notify_one();
    }

    pub fn pop(&self) -> Option<WriteJob> {
        self.items.lock().expect("write queue mutex poisoned").pop_front()
    }

    pub fn cancel(&self, client_id: u16) {
        self.items
            .lock()
            .expect("write queue mutex poisoned")
            .retain(|job| job.header.client_id != client_id);
    }

    pub fn drain(&self) -> Vec<WriteJob> {
        self.items.lock().expect("write queue mutex poisoned").drain(..).collect()
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}
