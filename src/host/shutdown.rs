//! Cooperative stop signal for the worker threads.
//!
//! Nothing is ever sent on the channel: dropping the sender disconnects every receiver,
//! which wakes any thread parked in [`StopToken::wait`].

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

/// Owning side; triggering it stops every token.
#[derive(Debug)]
pub(crate) struct StopHandle {
    tx: Option<Sender<()>>,
}

/// Observing side, one clone per worker.
#[derive(Debug, Clone)]
pub(crate) struct StopToken {
    rx: Receiver<()>,
}

pub(crate) fn stop_channel() -> (StopHandle, StopToken) {
    let (tx, rx) = crossbeam_channel::bounded(0);
    (StopHandle { tx: Some(tx) }, StopToken { rx })
}

impl StopHandle {
    pub(crate) fn trigger(&mut self) {
        self.tx.take();
    }
}

impl StopToken {
    pub(crate) fn is_stopped(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected) | Ok(()))
    }

    /// Sleep for `timeout` or until stopped. Returns true if stopped.
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        !matches!(self.rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }
}
