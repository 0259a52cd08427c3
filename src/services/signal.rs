//! Capacity-one wake-up channel.
//!
//! Any number of `notify` calls made while a wake is already pending collapse
//! into that single pending wake. One worker loop consumes it.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Sending half; cheap to clone and hand to every producer.
#[derive(Clone, Debug)]
pub struct CoalescedSignal {
    tx: mpsc::Sender<()>,
}

/// Receiving half, owned by the worker loop.
#[derive(Debug)]
pub struct SignalReceiver {
    rx: mpsc::Receiver<()>,
}

impl CoalescedSignal {
    pub fn new() -> (Self, SignalReceiver) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, SignalReceiver { rx })
    }

    /// Request a run. Never blocks; returns whether this call queued the wake.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => false,
            Err(TrySendError::Closed(())) => {
                debug!("signal receiver dropped, wake ignored");
                false
            }
        }
    }

    /// Wake the worker every `period` until cancelled.
    pub fn spawn_interval(&self, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        signal.notify();
                    }
                }
            }
        })
    }
}

impl SignalReceiver {
    /// Run `work` once per received wake until `cancel` fires or every sender is gone.
    ///
    /// A run already in progress finishes before cancellation is observed.
    pub async fn run<F, Fut>(mut self, cancel: CancellationToken, mut work: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                wake = self.rx.recv() => match wake {
                    Some(()) => work().await,
                    None => break,
                },
            }
        }
    }
}
