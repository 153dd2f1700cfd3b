use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Restartable one-tick-per-second countdown for the active question.
///
/// The remaining seconds are published through a `watch` channel so the
/// presentation side mirrors the value read-only. Starting implicitly
/// cancels any countdown already running; at most one ticking task exists
/// per timer. The value never goes below zero and the task stops on its own
/// when it reaches zero — running out of time triggers no phase transition,
/// question rotation is entirely server-driven.
#[derive(Debug)]
pub struct CountdownTimer {
    seconds: watch::Sender<u32>,
    ticker: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    /// Create an idle timer reporting zero seconds.
    pub fn new() -> Self {
        let (seconds, _) = watch::channel(0);
        Self {
            seconds,
            ticker: None,
        }
    }

    /// Subscribe to the remaining-seconds value.
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.seconds.subscribe()
    }

    /// Begin counting down from `seconds`, cancelling any prior countdown.
    pub fn start(&mut self, seconds: u32) {
        self.cancel();
        self.seconds.send_replace(seconds);
        if seconds == 0 {
            return;
        }

        let publisher = self.seconds.clone();
        self.ticker = Some(tokio::spawn(async move {
            let mut remaining = seconds;
            while remaining > 0 {
                sleep(Duration::from_secs(1)).await;
                remaining -= 1;
                publisher.send_replace(remaining);
            }
        }));
    }

    /// Stop ticking immediately. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
