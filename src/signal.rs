//! Interrupt delivery for blocked reads.
//!
//! A blocked `read` in the kernel wakes up early when a signal is delivered
//! to the sleeping task. Here the sender side is an [`Interrupter`] and the
//! sleeping side holds an [`InterruptToken`]; both are views of one watch
//! channel, so delivery is sticky: a token that is interrupted before the
//! read starts waiting still aborts the wait.

use tokio::sync::watch;

/// Delivers interrupts to every token cloned from it.
#[derive(Debug)]
pub struct Interrupter {
    tx: watch::Sender<bool>,
}

/// Observes interrupts delivered by an [`Interrupter`].
#[derive(Debug, Clone)]
pub struct InterruptToken {
    rx: Option<watch::Receiver<bool>>,
}

impl Interrupter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Create a token bound to this interrupter.
    pub fn token(&self) -> InterruptToken {
        InterruptToken {
            rx: Some(self.tx.subscribe()),
        }
    }

    /// Deliver an interrupt. Idempotent.
    pub fn interrupt(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_interrupted(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Interrupter {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptToken {
    /// A token that is never interrupted.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Check for a pending interrupt without waiting.
    pub fn is_interrupted(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once an interrupt is delivered.
    ///
    /// Also resolves if the [`Interrupter`] is dropped: nobody is left who
    /// could wake the reader, so the wait is abandoned.
    pub async fn interrupted(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        // wait_for checks the current value first, so an interrupt delivered
        // before this call is not missed.
        let _ = rx.wait_for(|interrupted| *interrupted).await;
    }
}
