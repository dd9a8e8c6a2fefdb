// src/cancel.rs

//! Interrupt handling as an explicit context object.
//!
//! The interrupt count lives in a `watch` channel owned by [`CancelContext`].
//! The engine and every running job hold a clone and react to changes; the
//! OS signal handler is only one producer among others (tests call
//! [`CancelContext::interrupt`] directly).

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

/// How hard running processes should be stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Escalation {
    None,
    /// First interrupt: stop scheduling, ask running groups to stop.
    Graceful,
    /// Second interrupt: forward the interrupt again.
    Repeat,
    /// Third and later: kill process groups outright.
    Kill,
}

impl Escalation {
    pub fn from_count(count: u32) -> Self {
        match count {
            0 => Escalation::None,
            1 => Escalation::Graceful,
            2 => Escalation::Repeat,
            _ => Escalation::Kill,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CancelContext {
    tx: Arc<watch::Sender<u32>>,
    rx: watch::Receiver<u32>,
}

impl Default for CancelContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelContext {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(0);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Record one more interrupt and return the new escalation level.
    pub fn interrupt(&self) -> Escalation {
        let mut count = 0;
        self.tx.send_modify(|c| {
            *c = c.saturating_add(1);
            count = *c;
        });
        let level = Escalation::from_count(count);
        info!(count, ?level, "interrupt received");
        level
    }

    pub fn count(&self) -> u32 {
        *self.rx.borrow()
    }

    pub fn escalation(&self) -> Escalation {
        Escalation::from_count(self.count())
    }

    pub fn is_cancelled(&self) -> bool {
        self.count() > 0
    }

    /// A fresh receiver that observes every later interrupt.
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.tx.subscribe()
    }
}

/// Bridge Ctrl-C into `ctx` for as long as the process lives.
pub fn spawn_signal_listener(ctx: CancelContext) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C; interrupts disabled");
                return;
            }
            ctx.interrupt();
        }
    })
}
