//! Fire-and-forget startup signals.
//!
//! Bootstrap announces one-time work (project import, catalog import,
//! starting the cluster watchers) to whichever collaborators subscribed.
//! Nobody acknowledges a signal and nothing retries it.

use std::fmt;

use tokio::sync::broadcast;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    ImportProjects,
    ImportKamelets,
    StartWatchers,
}

impl Signal {
    pub fn address(&self) -> &'static str {
        match self {
            Signal::ImportProjects => "import-projects",
            Signal::ImportKamelets => "import-kamelets",
            Signal::StartWatchers => "start-watchers",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.address())
    }
}

/// Broadcast bus for [`Signal`]s.
#[derive(Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<Signal>,
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }

    /// Publish a signal; returns how many subscribers received it.
    pub fn publish(&self, signal: Signal) -> usize {
        match self.tx.send(signal) {
            Ok(receivers) => {
                info!(%signal, receivers, "signal published");
                receivers
            }
            Err(_) => {
                debug!(%signal, "signal published with no subscribers");
                0
            }
        }
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(16)
    }
}
