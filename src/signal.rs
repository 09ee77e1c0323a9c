use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use simple_signal::{self, Signal};

/// Process-wide stop request, shared between the signal handler and the edge
/// loop. The loop checks it once per iteration.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Requests `shutdown` on SIGINT (Ctrl-C) and SIGTERM.
pub fn install_handler(shutdown: &Shutdown) {
    simple_signal::set_handler(&[Signal::Int, Signal::Term], {
        let shutdown = shutdown.clone();
        move |signals| {
            info!("{signals:?} received, cleaning up and exiting");
            shutdown.request();
        }
    });
}
