//! ---
//! cosim_section: "01-bridge-runtime"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Cooperative shutdown signalling for the blocking bridge loop."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative shutdown flag shared between the signal handler and the loop.
///
/// The bridge loop is synchronous and blocks in file polls and simulator
/// calls, so shutdown is a flag checked between suspension points rather
/// than an async channel. An in-flight simulator call is never cancelled.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent; safe from any thread or signal handler.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_starts_clear_and_latches() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_requested());
        let observer = flag.clone();
        flag.request();
        assert!(observer.is_requested());
        flag.request();
        assert!(observer.is_requested());
    }
}
