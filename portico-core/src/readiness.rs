//! Readiness state: the atomic `shuttingDown` flag from spec §3/§5.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, cheaply-cloneable readiness flag.
///
/// Readers use an atomic load (spec §5: "the readiness shutdown flag is an
/// atomic boolean; readers use atomic load"). The readiness endpoint
/// returns healthy iff `shutting_down == false`.
#[derive(Clone, Default)]
pub struct Readiness {
    shutting_down: Arc<AtomicBool>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub fn is_healthy(&self) -> bool {
        !self.is_shutting_down()
    }

    /// Flip to unhealthy. Idempotent.
    pub fn mark_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_healthy() {
        let r = Readiness::new();
        assert!(r.is_healthy());
        assert!(!r.is_shutting_down());
    }

    #[test]
    fn mark_shutting_down_flips_readiness() {
        let r = Readiness::new();
        r.mark_shutting_down();
        assert!(!r.is_healthy());
        assert!(r.is_shutting_down());
    }

    #[test]
    fn clone_shares_state() {
        let r1 = Readiness::new();
        let r2 = r1.clone();
        r1.mark_shutting_down();
        assert!(r2.is_shutting_down());
    }
}
