//! Structured logging bootstrap.
//!
//! The core itself only emits `tracing` events; wiring a subscriber is the
//! binary's job. [`init_tracing`] is a convenience default (env-filter +
//! JSON-on-release, pretty-on-debug) matching the pattern `r2e_core`'s
//! consumers reach for before calling [`crate::Server::serve_context`].

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber reading `RUST_LOG` (default `info`).
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
