//! # Seckill Testing
//!
//! In-memory implementations of every `seckill-core` trait, plus the
//! cross-component tests that drive the whole pipeline through them.
//!
//! The doubles aim for semantic fidelity, not convenience: the
//! [`InMemoryCoordinationStore`] performs each operation atomically under
//! one lock the way the real store serializes scripts, and the
//! [`InMemoryOrderStore`] re-checks uniqueness and stock exactly like the
//! transactional Postgres unit. Tests against them exercise the same
//! interleavings production sees, at memory speed.

// Public modules
pub mod clock;
pub mod orders;
pub mod store;

// Re-export main types for convenience
pub use clock::FixedClock;
pub use orders::InMemoryOrderStore;
pub use store::InMemoryCoordinationStore;

/// Install a compact tracing subscriber for a test run.
///
/// Respects `RUST_LOG`; safe to call from every test, only the first call
/// installs.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
