//! Shared tracing/logging setup.

/// Initialize process-wide tracing (JSON, filtered by `RUST_LOG`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize tracing for tests: human-readable output captured by the test
/// harness, `debug` unless `RUST_LOG` says otherwise.
pub fn init_for_tests() {
    tracing::init_for_tests();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
