//! Common test utilities for vybe-access integration tests

pub mod fixtures;
pub mod mock_backend;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use mock_backend::{op, MockBackend};

/// Route `tracing` output to the test harness; `RUST_LOG` picks the level
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
