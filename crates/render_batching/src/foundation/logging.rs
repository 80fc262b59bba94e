//! Logging utilities and structured logging support
//!
//! Library code only emits through the `log` facade; binaries and tests pick
//! the backend by calling one of the initializers below.

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with a default filter used when `RUST_LOG` is unset
///
/// Returns `false` if a logger was already installed.
pub fn init_with_level(default_filter: &str) -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}

/// Install a test logger that writes through the test harness capture
pub fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
