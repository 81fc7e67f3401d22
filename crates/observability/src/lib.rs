//! Process-wide tracing setup for the reclaim service.

/// Tracing subscriber configuration.
pub mod tracing;

pub use self::tracing::LogFormat;

/// Initialize tracing with the format chosen by `RECLAIM_LOG_FORMAT`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    self::tracing::init(LogFormat::from_env());
}
