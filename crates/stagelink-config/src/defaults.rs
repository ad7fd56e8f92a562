//! Built-in defaults for the bridge configuration surface.

use crate::logging::LogFormat;

/// Default TCP port the command socket listens on.
pub const DEFAULT_PORT: u16 = 9877;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

pub(crate) fn default_host() -> String {
    String::from("localhost")
}

pub(crate) const fn default_port() -> u16 {
    DEFAULT_PORT
}

pub(crate) const fn default_client_timeout_secs() -> u64 {
    300
}

pub(crate) const fn default_max_clients() -> usize {
    10
}

pub(crate) const fn default_max_message_bytes() -> usize {
    1_048_576
}

pub(crate) const fn default_command_timeout_secs() -> u64 {
    10
}

pub(crate) const fn default_mutate_delay_ms() -> u64 {
    100
}

pub(crate) const fn default_connect_attempts() -> u32 {
    3
}

pub(crate) const fn default_connect_retry_pause_ms() -> u64 {
    1000
}

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub(crate) fn default_log_filter_string() -> String {
    String::from(DEFAULT_LOG_FILTER)
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
