//! Shared configuration for the Stagelink bridge.
//!
//! Both the host-embedded server and the client resolve their settings from
//! the same layered sources: command-line flags, `STAGELINK_*` environment
//! variables, and an optional TOML file named via `--config-path`. Later
//! layers override earlier ones; anything left unset falls back to the
//! defaults in [`defaults`].

use std::env;
use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

mod defaults;
mod endpoint;
mod logging;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_PORT, default_log_filter, default_log_format,
};
pub use endpoint::{Endpoint, EndpointParseError};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved bridge configuration shared by the server and client binaries.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "STAGELINK")]
pub struct Config {
    /// Interface the command server binds and the client connects to.
    #[serde(default = "defaults::default_host")]
    pub host: String,
    /// TCP port for the command socket.
    #[serde(default = "defaults::default_port")]
    pub port: u16,
    /// Idle timeout for an accepted connection, in seconds.
    #[serde(default = "defaults::default_client_timeout_secs")]
    pub client_timeout_secs: u64,
    /// Ceiling on simultaneously served connections.
    #[serde(default = "defaults::default_max_clients")]
    pub max_clients: usize,
    /// Ceiling on a single message's accumulated receive buffer, in bytes.
    #[serde(default = "defaults::default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Bounded wait for a deferred command's scheduler-thread result, in
    /// seconds.
    #[serde(default = "defaults::default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Settle delay applied around mutating commands, in milliseconds.
    ///
    /// The host applies mutations on its next scheduler tick; the exact
    /// minimum safe delay is host-version-dependent, so it stays
    /// configurable.
    #[serde(default = "defaults::default_mutate_delay_ms")]
    pub mutate_delay_ms: u64,
    /// Connection establishment attempts before the client gives up.
    #[serde(default = "defaults::default_connect_attempts")]
    pub connect_attempts: u32,
    /// Pause between client connection attempts, in milliseconds.
    #[serde(default = "defaults::default_connect_retry_pause_ms")]
    pub connect_retry_pause_ms: u64,
    /// Log filter expression consumed by the tracing subscriber.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Output format for structured logs.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns the underlying loader error when a layer fails to parse.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        Self::load_from_iter(env::args_os())
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// Used by tests and embedders that manage their own argument vectors.
    ///
    /// # Errors
    ///
    /// Returns the underlying loader error when a layer fails to parse.
    pub fn load_from_iter<I>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = OsString>,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Endpoint the command socket lives on.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// Idle timeout applied to accepted connections.
    #[must_use]
    pub const fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    /// Bounded wait for a deferred command result.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Settle delay applied around mutating commands.
    #[must_use]
    pub const fn mutate_delay(&self) -> Duration {
        Duration::from_millis(self.mutate_delay_ms)
    }

    /// Pause between client connection attempts.
    #[must_use]
    pub const fn connect_retry_pause(&self) -> Duration {
        Duration::from_millis(self.connect_retry_pause_ms)
    }

    /// Log filter expression for the tracing subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Output format for structured logs.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: defaults::default_host(),
            port: defaults::default_port(),
            client_timeout_secs: defaults::default_client_timeout_secs(),
            max_clients: defaults::default_max_clients(),
            max_message_bytes: defaults::default_max_message_bytes(),
            command_timeout_secs: defaults::default_command_timeout_secs(),
            mutate_delay_ms: defaults::default_mutate_delay_ms(),
            connect_attempts: defaults::default_connect_attempts(),
            connect_retry_pause_ms: defaults::default_connect_retry_pause_ms(),
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
        }
    }
}
