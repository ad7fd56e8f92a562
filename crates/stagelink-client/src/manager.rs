//! The persistent-connection manager behind `send_command`.
//!
//! One ownership slot holds zero or one live connection. Every outbound
//! command ensures the slot is filled (connecting and validating with a
//! bounded attempt budget if not), sends, and waits for the matching
//! response. Any transport failure clears the slot so the next call starts
//! from a fresh connection; the failing call itself is surfaced to the
//! caller rather than retried mid-flight.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use stagelink_config::{Config, Endpoint};
use stagelink_protocol::{Command, Response, classify};

use crate::connection::HostConnection;
use crate::errors::ClientError;

const MANAGER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::manager");

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Response bounds mirror the host side: queries answer quickly, mutations
/// only after the scheduler tick has applied them.
const QUERY_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);
const MUTATION_RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// Blocking client over a transparently managed persistent connection.
pub struct Client {
    config: Config,
    slot: Mutex<Option<HostConnection>>,
}

impl Client {
    /// Builds a client; no connection is made until first use.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            slot: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<HostConnection>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ensures a validated connection exists. Idempotent: an already-live
    /// connection is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Exhausted`] once the attempt budget is spent.
    pub fn connect(&self) -> Result<(), ClientError> {
        let mut slot = self.slot();
        self.ensure_connection(&mut slot)
    }

    /// Drops the persistent connection, if any.
    pub fn disconnect(&self) {
        *self.slot() = None;
    }

    /// Whether a live connection is currently held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.slot().is_some()
    }

    /// Sends one command and returns the host's `result` payload.
    ///
    /// Mutating commands are wrapped in a settle delay on both sides of the
    /// response wait, absorbing the host's apply-on-next-tick behaviour.
    ///
    /// # Errors
    ///
    /// Transport failures invalidate the connection and surface as the
    /// corresponding [`ClientError`]; a `status = "error"` reply surfaces as
    /// [`ClientError::Host`] with the connection kept.
    pub fn send_command(
        &self,
        name: &str,
        params: Map<String, Value>,
    ) -> Result<Value, ClientError> {
        let mut slot = self.slot();
        self.ensure_connection(&mut slot)?;
        let Some(connection) = slot.as_mut() else {
            return Err(ClientError::Exhausted {
                endpoint: self.config.endpoint().to_string(),
                attempts: self.config.connect_attempts,
            });
        };

        let command = Command::new(name, params);
        let deferred = classify(name).is_deferred();
        debug!(
            target: MANAGER_TARGET,
            command = name,
            deferred,
            "sending command"
        );

        match Self::execute(connection, &command, deferred, self.config.mutate_delay()) {
            Ok(Response::Success { result }) => Ok(result),
            Ok(Response::Error { message }) => Err(ClientError::Host { message }),
            Err(error) => {
                // A broken socket must not be retried; clearing the slot
                // makes the next call reconnect from scratch.
                warn!(
                    target: MANAGER_TARGET,
                    command = name,
                    %error,
                    "transport failure, invalidating connection"
                );
                *slot = None;
                Err(error)
            }
        }
    }

    fn execute(
        connection: &mut HostConnection,
        command: &Command,
        deferred: bool,
        settle: Duration,
    ) -> Result<Response, ClientError> {
        connection.send(command)?;
        if deferred {
            thread::sleep(settle);
        }
        let timeout = if deferred {
            MUTATION_RESPONSE_TIMEOUT
        } else {
            QUERY_RESPONSE_TIMEOUT
        };
        let response = connection.receive(timeout)?;
        if deferred {
            thread::sleep(settle);
        }
        Ok(response)
    }

    fn ensure_connection(
        &self,
        slot: &mut Option<HostConnection>,
    ) -> Result<(), ClientError> {
        if slot.is_some() {
            return Ok(());
        }

        let endpoint = self.config.endpoint();
        let attempts = self.config.connect_attempts.max(1);
        for attempt in 1..=attempts {
            debug!(
                target: MANAGER_TARGET,
                %endpoint,
                attempt,
                attempts,
                "connecting to host bridge"
            );
            match self.establish_validated(&endpoint) {
                Ok(connection) => {
                    debug!(target: MANAGER_TARGET, %endpoint, "connection validated");
                    *slot = Some(connection);
                    return Ok(());
                }
                Err(error) => {
                    warn!(
                        target: MANAGER_TARGET,
                        %endpoint,
                        attempt,
                        %error,
                        "connection attempt failed"
                    );
                    if attempt < attempts {
                        thread::sleep(self.config.connect_retry_pause());
                    }
                }
            }
        }

        Err(ClientError::Exhausted {
            endpoint: endpoint.to_string(),
            attempts,
        })
    }

    /// Connects and proves the socket usable with a cheap round trip before
    /// trusting it.
    fn establish_validated(&self, endpoint: &Endpoint) -> Result<HostConnection, ClientError> {
        let mut connection =
            HostConnection::open(endpoint, CONNECT_TIMEOUT, self.config.max_message_bytes)?;
        connection.send(&Command::bare("health_check"))?;
        match connection.receive(QUERY_RESPONSE_TIMEOUT)? {
            Response::Success { .. } => Ok(connection),
            Response::Error { message } => Err(ClientError::Host { message }),
        }
    }
}
