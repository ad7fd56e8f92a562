//! The embedded command server and its lifecycle state machine.
//!
//! A [`CommandServer`] owns the listener lifecycle
//! (`Stopped → Starting → Listening → Stopping → Stopped`) and wires the
//! transport, dispatch, and bridge layers together. The host application
//! constructs one with its object model and scheduler and calls `start` when
//! the control surface loads and `stop` when it unloads.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use stagelink_config::Config;

use crate::bridge::MainThreadBridge;
use crate::dispatch::{CommandRegistry, DispatchConnectionHandler};
use crate::host::{HostScheduler, SongModel};
use crate::reporter::{BridgeReporter, StructuredReporter};
use crate::transport::{CommandListener, ConnectionRegistry, ListenerError, ListenerHandle};

/// Lifecycle states of the command listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No listener exists.
    Stopped,
    /// Binding the listening socket.
    Starting,
    /// Accepting connections.
    Listening,
    /// Winding the accept loop down.
    Stopping,
}

/// Errors surfaced by server lifecycle operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or running the listener failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// `start` was called while the server was not stopped.
    #[error("server cannot start while {state:?}")]
    AlreadyRunning { state: ServerState },
    /// `stop` was called while the server was not listening.
    #[error("server cannot stop while {state:?}")]
    NotListening { state: ServerState },
}

struct Inner {
    state: ServerState,
    handle: Option<ListenerHandle>,
    registry: Option<Arc<ConnectionRegistry>>,
    local_addr: Option<SocketAddr>,
}

/// Host-embedded command server.
pub struct CommandServer {
    config: Config,
    song: Arc<dyn SongModel>,
    scheduler: Arc<dyn HostScheduler>,
    reporter: Arc<dyn BridgeReporter>,
    inner: Mutex<Inner>,
}

impl CommandServer {
    /// Builds a server over the given object model and scheduler.
    #[must_use]
    pub fn new(
        config: Config,
        song: Arc<dyn SongModel>,
        scheduler: Arc<dyn HostScheduler>,
    ) -> Self {
        Self::with_reporter(config, song, scheduler, Arc::new(StructuredReporter::new()))
    }

    /// Builds a server with a custom lifecycle reporter.
    #[must_use]
    pub fn with_reporter(
        config: Config,
        song: Arc<dyn SongModel>,
        scheduler: Arc<dyn HostScheduler>,
        reporter: Arc<dyn BridgeReporter>,
    ) -> Self {
        Self {
            config,
            song,
            scheduler,
            reporter,
            inner: Mutex::new(Inner {
                state: ServerState::Stopped,
                handle: None,
                registry: None,
                local_addr: None,
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        self.inner().state
    }

    /// Address the listener bound, while listening.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner().local_addr
    }

    /// Live connections currently being served.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.inner()
            .registry
            .as_ref()
            .map_or(0, |registry| registry.active())
    }

    /// Binds the command socket and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AlreadyRunning`] when not stopped, or the
    /// listener error when binding fails (in which case the server returns
    /// to `Stopped`).
    pub fn start(&self) -> Result<(), ServerError> {
        let mut inner = self.inner();
        if inner.state != ServerState::Stopped {
            return Err(ServerError::AlreadyRunning { state: inner.state });
        }
        inner.state = ServerState::Starting;

        match self.start_listener(&mut inner) {
            Ok(()) => {
                inner.state = ServerState::Listening;
                Ok(())
            }
            Err(error) => {
                inner.state = ServerState::Stopped;
                self.reporter.server_error(&error.to_string());
                Err(error)
            }
        }
    }

    fn start_listener(&self, inner: &mut Inner) -> Result<(), ServerError> {
        let endpoint = self.config.endpoint();
        let listener = CommandListener::bind(&endpoint)?;
        let local_addr = listener.local_addr();

        let registry = Arc::new(ConnectionRegistry::new(self.config.max_clients));
        let bridge = MainThreadBridge::new(Arc::clone(&self.scheduler), self.config.command_timeout());
        let handler = Arc::new(DispatchConnectionHandler::new(
            Arc::new(CommandRegistry::standard()),
            Arc::clone(&self.song),
            bridge,
            self.config.client_timeout(),
            self.config.max_message_bytes,
        ));

        let handle = listener.start(handler, Arc::clone(&registry), Arc::clone(&self.reporter))?;

        // Report the resolved endpoint so a port-0 bind shows its real port.
        let bound = local_addr.map_or_else(
            || endpoint.clone(),
            |addr| stagelink_config::Endpoint::new(endpoint.host().to_owned(), addr.port()),
        );
        self.reporter.server_listening(&bound);

        inner.handle = Some(handle);
        inner.registry = Some(registry);
        inner.local_addr = local_addr;
        Ok(())
    }

    /// Stops accepting connections and waits for the accept loop to exit.
    ///
    /// Workers serving already-accepted connections observe the shutdown
    /// flag at their next read and wind down on their own; they are not
    /// force-killed, so a brief overlap past "stopped" is expected.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotListening`] when not listening, or a
    /// listener error if the accept-loop thread panicked.
    pub fn stop(&self) -> Result<(), ServerError> {
        let handle = {
            let mut inner = self.inner();
            if inner.state != ServerState::Listening {
                return Err(ServerError::NotListening { state: inner.state });
            }
            inner.state = ServerState::Stopping;
            inner.handle.take()
        };

        let join_result = handle.map_or(Ok(()), |handle| {
            handle.shutdown();
            handle.join()
        });

        let mut inner = self.inner();
        inner.state = ServerState::Stopped;
        inner.registry = None;
        inner.local_addr = None;
        join_result.map_err(ServerError::from)
    }
}
