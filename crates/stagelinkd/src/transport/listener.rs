//! Listener and accept loop for the command socket.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use stagelink_config::Endpoint;

use crate::reporter::BridgeReporter;

use super::registry::ConnectionRegistry;
use super::{LISTENER_TARGET, errors::ListenerError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(500);
const CAPACITY_BACKOFF: Duration = Duration::from_secs(1);

/// Handles accepted socket connections on a dedicated worker thread.
///
/// Implementations receive the server shutdown flag so long receive loops
/// can observe a stop request between commands. They should avoid
/// panicking; a panic terminates only that worker's thread.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Serves a single connection until it closes.
    fn handle(&self, stream: TcpStream, shutdown: &AtomicBool);
}

/// Listener bound to the configured command endpoint.
#[derive(Debug)]
pub(crate) struct CommandListener {
    endpoint: Endpoint,
    listener: TcpListener,
}

impl CommandListener {
    /// Resolves and binds the endpoint.
    pub(crate) fn bind(endpoint: &Endpoint) -> Result<Self, ListenerError> {
        let listener = bind_tcp(endpoint.host(), endpoint.port())?;
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
        })
    }

    /// Address the listener actually bound, once known.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Starts the accept loop on a background thread.
    ///
    /// Each accepted connection is registered with `registry` and handed to
    /// `handler` on its own worker thread. The returned handle stops the
    /// loop via its shutdown flag.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
        registry: Arc<ConnectionRegistry>,
        reporter: Arc<dyn BridgeReporter>,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle =
            thread::spawn(move || run_accept_loop(&self, &shutdown_flag, handler, registry, reporter));
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }
}

/// Handle to the background accept-loop thread.
pub(crate) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Signals the accept loop to stop.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept loop to exit.
    ///
    /// Worker threads for connections accepted earlier are not joined: they
    /// observe the shutdown flag at their next read and wind down on their
    /// own, holding no shared state beyond their registry slot.
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| ListenerError::ThreadPanic)
        } else {
            Ok(())
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &CommandListener,
    shutdown: &Arc<AtomicBool>,
    handler: Arc<dyn ConnectionHandler>,
    registry: Arc<ConnectionRegistry>,
    reporter: Arc<dyn BridgeReporter>,
) {
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.endpoint,
        max_clients = registry.max_clients(),
        "command listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        if !registry.has_capacity() {
            debug!(
                target: LISTENER_TARGET,
                active = registry.active(),
                "connection ceiling reached, waiting"
            );
            thread::sleep(CAPACITY_BACKOFF);
            continue;
        }

        match accept_connection(&listener.listener) {
            Ok(Some((stream, peer))) => {
                last_error = None;
                let guard = registry.register();
                reporter.client_connected(peer, registry.active());
                let handler = Arc::clone(&handler);
                let reporter = Arc::clone(&reporter);
                let shutdown = Arc::clone(shutdown);
                thread::spawn(move || {
                    // The guard keeps the registry slot for the worker's
                    // whole lifetime, panics included.
                    let _guard = guard;
                    handler.handle(stream, &shutdown);
                    reporter.client_disconnected(peer);
                });
            }
            Ok(None) => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    reporter.server_stopped();
}

fn accept_connection(listener: &TcpListener) -> io::Result<Option<(TcpStream, SocketAddr)>> {
    match listener.accept() {
        Ok((stream, peer)) => {
            stream.set_nonblocking(false)?;
            Ok(Some((stream, peer)))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| ListenerError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::Bind { addr, source })
}

#[cfg(test)]
mod tests {
    use std::net::TcpStream;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use rstest::{fixture, rstest};

    use crate::reporter::StructuredReporter;

    use super::*;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl CountingHandler {
        fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
            let count = Arc::new(AtomicUsize::new(0));
            let handler = Arc::new(Self {
                count: Arc::clone(&count),
            });
            (count, handler)
        }
    }

    impl ConnectionHandler for CountingHandler {
        fn handle(&self, _stream: TcpStream, _shutdown: &AtomicBool) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[fixture]
    fn loopback() -> Endpoint {
        Endpoint::new(String::from("127.0.0.1"), 0)
    }

    fn wait_for_count(count: &AtomicUsize, expected: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if count.load(Ordering::SeqCst) >= expected {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[rstest]
    fn accepts_multiple_connections(loopback: Endpoint) {
        let listener = CommandListener::bind(&loopback).expect("bind listener");
        let addr = listener.local_addr().expect("local address");
        let (count, handler) = CountingHandler::new();
        let registry = Arc::new(ConnectionRegistry::new(10));
        let handle = listener
            .start(handler, registry, Arc::new(StructuredReporter::new()))
            .expect("start listener");

        TcpStream::connect(addr).expect("connect first client");
        TcpStream::connect(addr).expect("connect second client");

        assert!(wait_for_count(&count, 2), "expected two connections");
        handle.shutdown();
        handle.join().expect("join listener");
    }

    #[rstest]
    fn shutdown_stops_the_accept_loop(loopback: Endpoint) {
        let listener = CommandListener::bind(&loopback).expect("bind listener");
        let (_, handler) = CountingHandler::new();
        let registry = Arc::new(ConnectionRegistry::new(10));
        let handle = listener
            .start(handler, registry, Arc::new(StructuredReporter::new()))
            .expect("start listener");

        handle.shutdown();
        let started = Instant::now();
        handle.join().expect("join listener");
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "accept loop should exit promptly after shutdown"
        );
    }

    #[rstest]
    fn registry_slots_are_released_when_workers_finish(loopback: Endpoint) {
        let listener = CommandListener::bind(&loopback).expect("bind listener");
        let addr = listener.local_addr().expect("local address");
        let (count, handler) = CountingHandler::new();
        let registry = Arc::new(ConnectionRegistry::new(10));
        let probe = Arc::clone(&registry);
        let handle = listener
            .start(handler, registry, Arc::new(StructuredReporter::new()))
            .expect("start listener");

        TcpStream::connect(addr).expect("connect client");
        assert!(wait_for_count(&count, 1), "expected one connection");

        let deadline = Instant::now() + Duration::from_secs(2);
        while probe.active() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(probe.active(), 0, "slot should be released");

        handle.shutdown();
        handle.join().expect("join listener");
    }
}
