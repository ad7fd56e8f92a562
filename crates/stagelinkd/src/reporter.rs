//! Lifecycle reporting for the embedded command server.
//!
//! The host application surfaces bridge activity to its own UI and logs;
//! embedders implement [`BridgeReporter`] to receive those events. The
//! default implementation records everything through `tracing`.

use std::net::SocketAddr;
use std::sync::Arc;

use stagelink_config::Endpoint;

/// Observer trait for server lifecycle events.
pub trait BridgeReporter: Send + Sync {
    /// The listener is bound and accepting connections.
    fn server_listening(&self, endpoint: &Endpoint);

    /// The listener has shut down.
    fn server_stopped(&self);

    /// A client connection was accepted.
    fn client_connected(&self, peer: SocketAddr, active: usize);

    /// A client connection ended, for whatever reason.
    fn client_disconnected(&self, peer: SocketAddr);

    /// The server hit an error worth surfacing to the host UI.
    fn server_error(&self, message: &str);
}

impl<T> BridgeReporter for Arc<T>
where
    T: BridgeReporter,
{
    fn server_listening(&self, endpoint: &Endpoint) {
        (**self).server_listening(endpoint);
    }

    fn server_stopped(&self) {
        (**self).server_stopped();
    }

    fn client_connected(&self, peer: SocketAddr, active: usize) {
        (**self).client_connected(peer, active);
    }

    fn client_disconnected(&self, peer: SocketAddr) {
        (**self).client_disconnected(peer);
    }

    fn server_error(&self, message: &str) {
        (**self).server_error(message);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredReporter;

impl StructuredReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl BridgeReporter for StructuredReporter {
    fn server_listening(&self, endpoint: &Endpoint) {
        tracing::info!(
            target: "stagelinkd::status",
            event = "server_listening",
            endpoint = %endpoint,
            "listening for commands"
        );
    }

    fn server_stopped(&self) {
        tracing::info!(
            target: "stagelinkd::status",
            event = "server_stopped",
            "command server stopped"
        );
    }

    fn client_connected(&self, peer: SocketAddr, active: usize) {
        tracing::info!(
            target: "stagelinkd::status",
            event = "client_connected",
            peer = %peer,
            active,
            "client connected"
        );
    }

    fn client_disconnected(&self, peer: SocketAddr) {
        tracing::info!(
            target: "stagelinkd::status",
            event = "client_disconnected",
            peer = %peer,
            "client disconnected"
        );
    }

    fn server_error(&self, message: &str) {
        tracing::error!(
            target: "stagelinkd::status",
            event = "server_error",
            message,
            "command server error"
        );
    }
}
