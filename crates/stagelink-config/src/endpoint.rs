//! Socket endpoint value shared by the server and client.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A `host:port` pair identifying the command socket.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Builds an endpoint from its parts.
    #[must_use]
    pub const fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    /// Host name or address component.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port component.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (host, port) = input
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError::MissingPort(input.to_owned()))?;
        if host.is_empty() {
            return Err(EndpointParseError::MissingHost(input.to_owned()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| EndpointParseError::InvalidPort(input.to_owned()))?;
        Ok(Self::new(host.to_owned(), port))
    }
}

/// Errors encountered while parsing an [`Endpoint`] from text.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// Port component was missing.
    #[error("missing port in endpoint '{0}'")]
    MissingPort(String),
    /// Host component was empty.
    #[error("missing host in endpoint '{0}'")]
    MissingHost(String),
    /// Port component was not a valid 16-bit number.
    #[error("invalid port in endpoint '{0}'")]
    InvalidPort(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_host_and_port() {
        let endpoint = Endpoint::new(String::from("localhost"), 9877);
        assert_eq!(endpoint.to_string(), "localhost:9877");
    }

    #[test]
    fn parse_round_trips_display() {
        let endpoint: Endpoint = "127.0.0.1:9000".parse().expect("valid endpoint");
        assert_eq!(endpoint.host(), "127.0.0.1");
        assert_eq!(endpoint.port(), 9000);
    }

    #[test]
    fn parse_rejects_missing_port() {
        let error = "localhost".parse::<Endpoint>().expect_err("should fail");
        assert!(matches!(error, EndpointParseError::MissingPort(_)));
    }

    #[test]
    fn parse_rejects_out_of_range_port() {
        let error = "localhost:70000"
            .parse::<Endpoint>()
            .expect_err("should fail");
        assert!(matches!(error, EndpointParseError::InvalidPort(_)));
    }
}
