//! Endpoint, live connection and supervisor state.

use std::fmt;
use std::net::SocketAddr;
use tokio::net::{lookup_host, TcpStream};

/// The monitored TCP service, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Address as configured (`host:port`).
    pub name: String,
    /// Address the name resolved to.
    pub addr: SocketAddr,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            addr,
        }
    }

    /// Resolve `host:port`, keeping the first address returned.
    pub async fn resolve(name: &str) -> std::io::Result<Self> {
        let addr = lookup_host(name).await?.next().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no addresses found for {name}"),
            )
        })?;
        Ok(Self::new(name, addr))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.addr.to_string() {
            write!(f, "{}", self.addr)
        } else {
            write!(f, "{} ({})", self.name, self.addr)
        }
    }
}

/// Local and remote addresses of a connection, rendered `local->peer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub local: SocketAddr,
    pub peer: SocketAddr,
}

impl Route {
    pub fn of(stream: &TcpStream) -> std::io::Result<Self> {
        Ok(Self {
            local: stream.local_addr()?,
            peer: stream.peer_addr()?,
        })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.local, self.peer)
    }
}

/// An established connection handed from the reconnector to the probe loop.
#[derive(Debug)]
pub struct Connection {
    pub stream: TcpStream,
    pub route: Route,
    /// Connect attempts it took to establish this connection.
    pub attempts: u32,
}

/// Supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Waiting for a connect attempt to succeed.
    Acquiring,
    /// Probe loop is running on a live connection.
    Probing,
    /// Session ended; closing the connection and raising the alert.
    Closing,
}

impl ConnState {
    /// The state that follows this one. The cycle never terminates.
    pub fn next(self) -> Self {
        match self {
            ConnState::Acquiring => ConnState::Probing,
            ConnState::Probing => ConnState::Closing,
            ConnState::Closing => ConnState::Acquiring,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cycle() {
        let mut state = ConnState::Acquiring;
        state = state.next();
        assert_eq!(state, ConnState::Probing);
        state = state.next();
        assert_eq!(state, ConnState::Closing);
        state = state.next();
        assert_eq!(state, ConnState::Acquiring);
    }

    #[test]
    fn test_route_display() {
        let route = Route {
            local: "10.0.0.2:51234".parse().unwrap(),
            peer: "1.2.3.4:7".parse().unwrap(),
        };
        assert_eq!(route.to_string(), "10.0.0.2:51234->1.2.3.4:7");
    }

    #[test]
    fn test_endpoint_display() {
        let addr: SocketAddr = "127.0.0.1:7".parse().unwrap();
        assert_eq!(Endpoint::new("127.0.0.1:7", addr).to_string(), "127.0.0.1:7");
        assert_eq!(
            Endpoint::new("localhost:7", addr).to_string(),
            "localhost:7 (127.0.0.1:7)"
        );
    }

    #[tokio::test]
    async fn test_resolve_literal() {
        let endpoint = Endpoint::resolve("127.0.0.1:4000").await.unwrap();
        assert_eq!(endpoint.addr, "127.0.0.1:4000".parse().unwrap());
        assert_eq!(endpoint.name, "127.0.0.1:4000");
    }

    #[tokio::test]
    async fn test_resolve_rejects_missing_port() {
        assert!(Endpoint::resolve("127.0.0.1").await.is_err());
    }
}
