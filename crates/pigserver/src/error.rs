//! Top-level error type for the `pigserver` binary.
//!
//! Mirrors the original `main()`'s two non-zero exit paths (SPEC_FULL.md
//! §6): logger init failure and bind/listen failure. Per-connection I/O
//! failures never reach this type — SPEC_FULL.md §7's propagation policy
//! keeps those local to the connection handler task that hit them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PigServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to initialize logging in '{dir}': {source}")]
    Logging {
        dir: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] pigserver_protocol::ProtocolError),

    #[error(transparent)]
    Registry(#[from] pigserver_registry::RegistryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_the_address() {
        let addr: std::net::SocketAddr = "0.0.0.0:12345".parse().unwrap();
        let err = PigServerError::Bind {
            addr,
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("0.0.0.0:12345"));
    }
}
