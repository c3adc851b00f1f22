//! Endpoint names.
//!
//! Participants address the coordinator's slots by a stable name of the
//! form `<host>:<port>/<slot>`: slot 0 is the registry/directory, slots
//! 1..N are rooms.

use std::fmt;
use std::str::FromStr;

use atria_protocol::Slot;

/// Errors from parsing an endpoint name.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EndpointError {
    /// The name is not of the form `<host>:<port>/<slot>`.
    #[error("malformed endpoint name: {0}")]
    Malformed(String),
}

/// A parsed `<host>:<port>/<slot>` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Coordinator host.
    pub host: String,
    /// Coordinator port.
    pub port: u16,
    /// Target slot (0 = registry, 1..N = rooms).
    pub slot: Slot,
}

impl Endpoint {
    /// Builds an endpoint from parts.
    pub fn new(host: impl Into<String>, port: u16, slot: Slot) -> Self {
        Self {
            host: host.into(),
            port,
            slot,
        }
    }

    /// The `host:port` part — what the transport actually dials. All of
    /// one coordinator's slots share it.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || EndpointError::Malformed(s.to_string());

        let (authority, slot) = s.split_once('/').ok_or_else(malformed)?;
        let (host, port) = authority.rsplit_once(':').ok_or_else(malformed)?;
        if host.is_empty() {
            return Err(malformed());
        }
        let port: u16 = port.parse().map_err(|_| malformed())?;
        let slot: u16 = slot.parse().map_err(|_| malformed())?;

        Ok(Self {
            host: host.to_string(),
            port,
            slot: Slot(slot),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.slot.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_parses_host_port_slot() {
        let endpoint: Endpoint = "coord.example:7320/3".parse().unwrap();
        assert_eq!(endpoint.host, "coord.example");
        assert_eq!(endpoint.port, 7320);
        assert_eq!(endpoint.slot, Slot(3));
    }

    #[test]
    fn test_from_str_slot_zero_is_registry() {
        let endpoint: Endpoint = "127.0.0.1:7320/0".parse().unwrap();
        assert!(endpoint.slot.is_registry());
    }

    #[test]
    fn test_from_str_rejects_malformed_names() {
        for bad in [
            "coord.example",        // no port, no slot
            "coord.example:7320",   // no slot
            "coord.example/3",      // no port
            ":7320/3",              // empty host
            "coord.example:x/3",    // non-numeric port
            "coord.example:7320/x", // non-numeric slot
        ] {
            assert!(
                bad.parse::<Endpoint>().is_err(),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_display_round_trips() {
        let endpoint = Endpoint::new("coord.example", 7320, Slot(5));
        let printed = endpoint.to_string();
        assert_eq!(printed, "coord.example:7320/5");
        assert_eq!(printed.parse::<Endpoint>().unwrap(), endpoint);
    }

    #[test]
    fn test_authority_drops_the_slot() {
        let endpoint = Endpoint::new("coord.example", 7320, Slot(5));
        assert_eq!(endpoint.authority(), "coord.example:7320");
    }
}
