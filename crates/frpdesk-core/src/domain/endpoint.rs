//! Network endpoint parsing shared by tunnel and server definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Proxy protocol understood by frp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Http,
    Https,
}

impl Protocol {
    /// Wire name as it appears in rendered frp configs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(format!(
                "unknown protocol {other:?} (expected tcp, udp, http, or https)"
            )),
        }
    }
}

/// Why an endpoint string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointParseError {
    #[error("endpoint is empty")]
    Empty,
    #[error("expected host:port, got {0:?}")]
    MissingPort(String),
    #[error("host is empty in {0:?}")]
    EmptyHost(String),
    #[error("invalid port in {0:?} (expected 1-65535)")]
    InvalidPort(String),
}

/// A `host:port` pair.
///
/// Definitions keep the raw string the user entered and derive an
/// `Endpoint` from it, so display stays faithful while start/render work
/// with parsed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Parse `"host:port"`, tolerating a leading `scheme://` prefix.
    ///
    /// The prefix is dropped rather than interpreted; the protocol an
    /// entity uses is its own field.
    pub fn parse(raw: &str) -> Result<Self, EndpointParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EndpointParseError::Empty);
        }
        let without_scheme = match trimmed.split_once("://") {
            Some((_, rest)) => rest,
            None => trimmed,
        };
        let Some((host, port)) = without_scheme.rsplit_once(':') else {
            return Err(EndpointParseError::MissingPort(trimmed.to_string()));
        };
        if host.is_empty() {
            return Err(EndpointParseError::EmptyHost(trimmed.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| EndpointParseError::InvalidPort(trimmed.to_string()))?;
        if port == 0 {
            return Err(EndpointParseError::InvalidPort(trimmed.to_string()));
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_host_port() {
        let ep = Endpoint::parse("127.0.0.1:8080").unwrap();
        assert_eq!(ep.host, "127.0.0.1");
        assert_eq!(ep.port, 8080);
    }

    #[test]
    fn tolerates_scheme_prefix() {
        let ep = Endpoint::parse("tcp://example.com:7000").unwrap();
        assert_eq!(ep.host, "example.com");
        assert_eq!(ep.port, 7000);
        assert_eq!(ep.to_string(), "example.com:7000");
    }

    #[test]
    fn rejects_missing_port() {
        assert_eq!(
            Endpoint::parse("localhost"),
            Err(EndpointParseError::MissingPort("localhost".to_string()))
        );
    }

    #[test]
    fn rejects_empty_and_bad_ports() {
        assert_eq!(Endpoint::parse("  "), Err(EndpointParseError::Empty));
        assert!(matches!(
            Endpoint::parse(":8080"),
            Err(EndpointParseError::EmptyHost(_))
        ));
        assert!(matches!(
            Endpoint::parse("host:0"),
            Err(EndpointParseError::InvalidPort(_))
        ));
        assert!(matches!(
            Endpoint::parse("host:notaport"),
            Err(EndpointParseError::InvalidPort(_))
        ));
        assert!(matches!(
            Endpoint::parse("host:70000"),
            Err(EndpointParseError::InvalidPort(_))
        ));
    }

    #[test]
    fn protocol_round_trips_through_str() {
        for proto in [Protocol::Tcp, Protocol::Udp, Protocol::Http, Protocol::Https] {
            assert_eq!(proto.as_str().parse::<Protocol>().unwrap(), proto);
        }
        assert!("spdy".parse::<Protocol>().is_err());
    }

    #[test]
    fn protocol_serializes_lowercase() {
        let json = serde_json::to_string(&Protocol::Https).unwrap();
        assert_eq!(json, "\"https\"");
    }
}
