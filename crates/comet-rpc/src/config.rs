use std::net::Ipv6Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::RPC_PATH;

fn default_port() -> u16 {
    80
}

fn default_timeout_ms() -> u64 {
    1000
}

/// Where the controller is and how long to wait for it.
///
/// Deserializes from camelCase keys so it can sit inside an application's
/// own config file:
///
/// ```json
/// { "host": "192.168.1.10", "port": 8080, "timeoutMs": 2500 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Overrides the `Referer` header, which otherwise points at the
    /// controller itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
}

impl ClientConfig {
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            referer: None,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `http://host:port`, with IPv6 literals in brackets.
    #[must_use]
    pub fn base_url(&self) -> String {
        let host = self.host.trim();
        if host.parse::<Ipv6Addr>().is_ok() {
            format!("http://[{host}]:{}", self.port)
        } else {
            format!("http://{host}:{}", self.port)
        }
    }

    #[must_use]
    pub fn rpc_url(&self) -> String {
        format!("{}{RPC_PATH}", self.base_url())
    }

    #[must_use]
    pub fn referer(&self) -> String {
        self.referer.clone().unwrap_or_else(|| self.base_url())
    }

    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` for an empty host, a host with a scheme,
    /// path or port, or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(Error::InvalidRequest("host must not be empty".to_string()));
        }
        if host.contains("://") || host.contains('/') {
            return Err(Error::InvalidRequest(format!(
                "host must be a bare hostname or address, got '{host}'"
            )));
        }
        if host.contains(':') && !is_ipv6_literal(host) {
            return Err(Error::InvalidRequest(format!(
                "host must not carry a port, use `port` instead, got '{host}'"
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidRequest(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_ipv6_literal(host: &str) -> bool {
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    bare.parse::<Ipv6Addr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("robot");
        assert_eq!(config.port, 80);
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!(config.rpc_url(), "http://robot:80/COMET/rpc");
        assert_eq!(config.referer(), "http://robot:80");
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::new("10.0.0.2")
            .with_port(3080)
            .with_timeout(Duration::from_millis(250))
            .with_referer("http://10.0.0.2/");
        assert_eq!(config.base_url(), "http://10.0.0.2:3080");
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.referer(), "http://10.0.0.2/");
    }

    #[test]
    fn test_deserialize_camel_case_with_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"host":"robot","timeoutMs":2500}"#).unwrap();
        assert_eq!(config.port, 80);
        assert_eq!(config.timeout_ms, 2500);
        assert!(config.referer.is_none());
    }

    #[test]
    fn test_serialize_skips_missing_referer() {
        let json = serde_json::to_value(ClientConfig::new("robot")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"host": "robot", "port": 80, "timeoutMs": 1000})
        );
    }

    #[test]
    fn test_ipv6_host_is_bracketed() {
        let config = ClientConfig::new("::1").with_port(8080);
        assert!(config.validate().is_ok());
        assert_eq!(config.base_url(), "http://[::1]:8080");
        assert_eq!(config.rpc_url(), "http://[::1]:8080/COMET/rpc");

        let config = ClientConfig::new("[fe80::1]");
        assert!(config.validate().is_ok());
        assert_eq!(config.base_url(), "http://[fe80::1]:80");
    }

    #[test]
    fn test_host_with_port_rejected() {
        assert!(ClientConfig::new("robot:8080").validate().is_err());
        assert!(ClientConfig::new("10.0.0.2:80").validate().is_err());
    }

    #[test]
    fn test_validate() {
        assert!(ClientConfig::new("robot").validate().is_ok());
        assert!(ClientConfig::new("  ").validate().is_err());
        assert!(ClientConfig::new("http://robot").validate().is_err());
        assert!(
            ClientConfig::new("robot")
                .with_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
