//! Centralized configuration for farcall.
//!
//! Configuration constants for the framed TCP transport, client defaults and
//! registry parsing.

use std::time::Duration;

/// Framed TCP transport configuration.
pub struct IpcConfig;

impl IpcConfig {
    pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16MB
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const MAX_CONNECTIONS: usize = 256;
}

/// Client-side defaults.
pub struct ClientConfig;

impl ClientConfig {
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 1090;
    /// Environment variable that overrides the computed service URL.
    pub const SERVICE_URL_ENV: &'static str = "FARCALL_SERVICE_URL";
    pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const HTTP_RPC_PATH: &'static str = "/rpc";
    pub const HTTP_HEALTH_PATH: &'static str = "/health";
}

/// Instance registry configuration.
pub struct RegistryConfig;

impl RegistryConfig {
    pub const NAME_SEPARATOR: char = ',';
}

/// Service URL for a host and port.
///
/// `FARCALL_SERVICE_URL` wins when set. Missing host or a zero port fall back
/// to [`ClientConfig::DEFAULT_HOST`] and [`ClientConfig::DEFAULT_PORT`].
pub fn service_url(host: Option<&str>, port: Option<u16>) -> String {
    if let Ok(url) = std::env::var(ClientConfig::SERVICE_URL_ENV) {
        if !url.trim().is_empty() {
            return url;
        }
    }
    default_service_url(host, port)
}

/// Service URL ignoring the environment override.
pub fn default_service_url(host: Option<&str>, port: Option<u16>) -> String {
    let host = host
        .filter(|h| !h.trim().is_empty())
        .unwrap_or(ClientConfig::DEFAULT_HOST);
    let port = port
        .filter(|p| *p > 0)
        .unwrap_or(ClientConfig::DEFAULT_PORT);
    format!("tcp://{}:{}", host, port)
}

/// Split a comma-separated name list, trimming entries and skipping blanks.
pub fn parse_names(csv: &str) -> Vec<String> {
    csv.split(RegistryConfig::NAME_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Serializes tests that read or write `FARCALL_SERVICE_URL`.
#[cfg(test)]
pub(crate) static SERVICE_URL_ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_service_url() {
        assert_eq!(default_service_url(None, None), "tcp://localhost:1090");
        assert_eq!(default_service_url(Some(""), Some(0)), "tcp://localhost:1090");
        assert_eq!(
            default_service_url(Some("10.0.0.2"), Some(4447)),
            "tcp://10.0.0.2:4447"
        );
    }

    #[test]
    fn test_service_url_env_override_wins() {
        let _guard = SERVICE_URL_ENV_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        std::env::remove_var(ClientConfig::SERVICE_URL_ENV);
        assert_eq!(service_url(None, None), "tcp://localhost:1090");
        assert_eq!(service_url(Some("db1"), Some(9999)), "tcp://db1:9999");

        std::env::set_var(ClientConfig::SERVICE_URL_ENV, "http://gateway:8080/rpc");
        assert_eq!(service_url(Some("db1"), Some(9999)), "http://gateway:8080/rpc");

        // Blank override is ignored.
        std::env::set_var(ClientConfig::SERVICE_URL_ENV, "  ");
        assert_eq!(service_url(Some("db1"), None), "tcp://db1:1090");

        std::env::remove_var(ClientConfig::SERVICE_URL_ENV);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(parse_names(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(parse_names("").is_empty());
        assert!(parse_names(" , ").is_empty());
    }

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(IpcConfig::CONNECT_TIMEOUT > Duration::ZERO);
        assert!(ClientConfig::HTTP_REQUEST_TIMEOUT > ClientConfig::HTTP_CONNECT_TIMEOUT);
    }
}
