//! Server tunables.

use std::time::Duration;

/// Default listening port when neither `--port` nor `PORT` is given.
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Physics step period (about 60 Hz).
    pub tick_interval: Duration,
    /// Snapshot broadcast period.
    pub broadcast_interval: Duration,
    /// Connections beyond this are refused with a `disconnected` message.
    pub max_clients: usize,
    /// Connections silent for longer than this are dropped.
    pub client_timeout: Duration,
    /// Period of server pings; must stay well below `client_timeout`.
    pub ping_interval: Duration,
}

impl ServerConfig {
    /// Defaults with a different listening port.
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// `host:port` string for binding the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            tick_interval: Duration::from_millis(16),
            broadcast_interval: Duration::from_millis(16),
            max_clients: 22,
            client_timeout: Duration::from_secs(15),
            ping_interval: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.tick_interval, Duration::from_millis(16));
        assert_eq!(config.max_clients, 22);
        assert!(config.ping_interval < config.client_timeout);
    }

    #[test]
    fn test_with_port() {
        let config = ServerConfig::with_port(8080);
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.client_timeout, Duration::from_secs(15));
    }
}
