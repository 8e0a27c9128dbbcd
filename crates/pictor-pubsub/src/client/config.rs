//! Bus connection configuration and credentials.

use std::time::Duration;

/// Configuration for bus connections.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// NATS server URL(s).
    pub servers: Vec<String>,
    /// Connection name for debugging.
    pub name: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Maximum reconnection attempts.
    pub max_reconnects: Option<usize>,
    /// Base reconnection delay; backs off exponentially up to 30 seconds.
    pub reconnect_delay: Duration,
    /// Authentication credentials.
    pub credentials: Option<BusCredentials>,
}

/// Authentication credentials for the bus.
#[derive(Debug, Clone)]
pub enum BusCredentials {
    /// Username and password authentication.
    UserPassword { user: String, pass: String },
    /// Token authentication.
    Token { token: String },
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://127.0.0.1:4222".to_string()],
            name: "pictor-pubsub".to_string(),
            connect_timeout: Duration::from_secs(10),
            max_reconnects: Some(10),
            reconnect_delay: Duration::from_secs(2),
            credentials: None,
        }
    }
}

impl BusConfig {
    /// Creates a new configuration with the given server URL.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            servers: vec![server_url.into()],
            ..Default::default()
        }
    }

    /// Adds multiple server URLs for clustering.
    pub fn with_servers(mut self, servers: Vec<String>) -> Self {
        self.servers = servers;
        self
    }

    /// Sets the connection name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets authentication credentials.
    pub fn with_credentials(mut self, credentials: BusCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Creates configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(servers) = std::env::var("NATS_SERVERS") {
            config.servers = servers.split(',').map(|s| s.trim().to_string()).collect();
        } else if let Ok(url) = std::env::var("NATS_URL") {
            config.servers = vec![url];
        }

        if let Ok(name) = std::env::var("NATS_CLIENT_NAME") {
            config.name = name;
        }

        if let Ok(timeout_str) = std::env::var("NATS_CONNECT_TIMEOUT")
            && let Ok(timeout_secs) = timeout_str.parse::<u64>()
        {
            config.connect_timeout = Duration::from_secs(timeout_secs);
        }

        if let (Ok(user), Ok(pass)) = (std::env::var("NATS_USER"), std::env::var("NATS_PASS")) {
            config.credentials = Some(BusCredentials::UserPassword { user, pass });
        } else if let Ok(token) = std::env::var("NATS_TOKEN") {
            config.credentials = Some(BusCredentials::Token { token });
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_local_server() {
        let config = BusConfig::default();
        assert_eq!(config.servers, vec!["nats://127.0.0.1:4222".to_string()]);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn builder_methods_compose() {
        let config = BusConfig::new("nats://bus.internal:4222")
            .with_name("render-worker")
            .with_connect_timeout(Duration::from_secs(3));

        assert_eq!(config.servers, vec!["nats://bus.internal:4222".to_string()]);
        assert_eq!(config.name, "render-worker");
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
    }
}
