//! Bus client wrapper and connection management.

use std::time::Duration;

use async_nats::{Client, ConnectOptions, jetstream};
use tokio::time::timeout;
use tracing::{debug, info, instrument};

use super::config::{BusConfig, BusCredentials};
use crate::{Error, Result, TRACING_TARGET_CLIENT};

/// Bus client wrapper with connection management.
///
/// One client per process: the underlying connection and JetStream context are
/// constructed once and shared read-only by every [`crate::TopicRegistry`] and
/// [`crate::MessageBus`] built from this client.
#[derive(Debug, Clone)]
pub struct BusClient {
    client: Client,
    jetstream: jetstream::Context,
    config: BusConfig,
}

impl BusClient {
    /// Creates a new bus client and connects.
    #[instrument(skip(config))]
    pub async fn connect(config: BusConfig) -> Result<Self> {
        info!(
            target: TRACING_TARGET_CLIENT,
            servers = ?config.servers,
            "Connecting to NATS servers"
        );

        let mut connect_opts = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout);

        if let Some(max_reconnects) = config.max_reconnects {
            connect_opts = connect_opts.max_reconnects(max_reconnects);
        }
        let reconnect_delay_ms = config.reconnect_delay.as_millis() as u64;
        connect_opts = connect_opts.reconnect_delay_callback(move |attempts| {
            Duration::from_millis(std::cmp::min(
                reconnect_delay_ms * 2_u64.pow(attempts as u32),
                30_000,
            ))
        });

        if let Some(credentials) = &config.credentials {
            connect_opts = match credentials {
                BusCredentials::UserPassword { user, pass } => {
                    connect_opts.user_and_password(user.clone(), pass.clone())
                }
                BusCredentials::Token { token } => connect_opts.token(token.clone()),
            };
        }

        let client = timeout(
            config.connect_timeout,
            async_nats::connect_with_options(&config.servers.join(","), connect_opts),
        )
        .await
        .map_err(|_| Error::timeout(config.connect_timeout))?
        .map_err(|e| Error::Connection(Box::new(e)))?;

        let jetstream = jetstream::new(client.clone());

        let server_info = client.server_info();
        info!(
            target: TRACING_TARGET_CLIENT,
            server_host = %server_info.host,
            server_version = %server_info.version,
            "Connected to NATS"
        );

        Ok(Self {
            client,
            jetstream,
            config,
        })
    }

    /// Returns the underlying NATS client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Returns the JetStream context.
    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Tests connectivity with a ping.
    #[instrument(skip(self), target = TRACING_TARGET_CLIENT)]
    pub async fn ping(&self) -> Result<Duration> {
        let start = std::time::Instant::now();

        timeout(Duration::from_secs(10), self.client.flush())
            .await
            .map_err(|_| Error::timeout(Duration::from_secs(10)))?
            .map_err(|e| Error::Connection(Box::new(e)))?;

        let ping_time = start.elapsed();
        debug!(
            target: TRACING_TARGET_CLIENT,
            duration_ms = ping_time.as_millis(),
            "NATS ping successful"
        );
        Ok(ping_time)
    }
}
