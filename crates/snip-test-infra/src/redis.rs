use crate::error::{Result, TestInfraError};
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

const REDIS_IMAGE: &str = "redis";
const REDIS_TAG: &str = "7.4";
const REDIS_PORT: u16 = 6379;
const READY_ATTEMPTS: usize = 20;

/// A throwaway single-node Redis server.
///
/// The container is removed when the value is dropped.
pub struct RedisServer {
    _container: ContainerAsync<GenericImage>,
    url: String,
}

impl RedisServer {
    /// Starts a container and waits until it answers `PING`.
    pub async fn start() -> Result<Self> {
        let container = GenericImage::new(REDIS_IMAGE, REDIS_TAG)
            .with_exposed_port(REDIS_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
            .start()
            .await?;

        let host = match container.get_host().await?.to_string().as_str() {
            "localhost" => String::from("127.0.0.1"),
            other => other.to_string(),
        };
        let port = container.get_host_port_ipv4(REDIS_PORT).await?;

        let server = Self {
            _container: container,
            url: format!("redis://{host}:{port}"),
        };
        server.wait_ready().await?;
        Ok(server)
    }

    /// The `redis://host:port` URL of the server.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Opens a fresh multiplexed connection to the server.
    pub async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let client = redis::Client::open(self.url.as_str())?;
        Ok(client.get_multiplexed_async_connection().await?)
    }

    async fn wait_ready(&self) -> Result<()> {
        let mut last_error = String::new();
        for _ in 0..READY_ATTEMPTS {
            match self.ping().await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = e.to_string(),
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Err(TestInfraError::NotReady(last_error))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}
