//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;

use tokio::signal;
use tokio::task::JoinHandle;

use ecosight_common::{KeyExprBuilder, LoggingConfig, connect, init_tracing};

use crate::BridgeArgs;
use crate::commands::{CommandRegistry, serve_commands};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::liveliness::LivelinessManager;
use crate::publisher::AttributePublisher;
use crate::status::StatusPublisher;

/// Bridge runner that manages the lifecycle of a bridge.
///
/// Handles:
/// - Logging initialization
/// - Zenoh connection
/// - Liveliness tokens for the bridge and its devices
/// - Task spawning and management
/// - Graceful shutdown on Ctrl+C
/// - Status publishing
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging and status.
    name: String,
    /// The loaded configuration.
    config: C,
    /// Zenoh session.
    session: Arc<zenoh::Session>,
    /// Attribute publisher.
    publisher: AttributePublisher,
    /// Presence tokens.
    liveliness: Arc<LivelinessManager>,
    /// Status publisher.
    status_publisher: StatusPublisher,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner.
    pub async fn new(name: impl Into<String>, config: C) -> Result<Self> {
        Self::new_with_args(name, config, None).await
    }

    /// Create a new bridge runner with CLI args for log level override.
    ///
    /// This will:
    /// 1. Initialize logging based on config (with optional CLI override)
    /// 2. Connect to Zenoh
    /// 3. Declare the bridge liveliness token
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        let log_config = match args.and_then(|a| a.log_level.clone()) {
            Some(level) => LoggingConfig {
                level,
                format: config.logging().format,
            },
            None => config.logging().clone(),
        };

        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let session = Arc::new(
            connect(config.zenoh())
                .await
                .map_err(|e| BridgeError::ZenohConnection(e.to_string()))?,
        );

        let publisher = AttributePublisher::new(
            session.clone(),
            config.key_prefix(),
            config.serialization(),
        );
        let liveliness =
            Arc::new(LivelinessManager::new(session.clone(), publisher.keys().clone()).await?);
        let status_publisher = StatusPublisher::new(publisher.clone(), &name, &version);

        Ok(Self {
            name,
            config,
            session,
            publisher,
            liveliness,
            status_publisher,
            tasks: Vec::new(),
        })
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get a clone of the attribute publisher.
    pub fn publisher(&self) -> AttributePublisher {
        self.publisher.clone()
    }

    /// Key expression builder for this bridge.
    pub fn keys(&self) -> &KeyExprBuilder {
        self.publisher.keys()
    }

    /// Shared liveliness manager.
    pub fn liveliness(&self) -> Arc<LivelinessManager> {
        self.liveliness.clone()
    }

    /// Publish an "error" status, e.g. when startup fails after connecting.
    pub async fn report_error(&self, error: impl Into<String>) {
        if let Err(e) = self.status_publisher.publish_error(error).await {
            tracing::warn!(error = %e, "Failed to publish error status");
        }
    }

    /// Spawn a worker task.
    ///
    /// The task will be tracked and aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(future));
    }

    /// Spawn a worker task that returns a Result.
    ///
    /// Errors are logged automatically.
    pub fn spawn_with_error<F, E>(&mut self, name: String, future: F)
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = future.await {
                tracing::error!(worker = %name, error = %e, "Worker failed");
            }
        }));
    }

    /// Start dispatching endpoint commands received over Zenoh.
    pub fn serve_commands(&mut self, registry: CommandRegistry) {
        let session = self.session.clone();
        let keys = self.keys().clone();
        self.spawn_with_error(
            "commands".to_string(),
            serve_commands(session, keys, Arc::new(registry)),
        );
    }

    /// Run the bridge with custom status metadata and a shutdown hook.
    ///
    /// This will:
    /// 1. Publish "running" status
    /// 2. Wait for Ctrl+C signal
    /// 3. Abort all spawned tasks
    /// 4. Await `on_shutdown`
    /// 5. Undeclare device tokens and publish "offline" status
    /// 6. Close the Zenoh session
    pub async fn run_with_metadata<F>(
        self,
        metadata: Option<serde_json::Value>,
        on_shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if let Err(e) = self.status_publisher.publish_running(metadata).await {
            tracing::warn!(error = %e, "Failed to publish running status");
        }

        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        for task in &self.tasks {
            task.abort();
        }

        on_shutdown.await;

        self.liveliness.undeclare_all_devices().await;

        if let Err(e) = self.status_publisher.publish_offline().await {
            tracing::warn!(error = %e, "Failed to publish offline status");
        }

        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}
