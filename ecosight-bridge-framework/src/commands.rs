//! Endpoint command handlers.
//!
//! Commands arrive on `<prefix>/<device>/<endpoint>/@/command` with either a
//! JSON body (`{"command": "on"}`) or the bare command name as text. The
//! outcome of every command is published on `.../@/command/result`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zenoh::Session;

use ecosight_common::{KeyExprBuilder, parse_command_key};

use crate::endpoint::EndpointHandle;

type Handler = Arc<dyn Fn() -> BoxFuture<'static, Result<(), CommandError>> + Send + Sync>;

/// Why a command did not take effect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// No handler is registered for this endpoint/command pair.
    #[error("No handler for command '{command}' on {endpoint}")]
    NotRegistered { endpoint: String, command: String },

    /// The request body could not be understood.
    #[error("Malformed command request: {0}")]
    Malformed(String),

    /// The handler ran and reported a failure.
    #[error("Command '{command}' on {endpoint} failed: {reason}")]
    Failed {
        endpoint: String,
        command: String,
        reason: String,
    },
}

/// Command request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

impl CommandRequest {
    /// Parse a JSON request, or fall back to the trimmed UTF-8 text as the command name.
    pub fn parse(payload: &[u8]) -> Result<Self, CommandError> {
        if let Ok(request) = serde_json::from_slice::<CommandRequest>(payload) {
            return Ok(request);
        }

        let text = std::str::from_utf8(payload)
            .map_err(|e| CommandError::Malformed(e.to_string()))?
            .trim();

        if text.is_empty() || text.starts_with('{') {
            return Err(CommandError::Malformed(format!(
                "expected {{\"command\": ...}} or a command name, got '{}'",
                text
            )));
        }

        Ok(Self {
            command: text.to_string(),
        })
    }
}

/// Outcome published after a command ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandOutcome {
    fn from_result(command: &str, result: &Result<(), CommandError>) -> Self {
        Self {
            command: command.to_string(),
            ok: result.is_ok(),
            error: result.as_ref().err().map(ToString::to_string),
        }
    }
}

/// Maps `(device, endpoint, command)` to an async handler.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    handlers: HashMap<(String, String, String), Handler>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.handlers.keys().collect();
        keys.sort();
        f.debug_struct("CommandRegistry")
            .field("handlers", &keys)
            .finish()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `command` on `endpoint` to `handler`.
    ///
    /// Registering the same pair twice replaces the earlier handler.
    pub fn register<F, Fut>(&mut self, endpoint: &EndpointHandle, command: &str, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CommandError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move || handler().boxed());
        let key = (
            endpoint.device().to_string(),
            endpoint.endpoint().to_string(),
            command.to_string(),
        );

        if self.handlers.insert(key, handler).is_some() {
            tracing::debug!(endpoint = %endpoint, command = %command, "Replaced command handler");
        } else {
            tracing::debug!(endpoint = %endpoint, command = %command, "Registered command handler");
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `command` on `device/endpoint`.
    pub async fn dispatch(&self, device: &str, endpoint: &str, command: &str) -> CommandOutcome {
        let key = (device.to_string(), endpoint.to_string(), command.to_string());

        let result = match self.handlers.get(&key) {
            Some(handler) => handler().await,
            None => Err(CommandError::NotRegistered {
                endpoint: format!("{}/{}", device, endpoint),
                command: command.to_string(),
            }),
        };

        match &result {
            Ok(()) => {
                tracing::info!(device = %device, endpoint = %endpoint, command = %command, "Command sent")
            }
            Err(e) => {
                tracing::warn!(device = %device, endpoint = %endpoint, command = %command, error = %e, "Command failed")
            }
        }

        CommandOutcome::from_result(command, &result)
    }
}

/// Receive commands from Zenoh and dispatch them until the subscriber closes.
///
/// Commands are handled one at a time in arrival order.
pub async fn serve_commands(
    session: Arc<Session>,
    keys: KeyExprBuilder,
    registry: Arc<CommandRegistry>,
) -> crate::Result<()> {
    let key_expr = keys.command_wildcard();
    let subscriber = session.declare_subscriber(&key_expr).await?;

    tracing::info!(key_expr = %key_expr, handlers = registry.len(), "Listening for commands");

    while let Ok(sample) = subscriber.recv_async().await {
        let key = sample.key_expr().as_str();
        let Some(target) = parse_command_key(keys.prefix(), key) else {
            tracing::debug!(key = %key, "Ignoring sample on unexpected command key");
            continue;
        };

        let payload = sample.payload().to_bytes();
        let outcome = match CommandRequest::parse(&payload) {
            Ok(request) => {
                registry
                    .dispatch(target.device, target.endpoint, &request.command)
                    .await
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Dropping malformed command");
                CommandOutcome::from_result("", &Err(e))
            }
        };

        let result_key = keys.command_result(target.device, target.endpoint);
        match serde_json::to_vec(&outcome) {
            Ok(body) => {
                if let Err(e) = session.put(&result_key, body).await {
                    tracing::warn!(key = %result_key, error = %e, "Failed to publish command outcome");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode command outcome"),
        }
    }

    tracing::info!("Command subscriber closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::AttributeId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SWITCH: &[AttributeId] = &[AttributeId::new("onOff", "onOff")];

    #[test]
    fn test_parse_request() {
        assert_eq!(
            CommandRequest::parse(br#"{"command":"on"}"#).unwrap().command,
            "on"
        );
        assert_eq!(CommandRequest::parse(b" off\n").unwrap().command, "off");
        assert!(CommandRequest::parse(b"").is_err());
        assert!(CommandRequest::parse(br#"{"cmd":"on"}"#).is_err());
        assert!(CommandRequest::parse(&[0xff, 0xfe]).is_err());
    }

    #[tokio::test]
    async fn test_dispatch_runs_registered_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoint = EndpointHandle::new("DPU123", "ACSwitch", SWITCH);

        let mut registry = CommandRegistry::new();
        let counter = calls.clone();
        registry.register(&endpoint, "on", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let outcome = registry.dispatch("DPU123", "ACSwitch", "on").await;
        assert!(outcome.ok);
        assert_eq!(outcome.error, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_surfaces_failures() {
        let endpoint = EndpointHandle::new("DPU123", "DCSwitch", SWITCH);
        let mut registry = CommandRegistry::new();
        registry.register(&endpoint, "off", || async {
            Err(CommandError::Failed {
                endpoint: "DPU123/DCSwitch".into(),
                command: "off".into(),
                reason: "broker unavailable".into(),
            })
        });

        let outcome = registry.dispatch("DPU123", "DCSwitch", "off").await;
        assert!(!outcome.ok);
        assert!(outcome.error.unwrap().contains("broker unavailable"));

        let outcome = registry.dispatch("DPU123", "DCSwitch", "toggle").await;
        assert!(!outcome.ok);
        assert!(outcome.error.unwrap().contains("No handler"));
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = CommandOutcome::from_result("on", &Ok(()));
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"command":"on","ok":true}"#);
    }
}
