//! Classification and dispatch of inbound broker messages.

use std::sync::Arc;

use ecosight_bridge_framework::{AttributeSink, WriteStats};

use crate::error::SchemaError;
use crate::projector::Projector;
use crate::registry::DeviceRegistry;
use crate::schema::{self, Envelope, Family, FamilyParams, StatusMessage};

/// Which per-device topic a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Quota,
    Status,
}

/// Split `/open/<account>/<serial>/<kind>` into serial and kind.
///
/// The serial is the fourth `/`-delimited segment. The kind is `None` for
/// unrecognized suffixes.
pub fn parse_topic(topic: &str) -> Option<(&str, Option<TopicKind>)> {
    let mut segments = topic.split('/').skip(3);
    let serial = segments.next().filter(|s| !s.is_empty())?;
    let kind = match segments.next() {
        Some("quota") => Some(TopicKind::Quota),
        Some("status") => Some(TopicKind::Status),
        _ => None,
    };
    Some((serial, kind))
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// The serial is not tracked here; nothing written.
    UnknownDevice,
    /// Topic shape not understood.
    UnknownTopic,
    /// Envelope rejected; message dropped.
    InvalidEnvelope(SchemaError),
    /// Family payload rejected; projection skipped.
    InvalidParams { cmd_id: i64, error: SchemaError },
    /// Rules evaluated and writes attempted.
    Projected { cmd_id: i64, stats: WriteStats },
    /// Validated but no rule set applies (settings echo).
    Observed { cmd_id: i64 },
    /// `cmdId` with no known family.
    UnhandledCommand { cmd_id: i64 },
    /// Connectivity report from the `status` topic.
    DeviceStatus { serial: String, online: bool },
    /// Status body rejected.
    InvalidStatus(SchemaError),
}

/// Single entry point for inbound messages.
///
/// Callers must not invoke [`TelemetryRouter::handle_message`] concurrently;
/// each call completes all its writes before returning.
pub struct TelemetryRouter<S> {
    registry: Arc<DeviceRegistry>,
    projector: Projector,
    sink: S,
}

impl<S: AttributeSink> TelemetryRouter<S> {
    pub fn new(registry: Arc<DeviceRegistry>, projector: Projector, sink: S) -> Self {
        Self {
            registry,
            projector,
            sink,
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Route one message to completion.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> RouteOutcome {
        let Some((serial, kind)) = parse_topic(topic) else {
            tracing::debug!(topic = %topic, "Ignoring message on unexpected topic");
            return RouteOutcome::UnknownTopic;
        };

        let Some(device) = self.registry.lookup(serial) else {
            tracing::trace!(serial = %serial, "Message for untracked device");
            return RouteOutcome::UnknownDevice;
        };

        match kind {
            Some(TopicKind::Quota) => {}
            Some(TopicKind::Status) => {
                return match StatusMessage::parse(payload) {
                    Ok(status) => RouteOutcome::DeviceStatus {
                        serial: serial.to_string(),
                        online: status.online(),
                    },
                    Err(e) => {
                        tracing::warn!(topic = %topic, error = %e, "Dropping malformed status message");
                        RouteOutcome::InvalidStatus(e)
                    }
                };
            }
            None => {
                tracing::debug!(topic = %topic, "Ignoring message on unexpected topic");
                return RouteOutcome::UnknownTopic;
            }
        }

        let envelope = match Envelope::parse(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(
                    topic = %topic,
                    cmd_id = ?schema::peek_cmd_id(payload),
                    error = %e,
                    "Dropping malformed message"
                );
                return RouteOutcome::InvalidEnvelope(e);
            }
        };
        let cmd_id = envelope.cmd_id;

        let Some(family) = Family::from_cmd_id(cmd_id) else {
            tracing::info!(
                serial = %serial,
                cmd_id,
                cmd_func = envelope.cmd_func,
                addr = %envelope.addr,
                "Unhandled cmdId"
            );
            return RouteOutcome::UnhandledCommand { cmd_id };
        };

        let params = match FamilyParams::validate(family, envelope.params()) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(topic = %topic, cmd_id, error = %e, "Dropping malformed parameters");
                return RouteOutcome::InvalidParams { cmd_id, error: e };
            }
        };

        if let FamilyParams::SetInfo(info) = &params {
            tracing::debug!(serial = %serial, cmd_id, params = ?info, "Settings echo");
            return RouteOutcome::Observed { cmd_id };
        }

        let writes = self.projector.project(device, &params);
        let stats = self.projector.apply(&self.sink, writes).await;
        tracing::debug!(
            serial = %serial,
            cmd_id,
            written = stats.success,
            failed = stats.failed,
            "Projected message"
        );
        RouteOutcome::Projected { cmd_id, stats }
    }
}
