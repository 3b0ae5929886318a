//! Outbound switch commands.
//!
//! Commands are fire-and-forget: a publish that the broker accepts counts as
//! success. The switch attributes only change once telemetry reports the new
//! `showFlag`.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use ecosight_bridge_framework::{CommandError, CommandRegistry};

use crate::endpoints::EndpointKind;
use crate::error::TransportError;
use crate::registry::DeviceEndpoints;

/// Default command code of the AC output switch.
pub const DEFAULT_AC_SWITCH_CODE: &str = "YJ751_PD_AC_DSG_SET";
/// Default command code of the DC output switch.
pub const DEFAULT_DC_SWITCH_CODE: &str = "YJ751_PD_DC_SWITCH_SET";

/// Command names accepted on switch endpoints.
pub const COMMAND_ON: &str = "on";
pub const COMMAND_OFF: &str = "off";

/// Publishes raw control messages to the device broker.
pub trait CommandTransport: Send + Sync {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T: CommandTransport> CommandTransport for Arc<T> {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).publish(topic, payload)
    }
}

/// Device command codes per switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandCodes {
    pub ac_switch: String,
    pub dc_switch: String,
}

impl Default for CommandCodes {
    fn default() -> Self {
        Self {
            ac_switch: DEFAULT_AC_SWITCH_CODE.to_string(),
            dc_switch: DEFAULT_DC_SWITCH_CODE.to_string(),
        }
    }
}

/// Body published on `/open/<account>/<serial>/set`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCommand {
    pub id: i64,
    pub version: String,
    pub sn: String,
    pub cmd_code: String,
    pub params: SetParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetParams {
    /// 1 on, 0 off.
    pub enable: u8,
}

impl SetCommand {
    pub fn new(serial: &str, cmd_code: &str, enable: bool) -> Self {
        Self {
            id: chrono::Utc::now().timestamp_millis(),
            version: "1.0".to_string(),
            sn: serial.to_string(),
            cmd_code: cmd_code.to_string(),
            params: SetParams {
                enable: u8::from(enable),
            },
        }
    }
}

/// Topic accepting control messages for `serial`.
pub fn set_topic(account: &str, serial: &str) -> String {
    format!("/open/{}/{}/set", account, serial)
}

/// Issues AC/DC switch commands over a [`CommandTransport`].
#[derive(Debug)]
pub struct SwitchCommands<T> {
    transport: T,
    account: String,
    codes: CommandCodes,
}

impl<T: CommandTransport + 'static> SwitchCommands<T> {
    pub fn new(transport: T, account: impl Into<String>, codes: CommandCodes) -> Self {
        Self {
            transport,
            account: account.into(),
            codes,
        }
    }

    /// Command code for a switch endpoint.
    pub fn code_for(&self, kind: EndpointKind) -> Option<&str> {
        match kind {
            EndpointKind::AcSwitch => Some(&self.codes.ac_switch),
            EndpointKind::DcSwitch => Some(&self.codes.dc_switch),
            _ => None,
        }
    }

    /// Publish the set command for `kind` on `serial`.
    pub async fn set_switch(
        &self,
        serial: &str,
        kind: EndpointKind,
        on: bool,
    ) -> Result<(), CommandError> {
        let command = if on { COMMAND_ON } else { COMMAND_OFF };
        let failed = |reason: String| CommandError::Failed {
            endpoint: format!("{}/{}", serial, kind),
            command: command.to_string(),
            reason,
        };

        let code = self
            .code_for(kind)
            .ok_or_else(|| failed("not a switch endpoint".to_string()))?;
        let body = SetCommand::new(serial, code, on);
        let payload = serde_json::to_vec(&body).map_err(|e| failed(e.to_string()))?;
        let topic = set_topic(&self.account, serial);

        self.transport
            .publish(&topic, payload)
            .await
            .map_err(|e| failed(e.to_string()))?;

        tracing::debug!(topic = %topic, cmd_code = %code, enable = on, "Published switch command");
        Ok(())
    }

    /// Bind `on`/`off` on every switch endpoint of `device`.
    pub fn register(self: &Arc<Self>, registry: &mut CommandRegistry, device: &DeviceEndpoints) {
        for kind in [EndpointKind::AcSwitch, EndpointKind::DcSwitch] {
            let Some(endpoint) = device.get(kind) else {
                continue;
            };

            for (command, on) in [(COMMAND_ON, true), (COMMAND_OFF, false)] {
                let commands = Arc::clone(self);
                let serial = device.serial().to_string();
                registry.register(endpoint, command, move || {
                    let commands = Arc::clone(&commands);
                    let serial = serial.clone();
                    async move { commands.set_switch(&serial, kind, on).await }
                });
            }
        }
    }
}
