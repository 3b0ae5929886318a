//! Key expression builders and parsers.
//!
//! Attribute keys follow the pattern
//! `<prefix>/<device>/<endpoint>/<namespace>/<attribute>`, where the prefix may
//! itself contain `/` (e.g. `ecosight/ecoflow`). Bridge-level metadata lives
//! under `<prefix>/@/...`, endpoint commands under `<prefix>/<device>/<endpoint>/@/command`.

/// Default key expression root for all EcoSight data.
pub const KEY_PREFIX: &str = "ecosight";

/// Builder for constructing EcoSight key expressions.
#[derive(Debug, Clone)]
pub struct KeyExprBuilder {
    prefix: String,
}

impl KeyExprBuilder {
    /// Create a builder for the given bridge prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// The bridge prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the key of a single attribute.
    ///
    /// # Example
    /// ```
    /// use ecosight_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::new("ecosight/ecoflow");
    /// let key = builder.attribute("DPU123", "Battery", "powerSource", "batPercentRemaining");
    /// assert_eq!(key, "ecosight/ecoflow/DPU123/Battery/powerSource/batPercentRemaining");
    /// ```
    pub fn attribute(&self, device: &str, endpoint: &str, namespace: &str, name: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.prefix, device, endpoint, namespace, name
        )
    }

    /// Build the key of a sub-endpoint.
    pub fn endpoint(&self, device: &str, endpoint: &str) -> String {
        format!("{}/{}/{}", self.prefix, device, endpoint)
    }

    /// Build a wildcard key expression for everything published for a device.
    ///
    /// # Example
    /// ```
    /// use ecosight_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::new("ecosight/ecoflow");
    /// assert_eq!(builder.device_wildcard("DPU123"), "ecosight/ecoflow/DPU123/**");
    /// ```
    pub fn device_wildcard(&self, device: &str) -> String {
        format!("{}/{}/**", self.prefix, device)
    }

    /// Key on which commands for an endpoint are received.
    pub fn command(&self, device: &str, endpoint: &str) -> String {
        format!("{}/{}/{}/@/command", self.prefix, device, endpoint)
    }

    /// Key on which command outcomes for an endpoint are published.
    pub fn command_result(&self, device: &str, endpoint: &str) -> String {
        format!("{}/{}/{}/@/command/result", self.prefix, device, endpoint)
    }

    /// Wildcard matching the command key of every endpoint of every device.
    ///
    /// # Example
    /// ```
    /// use ecosight_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::new("ecosight/ecoflow");
    /// assert_eq!(builder.command_wildcard(), "ecosight/ecoflow/*/*/@/command");
    /// ```
    pub fn command_wildcard(&self) -> String {
        format!("{}/*/*/@/command", self.prefix)
    }

    /// Key for bridge status.
    pub fn status(&self) -> String {
        format!("{}/@/status", self.prefix)
    }

    /// Key of the bridge liveliness token.
    pub fn bridge_alive(&self) -> String {
        format!("{}/@/alive", self.prefix)
    }

    /// Key of a device liveliness token.
    pub fn device_alive(&self, device: &str) -> String {
        format!("{}/@/devices/{}/alive", self.prefix, device)
    }
}

/// Parsed components of an attribute key expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAttributeKey<'a> {
    pub device: &'a str,
    pub endpoint: &'a str,
    pub namespace: &'a str,
    pub attribute: &'a str,
}

/// Parse an attribute key published under `prefix`.
///
/// Returns `None` if the key is outside the prefix, has the wrong number of
/// segments, or addresses bridge metadata (`@`).
pub fn parse_attribute_key<'a>(prefix: &str, key: &'a str) -> Option<ParsedAttributeKey<'a>> {
    let rest = strip_prefix(prefix, key)?;
    let parts: Vec<&str> = rest.split('/').collect();

    if parts.len() != 4 || parts.iter().any(|p| p.is_empty() || *p == "@") {
        return None;
    }

    Some(ParsedAttributeKey {
        device: parts[0],
        endpoint: parts[1],
        namespace: parts[2],
        attribute: parts[3],
    })
}

/// Parsed components of an endpoint command key expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommandKey<'a> {
    pub device: &'a str,
    pub endpoint: &'a str,
}

/// Parse `<prefix>/<device>/<endpoint>/@/command`.
pub fn parse_command_key<'a>(prefix: &str, key: &'a str) -> Option<ParsedCommandKey<'a>> {
    let rest = strip_prefix(prefix, key)?;
    let parts: Vec<&str> = rest.split('/').collect();

    match parts.as_slice() {
        [device, endpoint, "@", "command"] if !device.is_empty() && !endpoint.is_empty() => {
            Some(ParsedCommandKey {
                device: *device,
                endpoint: *endpoint,
            })
        }
        _ => None,
    }
}

fn strip_prefix<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(prefix.trim_end_matches('/'))?
        .strip_prefix('/')
}
