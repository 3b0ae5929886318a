//! Signed client for the vendor REST API.

use std::future::Future;
use std::time::Duration;

use hmac::{Hmac, Mac};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use sha2::Sha256;

use crate::error::{ApiError, Result};
use crate::schema::BaselineSnapshot;

/// Default REST host.
pub const DEFAULT_API_HOST: &str = "https://api-a.ecoflow.com";

const DEVICE_LIST_PATH: &str = "/iot-open/sign/device/list";
const QUOTA_ALL_PATH: &str = "/iot-open/sign/device/quota/all";
const CERTIFICATION_PATH: &str = "/iot-open/sign/certification";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One device bound to the account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(rename = "sn")]
    pub serial_number: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub online: i64,
}

impl DeviceInfo {
    /// Human-readable name, falling back to the serial number.
    pub fn display_name(&self) -> &str {
        if self.device_name.is_empty() {
            &self.serial_number
        } else {
            &self.device_name
        }
    }

    pub fn is_online(&self) -> bool {
        self.online == 1
    }
}

/// Broker connection details issued for the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerCredentials {
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub username: String,
    pub password: String,
}

impl BrokerCredentials {
    /// Whether the broker expects TLS.
    pub fn uses_tls(&self) -> bool {
        self.protocol.eq_ignore_ascii_case("mqtts") || self.protocol.eq_ignore_ascii_case("ssl")
    }

    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertificationData {
    certificate_account: String,
    certificate_password: String,
    url: String,
    #[serde(deserialize_with = "port_from_string_or_number")]
    port: u16,
    #[serde(default = "default_protocol")]
    protocol: String,
}

fn default_protocol() -> String {
    "mqtts".to_string()
}

fn port_from_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl From<CertificationData> for BrokerCredentials {
    fn from(data: CertificationData) -> Self {
        Self {
            host: data.url,
            port: data.port,
            protocol: data.protocol,
            username: data.certificate_account,
            password: data.certificate_password,
        }
    }
}

/// Startup queries against the vendor cloud.
pub trait CloudApi: Send + Sync {
    /// Devices bound to the account.
    fn list_devices(&self) -> impl Future<Output = Result<Vec<DeviceInfo>>> + Send;

    /// One-shot property snapshot of `serial`.
    fn baseline_properties(&self, serial: &str) -> impl Future<Output = Result<BaselineSnapshot>> + Send;

    /// Credentials for the telemetry broker.
    fn broker_credentials(&self) -> impl Future<Output = Result<BrokerCredentials>> + Send;
}

/// Response wrapper shared by every endpoint.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: Value,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

impl ApiResponse {
    /// `data` on success, the API error otherwise.
    fn into_data(self) -> std::result::Result<Value, ApiError> {
        let code = match &self.code {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if code == "0" {
            Ok(self.data)
        } else {
            Err(ApiError::Api {
                code,
                message: self.message.unwrap_or_default(),
            })
        }
    }
}

/// Signature over the query parameters and auth fields.
///
/// Parameters are sorted by key and joined as `k=v&...`, then
/// `accessKey=..&nonce=..&timestamp=..` is appended; the result is
/// HMAC-SHA256 keyed with the secret key, hex encoded.
pub fn sign(
    params: &[(&str, &str)],
    access_key: &str,
    secret_key: &str,
    nonce: &str,
    timestamp: &str,
) -> std::result::Result<String, ApiError> {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut parts: Vec<String> = sorted.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    parts.push(format!("accessKey={}", access_key));
    parts.push(format!("nonce={}", nonce));
    parts.push(format!("timestamp={}", timestamp));
    let message = parts.join("&");

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret_key.as_bytes()).map_err(|e| ApiError::Malformed {
            what: "secret key",
            message: e.to_string(),
        })?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// [`CloudApi`] over HTTPS.
#[derive(Debug, Clone)]
pub struct EcoflowRestClient {
    http: reqwest::Client,
    host: String,
    access_key: String,
    secret_key: String,
}

impl EcoflowRestClient {
    pub fn new(
        host: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self> {
        let host = host.into();
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| ApiError::Http {
                url: host.clone(),
                source,
            })?;

        Ok(Self {
            http,
            host: host.trim_end_matches('/').to_string(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn get(&self, what: &'static str, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}{}", self.host, path);
        let nonce = rand::thread_rng().gen_range(100_000..1_000_000).to_string();
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let signature = sign(params, &self.access_key, &self.secret_key, &nonce, &timestamp)?;

        let http_error = |source| ApiError::Http {
            url: url.clone(),
            source,
        };

        let response: ApiResponse = self
            .http
            .get(&url)
            .query(params)
            .header("accessKey", &self.access_key)
            .header("nonce", &nonce)
            .header("timestamp", &timestamp)
            .header("sign", signature)
            .send()
            .await
            .map_err(http_error)?
            .error_for_status()
            .map_err(http_error)?
            .json()
            .await
            .map_err(http_error)?;

        tracing::debug!(what, url = %url, "REST request completed");
        Ok(response.into_data()?)
    }
}

fn decode_data<T: DeserializeOwned>(what: &'static str, data: Value) -> std::result::Result<T, ApiError> {
    serde_json::from_value(data).map_err(|e| ApiError::Malformed {
        what,
        message: e.to_string(),
    })
}

impl CloudApi for EcoflowRestClient {
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let data = self.get("device list", DEVICE_LIST_PATH, &[]).await?;
        Ok(decode_data("device list", data)?)
    }

    async fn baseline_properties(&self, serial: &str) -> Result<BaselineSnapshot> {
        let data = self
            .get("quota snapshot", QUOTA_ALL_PATH, &[("sn", serial)])
            .await?;
        Ok(BaselineSnapshot::parse(data)?)
    }

    async fn broker_credentials(&self) -> Result<BrokerCredentials> {
        let data = self.get("certification", CERTIFICATION_PATH, &[]).await?;
        let cert: CertificationData = decode_data("certification", data)?;
        Ok(cert.into())
    }
}
