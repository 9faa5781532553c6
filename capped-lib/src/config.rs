use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::{CappedClient, ClientBuilder, DEFAULT_USER_AGENT, Result};

/// Client configuration as it appears in a configuration file
///
/// ```toml
/// max_concurrency = 15
/// timeout = "20s"
/// admission_timeout = "1m"
///
/// [headers]
/// Accept = "text/html"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapConfig {
    /// Maximum number of simultaneously open connections, 0 or unset for no limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// Total timeout per request
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Maximum time to wait for a free connection slot
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub admission_timeout: Option<Duration>,

    /// User agent, defaults to [`DEFAULT_USER_AGENT`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Accept invalid TLS certificates
    #[serde(default)]
    pub insecure: bool,

    /// Headers to send with every request
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_headers")]
    #[serde(serialize_with = "serialize_headers")]
    pub headers: HeaderMap,
}

impl CapConfig {
    /// The effective connection limit; `None` if unbounded
    #[must_use]
    pub fn effective_limit(&self) -> Option<usize> {
        self.max_concurrency.filter(|&limit| limit > 0)
    }

    /// A [`ClientBuilder`] carrying this configuration
    #[must_use]
    pub fn to_builder(&self) -> ClientBuilder {
        ClientBuilder::builder()
            .max_concurrency(self.effective_limit())
            .timeout(self.timeout)
            .admission_timeout(self.admission_timeout)
            .user_agent(
                self.user_agent
                    .clone()
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            )
            .custom_headers(self.headers.clone())
            .allow_insecure(self.insecure)
            .build()
    }

    /// Build a client from this configuration
    ///
    /// # Errors
    ///
    /// See [`ClientBuilder::client`].
    pub fn client(&self) -> Result<CappedClient> {
        self.to_builder().client()
    }
}

/// Custom deserializer for headers from TOML config format
fn deserialize_headers<'de, D>(deserializer: D) -> std::result::Result<HeaderMap, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let map = HashMap::<String, String>::deserialize(deserializer)?;
    let mut header_map = HeaderMap::new();

    for (name, value) in map {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| serde::de::Error::custom(format!("Invalid header name '{name}': {e}")))?;
        let header_value = HeaderValue::from_str(&value).map_err(|e| {
            serde::de::Error::custom(format!("Invalid header value '{value}': {e}"))
        })?;
        header_map.insert(header_name, header_value);
    }

    Ok(header_map)
}

/// Custom serializer for headers to TOML config format
fn serialize_headers<S>(headers: &HeaderMap, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let map: HashMap<String, String> = headers
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or("").to_string()))
        .collect();
    map.serialize(serializer)
}
