//! Outbound gateway to the external calling service.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::domain::Lead;
use crate::config::DialerConfig;

pub const CALL_TYPE: &str = "twilio";

/// Batch of scheduled calls handed to the calling service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchPayload {
    pub generated_at: String,
    pub agent_id: String,
    pub elevenlabs_phone_id: String,
    pub call_type: String,
    pub items: Vec<DispatchItem>,
}

impl DispatchPayload {
    pub fn new(
        generated_at: DateTime<Utc>,
        agent_id: &str,
        phone_id: &str,
        items: Vec<DispatchItem>,
    ) -> Self {
        Self {
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            agent_id: agent_id.to_string(),
            elevenlabs_phone_id: phone_id.to_string(),
            call_type: CALL_TYPE.to_string(),
            items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchItem {
    pub company_name: String,
    pub location: String,
    pub contact_name: String,
    pub surname: String,
    pub phone: String,
}

impl From<&Lead> for DispatchItem {
    fn from(lead: &Lead) -> Self {
        Self {
            company_name: lead.name.clone(),
            location: lead.location.clone().unwrap_or_default(),
            contact_name: lead.contact_name.clone().unwrap_or_default(),
            surname: lead.contact_surname.clone().unwrap_or_default(),
            phone: lead.contact_phone.clone().unwrap_or_default(),
        }
    }
}

/// Fields read back from a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DialerReceipt {
    #[serde(default, deserialize_with = "string_or_number")]
    pub file_id: Option<String>,
    #[serde(default)]
    pub inserted: u64,
    #[serde(default)]
    pub skipped: u64,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(raw)) => Some(raw),
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DialerError {
    #[error("request to calling service failed: {0}")]
    Transport(String),
    #[error("calling service responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("calling service response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait DialerGateway: Send + Sync {
    async fn submit(&self, payload: &DispatchPayload) -> Result<DialerReceipt, DialerError>;
}

/// JSON-over-HTTP client for the calling service. Each request is bounded by the
/// configured timeout and never retried.
#[derive(Debug, Clone)]
pub struct HttpDialerClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDialerClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DialerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DialerError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &DialerConfig) -> Result<Self, DialerError> {
        Self::new(config.endpoint.clone(), config.timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DialerGateway for HttpDialerClient {
    async fn submit(&self, payload: &DispatchPayload) -> Result<DialerReceipt, DialerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|err| DialerError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DialerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<DialerReceipt>()
            .await
            .map_err(|err| DialerError::Decode(err.to_string()))
    }
}
