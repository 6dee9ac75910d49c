//! HTTP client for a device registry exposing attribute and validation endpoints.

use async_trait::async_trait;
use predicate_core::{AttributeLookup, DeviceAttributes, DeviceId, ValidationReport};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{AttributeResolver, ExternalValidator, SyncError};

/// Registry client.
///
/// - `GET {base}/devices/{id}/attributes` → [`DeviceAttributes`], 404 → not found
/// - `GET {base}/devices/{id}/validation` → [`ValidationReport`]
pub struct HttpRegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRegistryClient {
    /// `base_url` should be like `http://localhost:4000` (trailing slash is dropped).
    pub fn new(base_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, id: &DeviceId, endpoint: &str) -> String {
        format!("{}/devices/{}/{endpoint}", self.base_url, id.as_str())
    }

    /// `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, SyncError> {
        debug!(url, "registry request");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(Some(resp.json().await?))
    }
}

#[async_trait]
impl AttributeResolver for HttpRegistryClient {
    async fn resolve(&self, id: &DeviceId) -> Result<AttributeLookup, SyncError> {
        let url = self.url(id, "attributes");
        let found: Option<DeviceAttributes> = self.get_json(&url).await?;
        info!(device = %id, found = found.is_some(), "resolved attributes");
        Ok(match found {
            Some(attributes) => AttributeLookup::Found { attributes },
            None => AttributeLookup::NotFound,
        })
    }
}

#[async_trait]
impl ExternalValidator for HttpRegistryClient {
    async fn validate(&self, id: &DeviceId) -> Result<ValidationReport, SyncError> {
        let url = self.url(id, "validation");
        self.get_json(&url)
            .await?
            .ok_or_else(|| SyncError::NoValidation(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = HttpRegistryClient::new("http://localhost:4000/".into());
        assert_eq!(client.base_url, "http://localhost:4000");
    }

    #[test]
    fn endpoint_urls_use_normalized_id() {
        let client = HttpRegistryClient::new("http://registry".into());
        let id = DeviceId::parse("p123456/s001").unwrap();
        assert_eq!(
            client.url(&id, "attributes"),
            "http://registry/devices/P123456S001/attributes"
        );
    }

    #[test]
    fn attributes_wire_shape() {
        let json = r#"{
            "product_code": "QAS",
            "decision_date": "2021-03-04",
            "device_class": "2",
            "adverse_event_count": 12,
            "applicant": "Acme Medical Inc."
        }"#;
        let attrs: DeviceAttributes = serde_json::from_str(json).unwrap();
        assert_eq!(attrs.adverse_event_count, Some(12));
        assert!(attrs.recalls.is_none());
        assert!(!attrs.pma_only);
    }
}
