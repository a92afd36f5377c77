//! Key source backed by a remote key-management HTTP endpoint.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{KeyDetail, KeyError, KeySource};

/// Response body of the key-management read endpoint.
#[derive(Debug, Deserialize)]
struct RemoteKeyDetail {
    version: String,
    secret: String,
}

/// Key source that reads from an external key-management service.
///
/// Wire contract: `GET {base}/keys/{key_id}` returns the primary key;
/// appending `?version=<v>` returns that specific version. The response body
/// is JSON `{"version": "...", "secret": "<base64>"}`.
pub struct RemoteKeySource {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteKeySource {
    /// Create a source pointing at `base_url` (scheme + host + optional path).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    async fn get_detail(
        &self,
        key_id: &str,
        version: Option<&str>,
    ) -> Result<KeyDetail, KeyError> {
        let url = format!("{}/keys/{}", self.base_url, key_id);
        let mut request = self.http.get(&url);
        // Absence of the version parameter signals "return the primary key"
        // to the remote service by contract.
        if let Some(v) = version {
            request = request.query(&[("version", v)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| KeyError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(match version {
                Some(v) => KeyError::UnknownVersion {
                    key_id: key_id.to_owned(),
                    version: v.to_owned(),
                },
                None => KeyError::UnknownKeyId(key_id.to_owned()),
            }),
            status if !status.is_success() => Err(KeyError::Unavailable(format!(
                "key-management endpoint returned {status}"
            ))),
            _ => {
                let detail: RemoteKeyDetail = response
                    .json()
                    .await
                    .map_err(|e| KeyError::InvalidMaterial(e.to_string()))?;
                Ok(KeyDetail {
                    version: detail.version,
                    secret_base64: detail.secret,
                })
            }
        }
    }
}

#[async_trait]
impl KeySource for RemoteKeySource {
    fn name(&self) -> &'static str {
        "remote-service"
    }

    async fn fetch_key<'a>(
        &self,
        key_id: &str,
        version: Option<&'a str>,
    ) -> Result<String, KeyError> {
        Ok(self.get_detail(key_id, version).await?.secret_base64)
    }

    async fn fetch_primary(&self, key_id: &str) -> Result<KeyDetail, KeyError> {
        self.get_detail(key_id, None).await
    }
}
