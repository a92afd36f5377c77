//! Key source backed by AWS Secrets Manager with a transit-style layout.
//!
//! One secret per key id, named `{prefix}{key_id}`. The secret string is a
//! JSON object mapping numeric version labels to base64 key material:
//!
//! ```json
//! {"1": "<base64>", "2": "<base64>", "3": "<base64>"}
//! ```
//!
//! The primary key is the highest numbered version currently exported, so
//! rotation is a plain `PutSecretValue` that adds the next version.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use super::{KeyDetail, KeyError, KeySource};

/// Key source that reads exported key material from AWS Secrets Manager.
pub struct SecretsManagerKeySource {
    client: aws_sdk_secretsmanager::Client,
    prefix: String,
}

impl SecretsManagerKeySource {
    /// Create a source using `client` and a secret-name `prefix`
    /// (e.g. `"gateway/keys/"`).
    pub fn new(client: aws_sdk_secretsmanager::Client, prefix: String) -> Self {
        Self { client, prefix }
    }

    /// Fetch and parse all exported versions of `key_id`, ordered by number.
    async fn load_versions(&self, key_id: &str) -> Result<BTreeMap<u64, String>, KeyError> {
        let secret_id = format!("{}{}", self.prefix, key_id);
        let response = self
            .client
            .get_secret_value()
            .secret_id(&secret_id)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_resource_not_found_exception() {
                    KeyError::UnknownKeyId(key_id.to_owned())
                } else {
                    KeyError::Unavailable(service_err.to_string())
                }
            })?;

        let raw = response.secret_string().ok_or_else(|| {
            KeyError::InvalidMaterial("exported key secret must be stored as a string".into())
        })?;

        let exported: HashMap<String, String> = serde_json::from_str(raw).map_err(|e| {
            KeyError::InvalidMaterial(format!("exported key secret is not a JSON map: {e}"))
        })?;

        let mut versions = BTreeMap::new();
        for (label, material) in exported {
            let number: u64 = label.parse().map_err(|_| {
                KeyError::InvalidMaterial(format!("non-numeric version label: {label}"))
            })?;
            versions.insert(number, material);
        }
        Ok(versions)
    }
}

#[async_trait]
impl KeySource for SecretsManagerKeySource {
    fn name(&self) -> &'static str {
        "secret-manager"
    }

    async fn fetch_key<'a>(
        &self,
        key_id: &str,
        version: Option<&'a str>,
    ) -> Result<String, KeyError> {
        let versions = self.load_versions(key_id).await?;
        match version {
            Some(v) => {
                let number: u64 = v.parse().map_err(|_| KeyError::UnknownVersion {
                    key_id: key_id.to_owned(),
                    version: v.to_owned(),
                })?;
                versions
                    .get(&number)
                    .cloned()
                    .ok_or_else(|| KeyError::UnknownVersion {
                        key_id: key_id.to_owned(),
                        version: v.to_owned(),
                    })
            }
            // Versionless fetch falls back to the primary (highest) version.
            None => Ok(primary_of(key_id, &versions)?.secret_base64),
        }
    }

    async fn fetch_primary(&self, key_id: &str) -> Result<KeyDetail, KeyError> {
        let versions = self.load_versions(key_id).await?;
        primary_of(key_id, &versions)
    }
}

/// The highest numbered exported version is the primary by contract.
fn primary_of(key_id: &str, versions: &BTreeMap<u64, String>) -> Result<KeyDetail, KeyError> {
    let (number, material) = versions.iter().next_back().ok_or_else(|| {
        KeyError::InvalidMaterial(format!("key id {key_id} exports no versions"))
    })?;
    Ok(KeyDetail {
        version: number.to_string(),
        secret_base64: material.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_is_highest_numbered_version() {
        let mut versions = BTreeMap::new();
        versions.insert(2, "material-2".to_owned());
        versions.insert(10, "material-10".to_owned());
        versions.insert(9, "material-9".to_owned());
        let primary = primary_of("default-key", &versions).unwrap();
        assert_eq!(primary.version, "10");
        assert_eq!(primary.secret_base64, "material-10");
    }

    #[test]
    fn empty_export_is_invalid_material() {
        let err = primary_of("default-key", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, KeyError::InvalidMaterial(_)));
    }
}
