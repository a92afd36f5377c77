//! Config-backed key source: a fixed set of versioned keys loaded at startup.

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::StaticKeyEntry;

use super::{KeyDetail, KeyError, KeySource};

/// All versions configured for one key id.
struct KeyRing {
    /// Version label of the single primary entry.
    primary_version: String,
    /// version → base64 key material.
    versions: HashMap<String, String>,
}

/// Key source backed entirely by static configuration.
///
/// All lookups are O(1) in-memory after construction; no I/O is ever
/// performed. Rotation requires a restart with updated configuration.
pub struct StaticKeySource {
    rings: HashMap<String, KeyRing>,
}

impl StaticKeySource {
    /// Build the version index from configuration entries.
    ///
    /// # Errors
    ///
    /// Fails if the entry list is empty, if any key id has zero or more than
    /// one entry marked primary, or if a version label is duplicated within
    /// one key id. These are startup-time invariant violations: the service
    /// must refuse to start rather than run in an undefined state.
    pub fn from_entries(entries: &[StaticKeyEntry]) -> Result<Self> {
        if entries.is_empty() {
            bail!("static key source requires at least one configured key entry");
        }

        let mut rings: HashMap<String, KeyRing> = HashMap::new();
        for entry in entries {
            let ring = rings.entry(entry.key_id.clone()).or_insert_with(|| KeyRing {
                primary_version: String::new(),
                versions: HashMap::new(),
            });
            if ring
                .versions
                .insert(entry.version.clone(), entry.secret.clone())
                .is_some()
            {
                bail!(
                    "duplicate version {} for key id {}",
                    entry.version,
                    entry.key_id
                );
            }
            if entry.primary {
                if !ring.primary_version.is_empty() {
                    bail!(
                        "key id {} has more than one entry marked primary",
                        entry.key_id
                    );
                }
                ring.primary_version = entry.version.clone();
            }
        }

        for (key_id, ring) in &rings {
            if ring.primary_version.is_empty() {
                bail!("key id {key_id} has no entry marked primary");
            }
        }

        Ok(Self { rings })
    }

    fn ring(&self, key_id: &str) -> Result<&KeyRing, KeyError> {
        self.rings
            .get(key_id)
            .ok_or_else(|| KeyError::UnknownKeyId(key_id.to_owned()))
    }
}

impl std::fmt::Debug for StaticKeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key ids only; the ring values hold key material.
        let mut key_ids: Vec<&str> = self.rings.keys().map(String::as_str).collect();
        key_ids.sort_unstable();
        f.debug_struct("StaticKeySource")
            .field("key_ids", &key_ids)
            .finish()
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    fn name(&self) -> &'static str {
        "static-config"
    }

    async fn fetch_key<'a>(
        &self,
        key_id: &str,
        version: Option<&'a str>,
    ) -> Result<String, KeyError> {
        let ring = self.ring(key_id)?;
        match version {
            Some(v) => ring
                .versions
                .get(v)
                .cloned()
                .ok_or_else(|| KeyError::UnknownVersion {
                    key_id: key_id.to_owned(),
                    version: v.to_owned(),
                }),
            // No version: fall back to the primary key's secret.
            None => Ok(ring.versions[&ring.primary_version].clone()),
        }
    }

    async fn fetch_primary(&self, key_id: &str) -> Result<KeyDetail, KeyError> {
        let ring = self.ring(key_id)?;
        Ok(KeyDetail {
            version: ring.primary_version.clone(),
            secret_base64: ring.versions[&ring.primary_version].clone(),
        })
    }
}
