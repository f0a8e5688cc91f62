use super::{LicenseProvider, normalize_name};
use crate::Result;
use crate::models::License;
use crate::net::CallContext;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, RwLock};

const LOG_TARGET: &str = "   license";

/// One immutable snapshot of the catalog.
#[derive(Debug, Default)]
struct Generation {
    by_id: HashMap<String, Arc<License>>,
    id_by_name: HashMap<String, String>,
}

impl Generation {
    fn build(licenses: impl IntoIterator<Item = License>) -> Self {
        let mut generation = Self::default();

        for mut license in licenses {
            // texts are large and never needed for lookups
            license.text = None;
            license.text_html = None;

            let id_key = normalize_name(&license.xid);
            if id_key.is_empty() {
                continue;
            }

            let name_key = normalize_name(&license.name);
            if !name_key.is_empty() {
                match generation.id_by_name.entry(name_key) {
                    Entry::Vacant(e) => {
                        let _ = e.insert(id_key.clone());
                    }
                    Entry::Occupied(e) => {
                        log::debug!(target: LOG_TARGET, "license name '{}' of {} is already taken by {}", license.name, license.xid, e.get());
                    }
                }
            }

            let _ = generation.by_id.insert(id_key, Arc::new(license));
        }

        generation
    }
}

/// Reloadable in-memory index over a license catalog.
///
/// Lookups fold their input with [`normalize_name`] and consult two indices:
/// normalized id to license and normalized name to id. A reload builds both
/// indices off to the side and then publishes them with a single pointer swap,
/// so readers always see one complete generation and never wait for a reload
/// in progress.
#[derive(Debug)]
pub struct LicenseCache {
    provider: Arc<dyn LicenseProvider>,
    current: RwLock<Arc<Generation>>,
    reload_lock: tokio::sync::Mutex<()>,
}

impl LicenseCache {
    /// Create an empty cache; call [`Self::reload`] to populate it.
    #[must_use]
    pub fn new(provider: Arc<dyn LicenseProvider>) -> Self {
        Self {
            provider,
            current: RwLock::new(Arc::new(Generation::default())),
            reload_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Fetch the full catalog from the provider and publish it as the new generation.
    ///
    /// Concurrent reloads run one after the other. On failure the previous
    /// generation stays in place.
    pub async fn reload(&self, ctx: &CallContext) -> Result<usize> {
        let _guard = self.reload_lock.lock().await;

        let licenses = self.provider.get_all_licenses(ctx).await?;
        let generation = Generation::build(licenses);
        let count = generation.by_id.len();

        self.publish(generation);
        log::info!(target: LOG_TARGET, "loaded {count} licenses");
        Ok(count)
    }

    /// Publish an already fetched catalog, replacing the current generation.
    pub fn populate(&self, licenses: impl IntoIterator<Item = License>) -> usize {
        let generation = Generation::build(licenses);
        let count = generation.by_id.len();
        self.publish(generation);
        count
    }

    /// Look up a license by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<License>> {
        self.snapshot().by_id.get(&normalize_name(id)).cloned()
    }

    /// Look up a license by name, falling back to its id.
    #[must_use]
    pub fn get_by_id_or_name(&self, id_or_name: &str) -> Option<Arc<License>> {
        let key = normalize_name(id_or_name);
        let generation = self.snapshot();

        generation
            .id_by_name
            .get(&key)
            .and_then(|id| generation.by_id.get(id))
            .or_else(|| generation.by_id.get(&key))
            .cloned()
    }

    /// Resolve a loosely written license reference.
    ///
    /// Tries [`Self::get_by_id_or_name`] first and then the SPDX list of common
    /// misspellings (`"Apache 2"`, `"GPLv3"`, ...) before giving up.
    #[must_use]
    pub fn resolve(&self, reference: &str) -> Option<Arc<License>> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        self.get_by_id_or_name(reference).or_else(|| {
            let (id, _) = spdx::imprecise_license_id(reference)?;
            self.get(id.name)
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().by_id.is_empty()
    }

    fn snapshot(&self) -> Arc<Generation> {
        Arc::clone(&self.current.read().expect("lock not poisoned"))
    }

    fn publish(&self, generation: Generation) {
        *self.current.write().expect("lock not poisoned") = Arc::new(generation);
    }
}
