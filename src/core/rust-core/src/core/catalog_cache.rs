use std::collections::HashMap;
use std::sync::RwLock;

use nexus_extensibility::data_model::ResourceCatalog;

/// A per-request catalog memo: concurrent-safe and append-only. Adding a
/// catalog that is already present keeps the stored one, so repeated
/// resolutions within one request observe one catalog state.
#[derive(Default)]
pub struct CatalogCache {
    catalogs: RwLock<HashMap<String, ResourceCatalog>>,
}

impl CatalogCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        CatalogCache::default()
    }

    /// The cached catalog with the given identifier, if any.
    pub fn get(&self, catalog_id: &str) -> Option<ResourceCatalog> {
        let catalogs = self
            .catalogs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        catalogs.get(catalog_id).cloned()
    }

    /// Adds a catalog unless one with the same identifier is present and
    /// returns the stored catalog.
    pub fn try_add(&self, catalog: ResourceCatalog) -> ResourceCatalog {
        let mut catalogs = self
            .catalogs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        catalogs
            .entry(catalog.id.as_ref().to_string())
            .or_insert(catalog)
            .clone()
    }
}
