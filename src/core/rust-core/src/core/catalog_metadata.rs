use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Host-side metadata of a catalog, persisted next to its attachments and
/// editable without touching the data sources.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct CatalogMetadata {
    /// A contact person or address.
    pub contact: Option<String>,

    /// The groups the catalog belongs to, used by group-based authorization.
    pub group_memberships: Option<Vec<String>>,

    /// Property overrides applied on top of the enriched catalog.
    pub overrides: Option<HashMap<String, Value>>,
}

impl CatalogMetadata {
    /// The group memberships, or an empty slice.
    pub fn groups(&self) -> &[String] {
        self.group_memberships.as_deref().unwrap_or_default()
    }
}
