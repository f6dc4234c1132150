use nutype::nutype;
use regex::Regex;
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

use crate::data_model::resource::{MergeResourceError, Resource};

/// A regular expression to validate a resource catalog identifier.
pub static VALID_ID_EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\/[a-zA-Z_][a-zA-Z_0-9]*)+$").unwrap());

#[nutype(
    derive(AsRef, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd),
    validate(regex = VALID_ID_EXPRESSION)
)]
pub struct ResourceCatalogId(String);

#[nutype(
    derive(AsRef, Clone, Debug, PartialEq),
    validate(predicate = |x| Resources::validate_resources(x)),
)]
pub struct Resources(Vec<Resource>);

impl Resources {
    fn validate_resources(resources: &Vec<Resource>) -> bool {
        let unique_ids = resources.iter().map(|x| &x.id).collect::<HashSet<_>>();

        unique_ids.len() == resources.len()
    }
}

/// A catalog is a hierarchical namespace node which contains resources.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceCatalog {
    /// The catalog identifier.
    pub id: ResourceCatalogId,

    /// The properties.
    pub properties: Option<HashMap<String, Value>>,

    /// The list of resources.
    pub resources: Option<Resources>,
}

impl ResourceCatalog {
    /// Creates an empty catalog with the given identifier.
    pub fn new(id: ResourceCatalogId) -> Self {
        ResourceCatalog {
            id,
            properties: None,
            resources: None,
        }
    }

    /// Looks up a resource by its identifier.
    pub fn find_resource(&self, resource_id: &str) -> Option<&Resource> {
        self.resources
            .as_ref()?
            .as_ref()
            .iter()
            .find(|resource| resource.id.as_ref() == resource_id)
    }

    /// Merges another catalog of the same identifier into this one. Incoming
    /// resources are merged by identifier; existing representations and
    /// properties win over incoming ones.
    pub fn merge(self, other: ResourceCatalog) -> Result<ResourceCatalog, MergeCatalogError> {
        if self.id != other.id {
            return Err(MergeCatalogError::IdMismatch {
                left: self.id.as_ref().to_string(),
                right: other.id.as_ref().to_string(),
            });
        }

        let mut resources = self
            .resources
            .map(|value| value.into_inner())
            .unwrap_or_default();

        if let Some(other_resources) = other.resources {
            for other_resource in other_resources.into_inner() {
                match resources
                    .iter()
                    .position(|resource| resource.id == other_resource.id)
                {
                    Some(index) => {
                        let merged = resources.remove(index).merge(other_resource)?;
                        resources.insert(index, merged);
                    }
                    None => resources.push(other_resource),
                }
            }
        }

        let mut properties = self.properties.unwrap_or_default();

        if let Some(other_properties) = other.properties {
            for (key, value) in other_properties {
                properties.entry(key).or_insert(value);
            }
        }

        let resources = if resources.is_empty() {
            None
        } else {
            Some(
                Resources::try_new(resources).map_err(|_| MergeCatalogError::DuplicateResources)?,
            )
        };

        Ok(ResourceCatalog {
            id: self.id,
            properties: if properties.is_empty() {
                None
            } else {
                Some(properties)
            },
            resources,
        })
    }
}

/// An error which occurs when two catalogs cannot be merged.
#[derive(Debug, thiserror::Error)]
pub enum MergeCatalogError {
    /// The catalog identifiers differ.
    #[error("cannot merge catalog {right} into catalog {left}")]
    IdMismatch {
        /// The identifier of the catalog being merged into.
        left: String,
        /// The identifier of the incoming catalog.
        right: String,
    },

    /// The merge produced duplicate resource identifiers.
    #[error("the merge produced duplicate resource identifiers")]
    DuplicateResources,

    /// Two resources with the same identifier could not be merged.
    #[error(transparent)]
    Resource(#[from] MergeResourceError),
}
