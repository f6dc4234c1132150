use std::{
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

use nutype::nutype;
use regex::Regex;
use serde_json::Value;

use crate::data_model::representation::Representation;

/// A regular expression to validate a resource identifier.
pub static VALID_ID_EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z_0-9]*$").unwrap());

#[nutype(
    derive(AsRef, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd),
    validate(regex = VALID_ID_EXPRESSION)
)]
pub struct ResourceId(String);

#[nutype(
    derive(AsRef, Clone, Debug, PartialEq),
    validate(predicate = |x| Representations::validate_representations(x)),
)]
pub struct Representations(Vec<Representation>);

impl Representations {
    fn validate_representations(representations: &Vec<Representation>) -> bool {
        let unique_ids = representations.iter().map(|x| x.id()).collect::<HashSet<_>>();

        unique_ids.len() == representations.len()
    }
}

/// A resource is a named measurement series within a catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct Resource {
    /// The resource identifier.
    pub id: ResourceId,

    /// The properties.
    pub properties: Option<HashMap<String, Value>>,

    /// The list of representations.
    pub representations: Option<Representations>,
}

impl Resource {
    /// Looks up a representation by its identifier.
    pub fn find_representation(&self, representation_id: &str) -> Option<&Representation> {
        self.representations
            .as_ref()?
            .as_ref()
            .iter()
            .find(|representation| representation.id() == representation_id)
    }

    /// Merges another resource of the same identifier into this one. Existing
    /// representations and properties win over incoming ones.
    pub fn merge(self, other: Resource) -> Result<Resource, MergeResourceError> {
        if self.id != other.id {
            return Err(MergeResourceError::IdMismatch {
                left: self.id.as_ref().to_string(),
                right: other.id.as_ref().to_string(),
            });
        }

        let mut representations = self
            .representations
            .map(|value| value.into_inner())
            .unwrap_or_default();

        let existing_ids = representations
            .iter()
            .map(|representation| representation.id())
            .collect::<HashSet<_>>();

        if let Some(other_representations) = other.representations {
            for representation in other_representations.into_inner() {
                if !existing_ids.contains(&representation.id()) {
                    representations.push(representation);
                }
            }
        }

        let mut properties = self.properties.unwrap_or_default();

        if let Some(other_properties) = other.properties {
            for (key, value) in other_properties {
                properties.entry(key).or_insert(value);
            }
        }

        let representations = if representations.is_empty() {
            None
        } else {
            Some(
                Representations::try_new(representations)
                    .map_err(|_| MergeResourceError::DuplicateRepresentations)?,
            )
        };

        Ok(Resource {
            id: self.id,
            properties: if properties.is_empty() {
                None
            } else {
                Some(properties)
            },
            representations,
        })
    }
}

/// An error which occurs when two resources cannot be merged.
#[derive(Debug, thiserror::Error)]
pub enum MergeResourceError {
    /// The resource identifiers differ.
    #[error("cannot merge resource {right} into resource {left}")]
    IdMismatch {
        /// The identifier of the resource being merged into.
        left: String,
        /// The identifier of the incoming resource.
        right: String,
    },

    /// The merge produced duplicate representation identifiers.
    #[error("the merge produced duplicate representation identifiers")]
    DuplicateRepresentations,
}
