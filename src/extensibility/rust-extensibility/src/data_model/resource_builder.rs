use std::collections::HashMap;

use serde_json::Value;

use super::{
    Representation, Resource,
    resource::{Representations, RepresentationsError, ResourceId},
};

const DESCRIPTION: &str = "description";
const WARNING: &str = "warning";
const UNIT: &str = "unit";
const GROUPS: &str = "groups";

/// A resource builder simplifies building a resource.
pub struct ResourceBuilder {
    id: ResourceId,
    properties: Option<HashMap<String, Value>>,
    representations: Option<Vec<Representation>>,
}

impl ResourceBuilder {
    /// Initializes a new instance of the ResourceBuilder
    pub fn new(id: ResourceId) -> Self {
        ResourceBuilder {
            id,
            properties: None,
            representations: None,
        }
    }

    /// Adds a property.
    pub fn with_property(&mut self, key: String, value: Value) -> &mut Self {
        self.properties
            .get_or_insert_with(HashMap::new)
            .insert(key, value);

        self
    }

    /// Adds a unit.
    pub fn with_unit(&mut self, unit: String) -> &mut Self {
        self.with_property(UNIT.to_string(), Value::String(unit));
        self
    }

    /// Adds a description.
    pub fn with_description(&mut self, description: String) -> &mut Self {
        self.with_property(DESCRIPTION.to_string(), Value::String(description));
        self
    }

    /// Adds a warning.
    pub fn with_warning(&mut self, warning: String) -> &mut Self {
        self.with_property(WARNING.to_string(), Value::String(warning));
        self
    }

    /// Adds groups.
    pub fn with_groups(&mut self, groups: Vec<String>) -> &mut Self {
        let groups_value = Value::Array(groups.into_iter().map(Value::String).collect());
        self.with_property(GROUPS.to_string(), groups_value);
        self
    }

    /// Adds a representation.
    pub fn add_representation(&mut self, representation: Representation) -> &mut Self {
        self.representations
            .get_or_insert_with(Vec::new)
            .push(representation);

        self
    }

    /// Adds a list of representations.
    pub fn add_representations(&mut self, representations: Vec<Representation>) -> &mut Self {
        self.representations
            .get_or_insert_with(Vec::new)
            .extend(representations);

        self
    }

    /// Builds the resource.
    pub fn build(self) -> Result<Resource, RepresentationsError> {
        let representations = self
            .representations
            .map(Representations::try_new)
            .transpose()?;

        Ok(Resource {
            id: self.id,
            properties: self.properties,
            representations,
        })
    }
}
