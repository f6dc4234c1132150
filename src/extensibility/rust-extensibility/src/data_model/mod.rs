mod data_model_extensions;
mod data_model_types;
mod data_model_utilities;
mod representation;
mod resource;
mod resource_builder;
mod resource_catalog;
mod resource_catalog_builder;
mod resource_path;
mod shared;

pub use data_model_extensions::DataModelExtensions;
pub use data_model_types::{
    CatalogItem, CatalogPath, CatalogPathError, CatalogRegistration, NexusDataType,
    RepresentationKind,
};
pub use data_model_utilities::DataModelUtilities;
pub use representation::{Representation, RepresentationParameters};
pub use resource::{
    MergeResourceError, Representations, RepresentationsError, Resource, ResourceId,
    ResourceIdError,
};
pub use resource_builder::ResourceBuilder;
pub use resource_catalog::{
    MergeCatalogError, ResourceCatalog, ResourceCatalogId, ResourceCatalogIdError, Resources,
    ResourcesError,
};
pub use resource_catalog_builder::ResourceCatalogBuilder;
pub use resource_path::{ParseResourcePathError, ResourcePath};
pub use shared::{ParseUnitStringError, SamplePeriod, SamplePeriodError};
