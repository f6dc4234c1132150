use std::collections::HashMap;

use thiserror::Error;

use super::{
    Representation, Resource, ResourceCatalog, data_model_utilities::DataModelUtilities,
    resource_catalog::VALID_ID_EXPRESSION,
};

/// Specifies the kind of a representation.
#[repr(i32)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RepresentationKind {
    /// The data is returned as it is stored in the source.
    Original = 0,

    /// The data is resampled to a smaller sample period.
    Resampled = 10,

    /// The arithmetic mean of each block of base samples.
    Mean = 20,

    /// The circular mean of each block of base samples, interpreted as degrees.
    MeanPolarDeg = 30,

    /// The minimum of each block of base samples.
    Min = 40,

    /// The maximum of each block of base samples.
    Max = 50,

    /// The bit-wise AND of each block of base samples.
    MinBitwise = 80,

    /// The bit-wise OR of each block of base samples.
    MaxBitwise = 90,

    /// The sum of each block of base samples.
    Sum = 100,
}

impl RepresentationKind {
    /// The token used in resource paths, `None` for `Original` and
    /// `Resampled` which have no path token.
    pub fn token(&self) -> Option<&'static str> {
        match self {
            RepresentationKind::Original => None,
            RepresentationKind::Resampled => None,
            RepresentationKind::Mean => Some("mean"),
            RepresentationKind::MeanPolarDeg => Some("mean_polar_deg"),
            RepresentationKind::Min => Some("min"),
            RepresentationKind::Max => Some("max"),
            RepresentationKind::MinBitwise => Some("min_bitwise"),
            RepresentationKind::MaxBitwise => Some("max_bitwise"),
            RepresentationKind::Sum => Some("sum"),
        }
    }

    /// Resolves a resource path token into an aggregation kind.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "mean" => Some(RepresentationKind::Mean),
            "mean_polar_deg" => Some(RepresentationKind::MeanPolarDeg),
            "min" => Some(RepresentationKind::Min),
            "max" => Some(RepresentationKind::Max),
            "min_bitwise" => Some(RepresentationKind::MinBitwise),
            "max_bitwise" => Some(RepresentationKind::MaxBitwise),
            "sum" => Some(RepresentationKind::Sum),
            _ => None,
        }
    }

    /// Whether this kind aggregates blocks of base samples into one target
    /// sample.
    pub fn is_aggregation(&self) -> bool {
        !matches!(
            self,
            RepresentationKind::Original | RepresentationKind::Resampled
        )
    }
}

/// Specifies the Nexus data type.
#[repr(u16)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NexusDataType {
    /// Unsigned 8-bit integer.
    UINT8 = 0x108,

    /// Signed 8-bit integer.
    INT8 = 0x208,

    /// Unsigned 16-bit integer.
    UINT16 = 0x110,

    /// Signed 16-bit integer.
    INT16 = 0x210,

    /// Unsigned 32-bit integer.
    UINT32 = 0x120,

    /// Signed 32-bit integer.
    INT32 = 0x220,

    /// Unsigned 64-bit integer.
    UINT64 = 0x140,

    /// Signed 64-bit integer.
    INT64 = 0x240,

    /// 32-bit floating-point number.
    FLOAT32 = 0x320,

    /// 64-bit floating-point number.
    FLOAT64 = 0x340,
}

impl NexusDataType {
    /// The number of bytes per element.
    pub fn element_size(&self) -> usize {
        ((*self as u16 as usize) & 0xFF) >> 3
    }

    /// Whether the type is an integer type.
    pub fn is_integer(&self) -> bool {
        (*self as u16) >> 8 != 0x3
    }
}

/// A catalog item consists of a catalog, a resource and a representation.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogItem {
    /// The catalog.
    pub catalog: ResourceCatalog,

    /// The resource.
    pub resource: Resource,

    /// The representation.
    pub representation: Representation,

    /// The optional dictionary of representation parameters and its arguments.
    pub parameters: Option<HashMap<String, String>>,
}

impl CatalogItem {
    /// Construct a fully qualified path.
    pub fn to_path(&self) -> String {
        let parameters_string =
            DataModelUtilities::get_representation_parameter_string(&self.parameters)
                .unwrap_or_default();

        format!(
            "{}/{}/{}{}",
            self.catalog.id.as_ref(),
            self.resource.id.as_ref(),
            self.representation.id(),
            parameters_string
        )
    }
}

/// An error which occurs when a catalog path is not valid.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("the catalog path {0} is not valid")]
pub struct CatalogPathError(pub String);

/// An absolute or relative catalog path.
#[derive(Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub struct CatalogPath(String);

impl CatalogPath {
    /// Validates and wraps the given path.
    pub fn new(path: String) -> Result<Self, CatalogPathError> {
        if CatalogPath::is_valid_path(&path) {
            Ok(Self(path))
        } else {
            Err(CatalogPathError(path))
        }
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the path starts at the root.
    pub fn is_absolute(&self) -> bool {
        self.0.starts_with('/')
    }

    fn is_valid_path(path: &str) -> bool {
        if path == "/" {
            return true;
        }

        if path.starts_with('/') {
            VALID_ID_EXPRESSION.is_match(path)
        } else {
            VALID_ID_EXPRESSION.is_match(&format!("/{path}"))
        }
    }
}

/// A catalog registration.
#[derive(Clone, Debug)]
pub struct CatalogRegistration {
    /// The absolute or relative path of the catalog.
    pub path: CatalogPath,

    /// An optional title.
    pub title: Option<String>,

    /// A boolean which indicates if the catalog and its children should be reloaded on each request.
    pub is_transient: bool,

    /// An optional link target (i.e. another absolute catalog path) which makes this catalog a softlink.
    pub link_target: Option<String>,
}
