use std::{collections::HashMap, fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use thiserror::Error;

use super::{
    RepresentationKind, SamplePeriod,
    resource::VALID_ID_EXPRESSION as VALID_RESOURCE_ID_EXPRESSION,
    resource_catalog::VALID_ID_EXPRESSION as VALID_CATALOG_ID_EXPRESSION,
    shared::ParseUnitStringError,
};

static REPRESENTATION_EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<period>[0-9]+_(?:ns|us|ms|s|min|h|d))(?:_(?P<kind>[a-z_]+))?(?:\((?P<parameters>.*)\))?$",
    )
    .unwrap()
});

/// A parsed resource path of the form
/// `/catalog/resource/{samplePeriod}[_{kind}][(parameters)][#base={samplePeriod}]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourcePath {
    /// The catalog identifier part.
    pub catalog_id: String,

    /// The resource identifier part.
    pub resource_id: String,

    /// The requested sample period.
    pub sample_period: SamplePeriod,

    /// The requested representation kind.
    pub kind: RepresentationKind,

    /// The optional representation parameters.
    pub parameters: Option<HashMap<String, String>>,

    /// The optional base sample period from the `#base=` fragment.
    pub base_period: Option<SamplePeriod>,
}

impl FromStr for ResourcePath {
    type Err = ParseResourcePathError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (path_part, fragment) = match value.split_once('#') {
            Some((path_part, fragment)) => (path_part, Some(fragment)),
            None => (value, None),
        };

        let base_period = fragment
            .map(|fragment| {
                let period_part = fragment.strip_prefix("base=").ok_or_else(|| {
                    ParseResourcePathError::InvalidFragment(fragment.to_string())
                })?;

                SamplePeriod::from_unit_string(period_part)
                    .map_err(ParseResourcePathError::InvalidSamplePeriod)
            })
            .transpose()?;

        let (rest, representation_part) = path_part
            .rsplit_once('/')
            .ok_or_else(|| ParseResourcePathError::InvalidFormat(value.to_string()))?;

        let (catalog_id, resource_id) = rest
            .rsplit_once('/')
            .ok_or_else(|| ParseResourcePathError::InvalidFormat(value.to_string()))?;

        if !VALID_CATALOG_ID_EXPRESSION.is_match(catalog_id) {
            return Err(ParseResourcePathError::InvalidCatalogId(
                catalog_id.to_string(),
            ));
        }

        if !VALID_RESOURCE_ID_EXPRESSION.is_match(resource_id) {
            return Err(ParseResourcePathError::InvalidResourceId(
                resource_id.to_string(),
            ));
        }

        let captures = REPRESENTATION_EXPRESSION
            .captures(representation_part)
            .ok_or_else(|| {
                ParseResourcePathError::InvalidRepresentation(representation_part.to_string())
            })?;

        let sample_period = SamplePeriod::from_unit_string(&captures["period"])
            .map_err(ParseResourcePathError::InvalidSamplePeriod)?;

        let kind = match captures.name("kind") {
            Some(token) => RepresentationKind::from_token(token.as_str())
                .ok_or_else(|| ParseResourcePathError::InvalidKind(token.as_str().to_string()))?,

            // No kind token: a base fragment selects resampling, otherwise
            // the original representation is requested.
            None => {
                if base_period.is_some() {
                    RepresentationKind::Resampled
                } else {
                    RepresentationKind::Original
                }
            }
        };

        let parameters = captures
            .name("parameters")
            .map(|parameters| parse_parameters(parameters.as_str()))
            .transpose()?;

        Ok(ResourcePath {
            catalog_id: catalog_id.to_string(),
            resource_id: resource_id.to_string(),
            sample_period,
            kind,
            parameters,
            base_period,
        })
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.catalog_id,
            self.resource_id,
            self.sample_period.to_unit_string()
        )?;

        if let Some(token) = self.kind.token() {
            write!(f, "_{token}")?;
        }

        if let Some(parameters) = &self.parameters {
            let mut serialized = parameters
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>();

            serialized.sort();
            write!(f, "({})", serialized.join(","))?;
        }

        if let Some(base_period) = &self.base_period {
            write!(f, "#base={}", base_period.to_unit_string())?;
        }

        Ok(())
    }
}

fn parse_parameters(value: &str) -> Result<HashMap<String, String>, ParseResourcePathError> {
    let mut parameters = HashMap::new();

    for pair in value.split(',') {
        let (key, parameter_value) = pair
            .split_once('=')
            .ok_or_else(|| ParseResourcePathError::InvalidParameters(value.to_string()))?;

        parameters.insert(key.to_string(), parameter_value.to_string());
    }

    Ok(parameters)
}

/// An error which occurs when a resource path cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseResourcePathError {
    /// The path does not consist of catalog, resource and representation parts.
    #[error("the resource path {0} is malformed")]
    InvalidFormat(String),

    /// The catalog identifier part is not valid.
    #[error("the catalog identifier {0} is not valid")]
    InvalidCatalogId(String),

    /// The resource identifier part is not valid.
    #[error("the resource identifier {0} is not valid")]
    InvalidResourceId(String),

    /// The representation part is not valid.
    #[error("the representation {0} is not valid")]
    InvalidRepresentation(String),

    /// The sample period part is not valid.
    #[error(transparent)]
    InvalidSamplePeriod(ParseUnitStringError),

    /// The kind token is unknown.
    #[error("the representation kind {0} is not valid")]
    InvalidKind(String),

    /// The parameter list is malformed.
    #[error("the parameter list {0} is malformed")]
    InvalidParameters(String),

    /// The fragment is not a `base=` fragment.
    #[error("the fragment {0} is not valid")]
    InvalidFragment(String),
}
