use std::collections::HashMap;

use nutype::nutype;

use super::{NexusDataType, RepresentationKind, SamplePeriod, resource::VALID_ID_EXPRESSION};

#[nutype(
    derive(AsRef, Clone, Debug, PartialEq),
    validate(predicate = |x| RepresentationParameters::validate_parameters(x))
)]
pub struct RepresentationParameters(HashMap<String, String>);

impl RepresentationParameters {
    fn validate_parameters(parameters: &HashMap<String, String>) -> bool {
        for key in parameters.keys() {
            if !VALID_ID_EXPRESSION.is_match(key) {
                return false;
            }
        }

        true
    }
}

/// A representation is part of a resource.
#[derive(Clone, Debug, PartialEq)]
pub struct Representation {
    /// The data type.
    pub data_type: NexusDataType,

    /// The sample period.
    pub sample_period: SamplePeriod,

    /// The kind. Non-original kinds always materialize as FLOAT64.
    pub kind: RepresentationKind,

    /// The optional list of parameters.
    pub parameters: Option<RepresentationParameters>,
}

impl Representation {
    /// Creates an original representation.
    pub fn original(data_type: NexusDataType, sample_period: SamplePeriod) -> Self {
        Representation {
            data_type,
            sample_period,
            kind: RepresentationKind::Original,
            parameters: None,
        }
    }

    /// Creates a processed representation for the given kind. Processed
    /// representations always carry FLOAT64 data.
    pub fn processed(sample_period: SamplePeriod, kind: RepresentationKind) -> Self {
        Representation {
            data_type: NexusDataType::FLOAT64,
            sample_period,
            kind,
            parameters: None,
        }
    }

    /// Gets the identifier of the representation. It is constructed using the
    /// sample period and, for aggregations, the kind token.
    pub fn id(&self) -> String {
        match self.kind.token() {
            Some(token) => format!("{}_{}", self.sample_period.to_unit_string(), token),
            None => self.sample_period.to_unit_string(),
        }
    }

    /// The number of bytes per element.
    pub fn element_size(&self) -> usize {
        self.data_type.element_size()
    }
}
