use super::SamplePeriod;

/// Contains extension methods to make life easier working with the data model types.
pub struct DataModelExtensions;

impl DataModelExtensions {
    /// Converts the period into a human readable number string with unit.
    pub fn to_unit_string(sample_period: &SamplePeriod) -> String {
        sample_period.to_unit_string()
    }
}
