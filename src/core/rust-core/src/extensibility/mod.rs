//! Pipeline execution: the data source controller, the built-in sample
//! source and the logger bridge handed to sources.

mod data_source_controller;
mod sample_data_source;
mod source_logger;

pub use data_source_controller::{
    DATA_SOURCE_PROPERTY, DataSourceController, MAX_AVAILABILITY_STEP_COUNT,
    PIPELINE_POSITION_PROPERTY,
};
pub use sample_data_source::{SampleDataSource, sample_registration_configuration};
pub use source_logger::SourceLogger;
