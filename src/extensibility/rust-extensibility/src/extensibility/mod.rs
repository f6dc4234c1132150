mod data_source;
mod utilities;

pub use data_source::{
    CatalogTimeRange, DataSource, DataSourceContext, DataSourceError, DataSourceResult, LogLevel,
    Logger, ReadRequest, UpgradableDataSource,
};

pub use utilities::ExtensibilityUtilities;
