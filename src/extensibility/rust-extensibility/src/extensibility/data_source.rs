use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::super::data_model::{CatalogItem, CatalogRegistration, ResourceCatalog};

/// Defines logging severity levels.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum LogLevel {
    /// Logs that contain the most detailed messages. These messages may contain sensitive application data. These messages are disabled by default and should never be enabled in a production environment.
    Trace = 0,

    /// Logs that are used for interactive investigation during development. These logs should primarily contain information useful for debugging and have no long-term value.
    Debug = 1,

    /// Logs that track the general flow of the application. These logs should have long-term value.
    Information = 2,

    /// Logs that highlight an abnormal or unexpected event in the application flow, but do not otherwise cause the application execution to stop.
    Warning = 3,

    /// Logs that highlight when the current flow of execution is stopped due to a failure. These should indicate a failure in the current activity, not an application-wide failure.
    Error = 4,

    /// Logs that describe an unrecoverable application or system crash, or a catastrophic failure that requires immediate attention.
    Critical = 5,
}

/// A logger.
pub trait Logger: Send + Sync {
    /// Logs a given message.
    fn log(&self, log_level: LogLevel, message: &str);
}

/// An error returned by a data source operation.
#[derive(Debug, Error)]
pub enum DataSourceError {
    /// The source configuration is missing or malformed.
    #[error("invalid source configuration: {0}")]
    InvalidConfiguration(String),

    /// The requested catalog or resource is unknown to this source.
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying data is temporarily or permanently unavailable.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// An I/O error occurred while accessing the underlying data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation was cancelled.
    #[error("the operation was cancelled")]
    Cancelled,

    /// Any other source specific failure.
    #[error("{0}")]
    Other(String),
}

/// A result type for data source operations.
pub type DataSourceResult<T> = Result<T, DataSourceError>;

/// The starter package for a data source.
pub struct DataSourceContext {
    /// An optional URL which points to the data.
    pub resource_locator: Option<Url>,

    /// The source configuration.
    pub source_configuration: Option<HashMap<String, Value>>,

    /// The request configuration.
    pub request_configuration: Option<HashMap<String, Value>>,
}

/// A catalog time range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CatalogTimeRange {
    /// The date/time of the first data in the catalog.
    pub begin: DateTime<Utc>,

    /// The date/time of the last data in the catalog.
    pub end: DateTime<Utc>,
}

/// A read request.
pub struct ReadRequest {
    /// The original resource name.
    pub original_resource_name: String,

    /// The CatalogItem to be read.
    pub catalog_item: CatalogItem,

    /// The data buffer.
    pub data: Vec<u8>,

    /// The status buffer. A value of 0x01 ('1') indicates that the corresponding value in the data buffer is valid, otherwise it is treated as float("NaN").
    pub status: Vec<u8>,
}

/// A data source.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Invoked by Nexus right after construction to provide the context.
    async fn set_context(
        &mut self,
        context: DataSourceContext,
        logger: Box<dyn Logger>,
    ) -> DataSourceResult<()>;

    /// Gets the catalog registrations that are located under path.
    async fn get_catalog_registrations(
        &self,
        path: &str,
    ) -> DataSourceResult<Vec<CatalogRegistration>>;

    /// Enriches the provided ResourceCatalog.
    async fn enrich_catalog(&self, catalog: ResourceCatalog) -> DataSourceResult<ResourceCatalog>;

    /// Gets the time range of the ResourceCatalog.
    async fn get_time_range(&self, catalog_id: &str) -> DataSourceResult<Option<CatalogTimeRange>>;

    /// Gets the availability of the ResourceCatalog within the given time
    /// range as a value between 0 and 1, or NaN if unknown.
    async fn get_availability(
        &self,
        catalog_id: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DataSourceResult<f64>;

    /// Performs a number of read requests. Implementations fill the data and
    /// status buffers of each request, report progress between 0 and 1 and
    /// observe the cancellation token at every suspension point.
    async fn read(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        requests: &mut [ReadRequest],
        report_progress: &(dyn Fn(f64) + Send + Sync),
        cancellation_token: CancellationToken,
    ) -> DataSourceResult<()>;
}

/// Data sources which have configuration data to be upgraded should implement this interface.
#[async_trait]
pub trait UpgradableDataSource {
    /// Upgrades the source configuration.
    async fn upgrade_source_configuration(&self, configuration: Value) -> DataSourceResult<Value>;
}
