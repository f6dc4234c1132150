use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use nexus_extensibility::data_model::{
    CatalogPath, CatalogRegistration, NexusDataType, Representation, ResourceBuilder,
    ResourceCatalog, ResourceCatalogBuilder, ResourceCatalogId, ResourceId, SamplePeriod,
};
use nexus_extensibility::extensibility::{
    CatalogTimeRange, DataSource, DataSourceContext, DataSourceError, DataSourceResult, Logger,
    ReadRequest,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// The built-in sample source: a small catalog of deterministic test
/// signals, useful for demos and end-to-end tests without external data.
pub struct SampleDataSource {
    catalog_id: String,
}

impl SampleDataSource {
    /// The default catalog identifier.
    pub const DEFAULT_CATALOG_ID: &'static str = "/SAMPLE/LOCAL";

    /// Creates the source with the default catalog.
    pub fn new() -> Self {
        SampleDataSource {
            catalog_id: Self::DEFAULT_CATALOG_ID.to_string(),
        }
    }

    fn sample_value(resource_id: &str, timestamp: DateTime<Utc>) -> f64 {
        let seconds = timestamp.timestamp() as f64;

        match resource_id {
            // A daily temperature-like cycle.
            "T1" => 20.0 + 5.0 * (seconds * std::f64::consts::TAU / 86_400.0).sin(),
            // An hourly voltage-like cycle.
            _ => (seconds * std::f64::consts::TAU / 3_600.0).sin(),
        }
    }
}

impl Default for SampleDataSource {
    fn default() -> Self {
        SampleDataSource::new()
    }
}

#[async_trait]
impl DataSource for SampleDataSource {
    async fn set_context(
        &mut self,
        context: DataSourceContext,
        _logger: Box<dyn Logger>,
    ) -> DataSourceResult<()> {
        if let Some(configuration) = &context.source_configuration {
            if let Some(Value::String(catalog_id)) = configuration.get("catalog-id") {
                self.catalog_id = catalog_id.clone();
            }
        }

        Ok(())
    }

    async fn get_catalog_registrations(
        &self,
        path: &str,
    ) -> DataSourceResult<Vec<CatalogRegistration>> {
        if path != "/" {
            return Ok(Vec::new());
        }

        let path = CatalogPath::new(self.catalog_id.clone())
            .map_err(|error| DataSourceError::InvalidConfiguration(error.to_string()))?;

        Ok(vec![CatalogRegistration {
            path,
            title: Some("Sample signals".to_string()),
            is_transient: false,
            link_target: None,
        }])
    }

    async fn enrich_catalog(&self, catalog: ResourceCatalog) -> DataSourceResult<ResourceCatalog> {
        if catalog.id.as_ref() != &self.catalog_id {
            return Ok(catalog);
        }

        let one_second = SamplePeriod::from_unit_string("1_s")
            .map_err(|error| DataSourceError::Other(error.to_string()))?;

        let mut temperature = ResourceBuilder::new(
            ResourceId::try_new("T1".to_string())
                .map_err(|error| DataSourceError::Other(error.to_string()))?,
        );

        temperature
            .with_unit("°C".to_string())
            .with_description("A daily temperature cycle".to_string())
            .with_groups(vec!["sample".to_string()])
            .add_representation(Representation::original(NexusDataType::FLOAT64, one_second));

        let mut voltage = ResourceBuilder::new(
            ResourceId::try_new("V1".to_string())
                .map_err(|error| DataSourceError::Other(error.to_string()))?,
        );

        voltage
            .with_unit("V".to_string())
            .with_description("An hourly voltage cycle".to_string())
            .with_groups(vec!["sample".to_string()])
            .add_representation(Representation::original(NexusDataType::FLOAT64, one_second));

        let mut builder = ResourceCatalogBuilder::new(
            ResourceCatalogId::try_new(self.catalog_id.clone())
                .map_err(|error| DataSourceError::Other(error.to_string()))?,
        );

        builder
            .with_property("license".to_string(), json!("CC0-1.0"))
            .add_resource(
                temperature
                    .build()
                    .map_err(|error| DataSourceError::Other(error.to_string()))?,
            )
            .add_resource(
                voltage
                    .build()
                    .map_err(|error| DataSourceError::Other(error.to_string()))?,
            );

        let own_catalog = builder
            .build()
            .map_err(|error| DataSourceError::Other(error.to_string()))?;

        catalog
            .merge(own_catalog)
            .map_err(|error| DataSourceError::Other(error.to_string()))
    }

    async fn get_time_range(&self, catalog_id: &str) -> DataSourceResult<Option<CatalogTimeRange>> {
        if catalog_id != self.catalog_id {
            return Ok(None);
        }

        Ok(Some(CatalogTimeRange {
            begin: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }))
    }

    async fn get_availability(
        &self,
        catalog_id: &str,
        _begin: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> DataSourceResult<f64> {
        if catalog_id == self.catalog_id {
            Ok(1.0)
        } else {
            Ok(f64::NAN)
        }
    }

    async fn read(
        &self,
        begin: DateTime<Utc>,
        _end: DateTime<Utc>,
        requests: &mut [ReadRequest],
        report_progress: &(dyn Fn(f64) + Send + Sync),
        cancellation_token: CancellationToken,
    ) -> DataSourceResult<()> {
        let request_count = requests.len().max(1);

        for (request_index, request) in requests.iter_mut().enumerate() {
            if cancellation_token.is_cancelled() {
                return Err(DataSourceError::Cancelled);
            }

            let sample_period = request.catalog_item.representation.sample_period;
            let resource_id = request.catalog_item.resource.id.as_ref().to_string();

            for index in 0..request.status.len() {
                let timestamp =
                    begin + TimeDelta::nanoseconds(sample_period.as_nanos() * index as i64);
                let value = Self::sample_value(&resource_id, timestamp);

                request.data[index * 8..(index + 1) * 8].copy_from_slice(&value.to_le_bytes());
                request.status[index] = 1;
            }

            report_progress((request_index + 1) as f64 / request_count as f64);
        }

        Ok(())
    }
}

/// A helper map for registering this source with the controller service.
pub fn sample_registration_configuration(catalog_id: &str) -> HashMap<String, Value> {
    HashMap::from([("catalog-id".to_string(), json!(catalog_id))])
}
