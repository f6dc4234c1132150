//! A deterministic in-memory data source and a fully wired service stack
//! for the end-to-end tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use nexus_core::core::{CatalogContainer, NexusClaim, NexusUser, claims};
use nexus_core::options::{DataOptions, PathsOptions};
use nexus_core::services::{
    CacheService, CatalogManager, DataControllerService, DataService, DataSourcePipeline,
    DataSourceRegistration, DatabaseService, InMemoryUserRepository, MemoryTracker,
    PipelineService, ProcessingService,
};
use nexus_extensibility::data_model::{
    CatalogPath, CatalogRegistration, NexusDataType, Representation, ResourceBuilder,
    ResourceCatalog, ResourceCatalogBuilder, ResourceCatalogId, ResourceId, SamplePeriod,
};
use nexus_extensibility::extensibility::{
    CatalogTimeRange, DataSource, DataSourceContext, DataSourceError, DataSourceResult, Logger,
    ReadRequest,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// The catalog carrying the test resource.
pub const DATA_CATALOG_ID: &str = "/A/B/C";

/// A source with a small fixed hierarchy: `/A/B/C` carries the resource
/// `T1` (1 s, FLOAT64) whose value at time `t` is `t.seconds % 60`, and
/// `/SOFT` carries three soft links, one of them cyclic.
pub struct TestDataSource;

impl TestDataSource {
    /// The value of `T1` at the given instant.
    pub fn value_at(timestamp: DateTime<Utc>) -> f64 {
        (timestamp.timestamp().rem_euclid(60)) as f64
    }

    fn registration(path: &str, link_target: Option<&str>) -> CatalogRegistration {
        CatalogRegistration {
            path: CatalogPath::new(path.to_string()).expect("static test path"),
            title: None,
            is_transient: false,
            link_target: link_target.map(str::to_string),
        }
    }
}

#[async_trait]
impl DataSource for TestDataSource {
    async fn set_context(
        &mut self,
        _context: DataSourceContext,
        _logger: Box<dyn Logger>,
    ) -> DataSourceResult<()> {
        Ok(())
    }

    async fn get_catalog_registrations(
        &self,
        path: &str,
    ) -> DataSourceResult<Vec<CatalogRegistration>> {
        let registrations = match path {
            "/" => vec![
                Self::registration("/A", None),
                Self::registration("/SOFT", None),
            ],
            "/A/" => vec![Self::registration("/A/B", None)],
            "/A/B/" => vec![Self::registration("/A/B/C", None)],
            "/SOFT/" => vec![
                Self::registration("/SOFT/A", Some("/A/B/C")),
                Self::registration("/SOFT/B", Some("/SOFT/A")),
                Self::registration("/SOFT/X", Some("/SOFT/X")),
            ],
            _ => Vec::new(),
        };

        Ok(registrations)
    }

    async fn enrich_catalog(&self, catalog: ResourceCatalog) -> DataSourceResult<ResourceCatalog> {
        if catalog.id.as_ref() != DATA_CATALOG_ID {
            return Ok(catalog);
        }

        let one_second = SamplePeriod::from_unit_string("1_s")
            .map_err(|error| DataSourceError::Other(error.to_string()))?;

        let mut resource = ResourceBuilder::new(
            ResourceId::try_new("T1".to_string())
                .map_err(|error| DataSourceError::Other(error.to_string()))?,
        );

        resource
            .with_unit("s".to_string())
            .with_groups(vec![
                "test".to_string(),
                "test".to_string(),
                "other".to_string(),
            ])
            .add_representation(Representation::original(NexusDataType::FLOAT64, one_second));

        let mut builder = ResourceCatalogBuilder::new(
            ResourceCatalogId::try_new(DATA_CATALOG_ID.to_string())
                .map_err(|error| DataSourceError::Other(error.to_string()))?,
        );

        builder.add_resource(
            resource
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
        if catalog_id != DATA_CATALOG_ID {
            return Ok(None);
        }

        Ok(Some(CatalogTimeRange {
            begin: "2020-01-01T00:00:00Z".parse().expect("static timestamp"),
            end: "2021-01-01T00:00:00Z".parse().expect("static timestamp"),
        }))
    }

    async fn get_availability(
        &self,
        catalog_id: &str,
        _begin: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> DataSourceResult<f64> {
        if catalog_id == DATA_CATALOG_ID {
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

            for index in 0..request.status.len() {
                let timestamp =
                    begin + TimeDelta::nanoseconds(sample_period.as_nanos() * index as i64);
                let value = Self::value_at(timestamp);

                request.data[index * 8..(index + 1) * 8].copy_from_slice(&value.to_le_bytes());
                request.status[index] = 1;
            }

            report_progress((request_index + 1) as f64 / request_count as f64);
        }

        Ok(())
    }
}

/// A fully wired stack over a temporary directory.
pub struct TestStack {
    pub root: Arc<CatalogContainer>,
    pub data_service: DataService,
    pub controller_service: Arc<DataControllerService>,
    pub database: Arc<DatabaseService>,
    pub directory: TempDir,
}

/// Builds the stack: a database below a temp directory, the test source
/// registered as type `test`, one admin pipeline, and a memory tracker with
/// the given budget and growth factor.
pub async fn build_stack(total_memory: u64, factor: u64) -> TestStack {
    let directory = TempDir::new().expect("temp directory");
    let root_path = directory.path();

    let paths = PathsOptions {
        cache: root_path.join("cache"),
        catalogs: root_path.join("catalogs"),
        artifacts: root_path.join("artifacts"),
        packages: root_path.join("packages"),
        config: root_path.join("config"),
    };

    let database = Arc::new(DatabaseService::new(paths));
    let cache_service = Arc::new(CacheService::new(database.clone()));
    let processing_service = Arc::new(ProcessingService::new(0.99));

    let controller_service = Arc::new(
        DataControllerService::new(&DataOptions::default(), processing_service, cache_service)
            .expect("valid default options"),
    );

    controller_service.register_source("test", || Box::new(TestDataSource));

    let pipeline_service = Arc::new(PipelineService::new(database.clone()));

    let pipeline = DataSourcePipeline::new(vec![DataSourceRegistration {
        r#type: "test".to_string(),
        resource_locator: None,
        configuration: None,
        info_url: Some("https://example.org/test-source".to_string()),
    }])
    .expect("non-empty pipeline");

    pipeline_service
        .put_pipeline("admin", Uuid::new_v4(), pipeline.clone())
        .await
        .expect("persist admin pipeline");

    // A second, non-admin user with the same registrations: all of them are
    // claimed by the admin first.
    pipeline_service
        .put_pipeline("user", Uuid::new_v4(), pipeline)
        .await
        .expect("persist user pipeline");

    let users = InMemoryUserRepository::new(vec![
        NexusUser::new("user", "Regular User", Vec::new()),
        NexusUser::new(
            "admin",
            "Admin",
            vec![NexusClaim::new(claims::ROLE, claims::ADMINISTRATOR)],
        ),
    ]);

    let catalog_manager = CatalogManager::new(
        Arc::new(users),
        pipeline_service,
        controller_service.clone(),
        database.clone(),
    );

    let root = CatalogContainer::new_root(catalog_manager);
    let memory_tracker = MemoryTracker::with_factor(total_memory, factor);
    let data_service = DataService::new(controller_service.clone(), memory_tracker);

    TestStack {
        root,
        data_service,
        controller_service,
        database,
        directory,
    }
}
