use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nexus_core::core::{CatalogItemRequestPipeWriter, data_pipe, try_find};
use nexus_core::errors::NexusError;
use nexus_core::extensibility::DataSourceController;
use nexus_core::options::PathsOptions;
use nexus_core::services::{
    CacheService, DataSourceRegistration, DatabaseService, ProcessingService,
};
use nexus_extensibility::data_model::{CatalogRegistration, ResourceCatalog, SamplePeriod};
use nexus_extensibility::extensibility::{
    CatalogTimeRange, DataSource, DataSourceContext, DataSourceError, DataSourceResult, Logger,
    ReadRequest,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::test_source::build_stack;

fn instant(value: &str) -> DateTime<Utc> {
    value.parse().unwrap()
}

fn period(value: &str) -> SamplePeriod {
    SamplePeriod::from_unit_string(value).unwrap()
}

fn decode(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|chunk| f64::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

#[tokio::test]
async fn orchestrated_original_read_streams_in_time_order() {
    // A 64 byte budget forces eight-row chunks, so the minute is read in
    // eight chunks which must still arrive in time order.
    let stack = build_stack(64, 2).await;

    let request = try_find(&stack.root, "/A/B/C/T1/1_s", None).await.unwrap();
    let (writer, mut reader) = data_pipe(1024);

    let units = vec![CatalogItemRequestPipeWriter {
        request,
        data_writer: writer,
    }];

    let progress_values = Mutex::new(Vec::<f64>::new());
    let report_progress = |value: f64| {
        progress_values.lock().unwrap().push(value);
    };

    stack
        .data_service
        .read(
            instant("2020-01-01T00:00:00Z"),
            instant("2020-01-01T00:01:00Z"),
            period("1_s"),
            units,
            &report_progress,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let values = decode(&reader.read_to_end().await);
    let expected: Vec<f64> = (0..60).map(|index| index as f64).collect();

    assert_eq!(values, expected);

    // Aggregated progress is monotone, positive and ends at one.
    let progress_values = progress_values.into_inner().unwrap();
    assert!(!progress_values.is_empty());
    assert_eq!(*progress_values.last().unwrap(), 1.0);
    assert!(
        progress_values
            .windows(2)
            .all(|pair| pair[0] <= pair[1] && pair[1] <= 1.0)
    );
}

#[tokio::test]
async fn aggregation_reads_compute_and_then_hit_the_cache() {
    let stack = build_stack(1024, 2).await;
    let path = "/A/B/C/T1/1_min_mean#base=1_s";
    let begin = instant("2020-01-01T00:00:00Z");
    let end = instant("2020-01-01T00:02:00Z");

    for round in 0..2 {
        let request = try_find(&stack.root, path, None).await.unwrap();
        let (writer, mut reader) = data_pipe(1024);

        let units = vec![CatalogItemRequestPipeWriter {
            request,
            data_writer: writer,
        }];

        stack
            .data_service
            .read(
                begin,
                end,
                period("1_min"),
                units,
                &|_| {},
                CancellationToken::new(),
            )
            .await
            .unwrap();

        // The mean of 0..=59 is 29.5 for every full minute, both freshly
        // computed (round 0) and served from the cache (round 1).
        let values = decode(&reader.read_to_end().await);
        assert_eq!(values, vec![29.5, 29.5], "round {round}");
    }

    let bucket_path = stack
        .directory
        .path()
        .join("cache/A_B_C/T1/60000000000/2020/01/01/2020-01-01T00-00-00.bin");

    assert!(bucket_path.is_file());
}

#[tokio::test]
async fn resampling_reads_stretch_hold_base_samples() {
    let stack = build_stack(1024, 2).await;

    let request = try_find(&stack.root, "/A/B/C/T1/500_ms#base=1_s", None)
        .await
        .unwrap();
    let (writer, mut reader) = data_pipe(1024);

    let units = vec![CatalogItemRequestPipeWriter {
        request,
        data_writer: writer,
    }];

    stack
        .data_service
        .read(
            instant("2020-01-01T00:00:00Z"),
            instant("2020-01-01T00:00:02Z"),
            period("500_ms"),
            units,
            &|_| {},
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let values = decode(&reader.read_to_end().await);
    assert_eq!(values, vec![0.0, 0.0, 1.0, 1.0]);
}

#[tokio::test]
async fn unaligned_reads_fail_validation() {
    let stack = build_stack(1024, 2).await;

    let request = try_find(&stack.root, "/A/B/C/T1/1_s", None).await.unwrap();
    let (writer, _reader) = data_pipe(16);

    let units = vec![CatalogItemRequestPipeWriter {
        request,
        data_writer: writer,
    }];

    let result = stack
        .data_service
        .read(
            instant("2020-01-01T00:00:00.500Z"),
            instant("2020-01-01T00:01:00Z"),
            period("1_s"),
            units,
            &|_| {},
            CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(NexusError::Validation(_))));
}

/// A source whose reads always fail; its samples must surface as NaN
/// without failing the read as a whole.
struct FailingDataSource;

#[async_trait]
impl DataSource for FailingDataSource {
    async fn set_context(
        &mut self,
        _context: DataSourceContext,
        _logger: Box<dyn Logger>,
    ) -> DataSourceResult<()> {
        Ok(())
    }

    async fn get_catalog_registrations(
        &self,
        _path: &str,
    ) -> DataSourceResult<Vec<CatalogRegistration>> {
        Ok(Vec::new())
    }

    async fn enrich_catalog(&self, catalog: ResourceCatalog) -> DataSourceResult<ResourceCatalog> {
        Ok(catalog)
    }

    async fn get_time_range(
        &self,
        _catalog_id: &str,
    ) -> DataSourceResult<Option<CatalogTimeRange>> {
        Ok(None)
    }

    async fn get_availability(
        &self,
        _catalog_id: &str,
        _begin: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> DataSourceResult<f64> {
        Ok(f64::NAN)
    }

    async fn read(
        &self,
        _begin: DateTime<Utc>,
        _end: DateTime<Utc>,
        _requests: &mut [ReadRequest],
        _report_progress: &(dyn Fn(f64) + Send + Sync),
        _cancellation_token: CancellationToken,
    ) -> DataSourceResult<()> {
        Err(DataSourceError::Unavailable("disk on fire".to_string()))
    }
}

#[tokio::test]
async fn failing_source_reads_become_nan_instead_of_errors() {
    let stack = build_stack(1024, 2).await;
    let request = try_find(&stack.root, "/A/B/C/T1/1_s", None).await.unwrap();

    let directory = TempDir::new().unwrap();
    let root_path = directory.path();

    let database = Arc::new(DatabaseService::new(PathsOptions {
        cache: root_path.join("cache"),
        catalogs: root_path.join("catalogs"),
        artifacts: root_path.join("artifacts"),
        packages: root_path.join("packages"),
        config: root_path.join("config"),
    }));

    let controller = DataSourceController::new(
        vec![Box::new(FailingDataSource)],
        vec![DataSourceRegistration {
            r#type: "failing".to_string(),
            resource_locator: None,
            configuration: None,
            info_url: None,
        }],
        Arc::new(ProcessingService::new(0.99)),
        Arc::new(CacheService::new(database)),
        None,
    );

    let (writer, mut reader) = data_pipe(16);

    let mut units = vec![CatalogItemRequestPipeWriter {
        request,
        data_writer: writer,
    }];

    controller
        .read(
            instant("2020-01-01T00:00:00Z"),
            instant("2020-01-01T00:00:10Z"),
            &mut units,
            &|_| {},
            CancellationToken::new(),
        )
        .await
        .unwrap();

    drop(units);

    let values = decode(&reader.read_to_end().await);

    assert_eq!(values.len(), 10);
    assert!(values.iter().all(|value| value.is_nan()));
}
