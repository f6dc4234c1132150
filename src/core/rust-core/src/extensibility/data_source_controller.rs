use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use nexus_extensibility::data_model::{
    CatalogItem, CatalogPath, CatalogRegistration, RepresentationKind, ResourceCatalog,
    ResourceCatalogId, Resources,
};
use nexus_extensibility::extensibility::{
    CatalogTimeRange, DataSource, DataSourceContext, ExtensibilityUtilities, ReadRequest,
};
use regex::Regex;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::{CatalogItemRequestPipeWriter, Interval};
use crate::errors::{NexusError, Result};
use crate::extensibility::source_logger::SourceLogger;
use crate::services::{CacheService, DataSourceRegistration, ProcessingService};
use crate::utilities::{BufferUtilities, TimeUtilities};

/// The resource property carrying the pipeline position of the source the
/// resource originates from.
pub const PIPELINE_POSITION_PROPERTY: &str = "nexus.pipeline-position";

/// The resource property describing the producing data source.
pub const DATA_SOURCE_PROPERTY: &str = "nexus.data-source";

const GROUPS_PROPERTY: &str = "groups";

/// The availability endpoint refuses requests beyond this bucket count.
pub const MAX_AVAILABILITY_STEP_COUNT: usize = 1000;

/// Executes one data source pipeline: an ordered stack of sources whose
/// catalogs are enriched in sequence and whose data is read either as
/// original values or through the aggregation cache.
pub struct DataSourceController {
    sources: Vec<Box<dyn DataSource>>,
    registrations: Vec<DataSourceRegistration>,
    processing_service: Arc<ProcessingService>,
    cache_service: Arc<CacheService>,
    cache_pattern: Option<Regex>,
}

impl DataSourceController {
    /// Creates a controller over parallel source and registration lists.
    pub fn new(
        sources: Vec<Box<dyn DataSource>>,
        registrations: Vec<DataSourceRegistration>,
        processing_service: Arc<ProcessingService>,
        cache_service: Arc<CacheService>,
        cache_pattern: Option<Regex>,
    ) -> Self {
        DataSourceController {
            sources,
            registrations,
            processing_service,
            cache_service,
            cache_pattern,
        }
    }

    /// Provides each source with its context, exactly once.
    pub(crate) async fn initialize(
        &mut self,
        request_configuration: Option<HashMap<String, Value>>,
    ) -> Result<()> {
        for (source, registration) in self.sources.iter_mut().zip(&self.registrations) {
            let context = DataSourceContext {
                resource_locator: registration.resource_locator.clone(),
                source_configuration: registration.configuration.clone(),
                request_configuration: request_configuration.clone(),
            };

            source
                .set_context(
                    context,
                    Box::new(SourceLogger::new(registration.r#type.as_str())),
                )
                .await?;
        }

        Ok(())
    }

    /// The union of the catalog registrations below the parent path across
    /// all sources; the first source wins per path. Relative paths are
    /// reparented below the parent path, absolute paths must extend it.
    pub async fn get_catalog_registrations(
        &self,
        parent_path: &str,
    ) -> Result<Vec<CatalogRegistration>> {
        if !parent_path.ends_with('/') {
            return Err(NexusError::validation(format!(
                "the parent path {parent_path} must end with a slash"
            )));
        }

        let mut registrations: Vec<CatalogRegistration> = Vec::new();

        for source in &self.sources {
            for registration in source.get_catalog_registrations(parent_path).await? {
                let path = Self::absolutize_path(parent_path, &registration)?;

                if registrations
                    .iter()
                    .any(|existing| existing.path.as_str() == path.as_str())
                {
                    continue;
                }

                registrations.push(CatalogRegistration {
                    path,
                    title: registration.title,
                    is_transient: registration.is_transient,
                    link_target: registration.link_target,
                });
            }
        }

        Ok(registrations)
    }

    fn absolutize_path(
        parent_path: &str,
        registration: &CatalogRegistration,
    ) -> Result<CatalogPath> {
        if registration.path.is_absolute() {
            if !registration.path.as_str().starts_with(parent_path) {
                return Err(NexusError::validation(format!(
                    "the absolute catalog path {} does not extend the parent path {parent_path}",
                    registration.path.as_str()
                )));
            }

            Ok(registration.path.clone())
        } else {
            CatalogPath::new(format!("{parent_path}{}", registration.path.as_str()))
                .map_err(|error| NexusError::validation(error.to_string()))
        }
    }

    /// Walks the pipeline, letting every source enrich the catalog, then
    /// finalizes it: verifies the identifier, deduplicates groups, stamps
    /// the data source properties and sorts the resources.
    pub async fn get_catalog(&self, catalog_id: &str) -> Result<ResourceCatalog> {
        debug!(catalog_id, "load catalog");

        let id = ResourceCatalogId::try_new(catalog_id.to_string())
            .map_err(|error| NexusError::validation(error.to_string()))?;

        let mut catalog = ResourceCatalog::new(id);
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (position, source) in self.sources.iter().enumerate() {
            let enriched = source.enrich_catalog(catalog.clone()).await?;

            if enriched.id.as_ref() != catalog_id {
                return Err(NexusError::internal(format!(
                    "the source at position {position} returned catalog {} instead of {catalog_id}",
                    enriched.id.as_ref()
                )));
            }

            if let Some(resources) = &enriched.resources {
                for resource in resources.as_ref() {
                    positions
                        .entry(resource.id.as_ref().to_string())
                        .or_insert(position);
                }
            }

            catalog = enriched;
        }

        self.finalize_catalog(catalog, &positions)
    }

    fn finalize_catalog(
        &self,
        catalog: ResourceCatalog,
        positions: &HashMap<String, usize>,
    ) -> Result<ResourceCatalog> {
        let Some(resources) = catalog.resources else {
            return Ok(catalog);
        };

        let mut resources = resources.into_inner();

        for resource in &mut resources {
            let position = positions.get(resource.id.as_ref()).copied().unwrap_or(0);
            let mut properties = resource.properties.take().unwrap_or_default();

            if let Some(groups_value) = properties.remove(GROUPS_PROPERTY) {
                properties.insert(GROUPS_PROPERTY.to_string(), dedupe_groups(groups_value));
            }

            properties.insert(PIPELINE_POSITION_PROPERTY.to_string(), json!(position));

            let registration = self.registrations.get(position);

            properties.insert(
                DATA_SOURCE_PROPERTY.to_string(),
                json!({
                    "nexus-version": env!("CARGO_PKG_VERSION"),
                    "source-type": registration.map(|registration| registration.r#type.clone()),
                    "info-url": registration.and_then(|registration| registration.info_url.clone()),
                    "pipeline-position": position,
                }),
            );

            resource.properties = Some(properties);
        }

        resources.sort_by(|left, right| left.id.cmp(&right.id));

        Ok(ResourceCatalog {
            id: catalog.id,
            properties: catalog.properties,
            resources: Some(
                Resources::try_new(resources)
                    .map_err(|error| NexusError::internal(error.to_string()))?,
            ),
        })
    }

    /// The minimum begin and maximum end across all sources, or `None` when
    /// no source reports a time range.
    pub async fn get_time_range(&self, catalog_id: &str) -> Result<Option<CatalogTimeRange>> {
        let mut result: Option<CatalogTimeRange> = None;

        for source in &self.sources {
            if let Some(range) = source.get_time_range(catalog_id).await? {
                result = Some(match result {
                    None => range,
                    Some(current) => CatalogTimeRange {
                        begin: current.begin.min(range.begin),
                        end: current.end.max(range.end),
                    },
                });
            }
        }

        Ok(result)
    }

    /// The per-bucket availability, each bucket being the average of the
    /// non-NaN source values, queried concurrently. Requests beyond 1000
    /// buckets fail validation.
    pub async fn get_availability(
        &self,
        catalog_id: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        step: TimeDelta,
    ) -> Result<Vec<f64>> {
        let step_ticks = step.num_nanoseconds().unwrap_or(0);

        if begin >= end || step_ticks <= 0 {
            return Err(NexusError::validation(
                "the availability range must be non-empty and the step positive",
            ));
        }

        let total_ticks = TimeUtilities::ticks_of(end) - TimeUtilities::ticks_of(begin);
        let step_count = ((total_ticks + step_ticks - 1) / step_ticks) as usize;

        if step_count > MAX_AVAILABILITY_STEP_COUNT {
            return Err(NexusError::validation(format!(
                "the request spans {step_count} steps, the maximum is {MAX_AVAILABILITY_STEP_COUNT}"
            )));
        }

        let bucket_futures = (0..step_count).map(|index| {
            let bucket_begin = begin + TimeDelta::nanoseconds(step_ticks * index as i64);
            let bucket_end = (bucket_begin + step).min(end);

            async move {
                let source_values = join_all(self.sources.iter().map(|source| {
                    source.get_availability(catalog_id, bucket_begin, bucket_end)
                }))
                .await;

                let mut sum = 0.0;
                let mut count = 0usize;

                for value in source_values {
                    match value {
                        Ok(value) if !value.is_nan() => {
                            sum += value;
                            count += 1;
                        }
                        Ok(_) => {}
                        Err(error) => {
                            warn!(catalog_id, %error, "a source failed to report availability");
                        }
                    }
                }

                if count == 0 { f64::NAN } else { sum / count as f64 }
            }
        });

        Ok(join_all(bucket_futures).await)
    }

    /// Reads one time chunk for all requests. Original requests are batched
    /// per pipeline position; processed requests run individually through
    /// the cache and the processing kernels. A failing source read logs and
    /// leaves NaN in the affected slice instead of failing the chunk.
    pub async fn read(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        units: &mut [CatalogItemRequestPipeWriter],
        report_progress: &(dyn Fn(f64) + Send + Sync),
        cancellation_token: CancellationToken,
    ) -> Result<()> {
        if begin >= end {
            return Err(NexusError::validation(
                "the read range must be non-empty",
            ));
        }

        let total_units = units.len().max(1);
        let mut completed = 0usize;

        let mut units_by_position: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

        for (index, unit) in units.iter().enumerate() {
            if unit.request.base_item.is_none() {
                let position = Self::pipeline_position(&unit.request.item);
                units_by_position.entry(position).or_default().push(index);
            }
        }

        for (position, unit_indices) in units_by_position {
            if cancellation_token.is_cancelled() {
                return Err(NexusError::Cancelled);
            }

            let source = self.sources.get(position).ok_or_else(|| {
                NexusError::internal(format!("no source at pipeline position {position}"))
            })?;

            let mut read_requests = Vec::with_capacity(unit_indices.len());

            for &index in &unit_indices {
                let item = units[index].request.item.clone();
                let (data, status) =
                    ExtensibilityUtilities::create_buffers(&item.representation, begin, end);

                read_requests.push(ReadRequest {
                    original_resource_name: item.resource.id.as_ref().to_string(),
                    catalog_item: item,
                    data,
                    status,
                });
            }

            if let Err(error) = source
                .read(
                    begin,
                    end,
                    &mut read_requests,
                    &|_| {},
                    cancellation_token.child_token(),
                )
                .await
            {
                warn!(position, %error, "a source read failed, its samples become NaN");

                for request in &mut read_requests {
                    request.status.fill(0);
                }
            }

            for (&index, request) in unit_indices.iter().zip(read_requests) {
                let mut values = vec![0f64; request.status.len()];

                BufferUtilities::apply_representation_status(
                    request.catalog_item.representation.data_type,
                    &request.data,
                    &request.status,
                    &mut values,
                )?;

                units[index]
                    .data_writer
                    .write(BufferUtilities::to_f64_bytes(&values))
                    .await?;

                completed += 1;
                report_progress(completed as f64 / total_units as f64);
            }
        }

        for unit in units.iter_mut() {
            if unit.request.base_item.is_none() {
                continue;
            }

            if cancellation_token.is_cancelled() {
                return Err(NexusError::Cancelled);
            }

            self.read_processed(begin, end, unit, &cancellation_token)
                .await?;

            completed += 1;
            report_progress(completed as f64 / total_units as f64);
        }

        Ok(())
    }

    async fn read_processed(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        unit: &mut CatalogItemRequestPipeWriter,
        cancellation_token: &CancellationToken,
    ) -> Result<()> {
        let item = unit.request.item.clone();
        let base_item = unit
            .request
            .base_item
            .clone()
            .ok_or_else(|| NexusError::internal("a processed request without a base item"))?;

        let target_period = item.representation.sample_period;
        let base_period = base_item.representation.sample_period;
        let element_count = TimeUtilities::element_count(begin, end, &target_period);
        let mut target = vec![f64::NAN; element_count];

        let position = Self::pipeline_position(&base_item);
        let source = self.sources.get(position).ok_or_else(|| {
            NexusError::internal(format!("no source at pipeline position {position}"))
        })?;

        match item.representation.kind {
            RepresentationKind::Original => {
                return Err(NexusError::internal(
                    "an original request reached the processed read path",
                ));
            }

            RepresentationKind::Resampled => {
                let block_size = (base_period.as_nanos() / target_period.as_nanos()) as usize;
                let rounded_begin = TimeUtilities::floor(begin, &base_period);
                let rounded_end = TimeUtilities::ceil(end, &base_period);

                let (data, status) = ExtensibilityUtilities::create_buffers(
                    &base_item.representation,
                    rounded_begin,
                    rounded_end,
                );

                let mut read_requests = vec![ReadRequest {
                    original_resource_name: base_item.resource.id.as_ref().to_string(),
                    catalog_item: base_item.clone(),
                    data,
                    status,
                }];

                match source
                    .read(
                        rounded_begin,
                        rounded_end,
                        &mut read_requests,
                        &|_| {},
                        cancellation_token.child_token(),
                    )
                    .await
                {
                    Ok(()) => {
                        let request = &read_requests[0];

                        let offset = ((TimeUtilities::ticks_of(begin)
                            - TimeUtilities::ticks_of(rounded_begin))
                            / target_period.as_nanos()) as usize;

                        self.processing_service.resample(
                            base_item.representation.data_type,
                            &request.data,
                            &request.status,
                            &mut target,
                            block_size,
                            offset,
                        )?;
                    }

                    Err(error) => {
                        warn!(%error, "the base read for resampling failed, the result becomes NaN");
                    }
                }
            }

            kind => {
                let catalog_id = item.catalog.id.as_ref().to_string();

                let cache_enabled = self
                    .cache_pattern
                    .as_ref()
                    .is_none_or(|pattern| pattern.is_match(&catalog_id));

                let uncached = if cache_enabled {
                    match self.cache_service.read(&item, begin, &mut target).await {
                        Ok(uncached) => uncached,
                        Err(error) => {
                            warn!(catalog_id, %error, "cache read failed, treating the window as uncached");
                            vec![Interval::new(begin, end)]
                        }
                    }
                } else {
                    vec![Interval::new(begin, end)]
                };

                let block_size = (target_period.as_nanos() / base_period.as_nanos()) as usize;
                let mut computed: Vec<Interval> = Vec::new();

                for interval in &uncached {
                    if cancellation_token.is_cancelled() {
                        return Err(NexusError::Cancelled);
                    }

                    let (data, status) = ExtensibilityUtilities::create_buffers(
                        &base_item.representation,
                        interval.begin,
                        interval.end,
                    );

                    let mut read_requests = vec![ReadRequest {
                        original_resource_name: base_item.resource.id.as_ref().to_string(),
                        catalog_item: base_item.clone(),
                        data,
                        status,
                    }];

                    match source
                        .read(
                            interval.begin,
                            interval.end,
                            &mut read_requests,
                            &|_| {},
                            cancellation_token.child_token(),
                        )
                        .await
                    {
                        Ok(()) => {
                            let request = &read_requests[0];

                            let target_offset = ((TimeUtilities::ticks_of(interval.begin)
                                - TimeUtilities::ticks_of(begin))
                                / target_period.as_nanos())
                                as usize;
                            let target_length = TimeUtilities::element_count(
                                interval.begin,
                                interval.end,
                                &target_period,
                            );

                            self.processing_service.aggregate(
                                base_item.representation.data_type,
                                kind,
                                &request.data,
                                &request.status,
                                &mut target[target_offset..target_offset + target_length],
                                block_size,
                            )?;

                            computed.push(*interval);
                        }

                        Err(error) => {
                            warn!(%error, "the base read for aggregation failed, its slice becomes NaN");
                        }
                    }
                }

                if cache_enabled && !computed.is_empty() {
                    if let Err(error) = self
                        .cache_service
                        .update(&item, begin, &target, &computed)
                        .await
                    {
                        warn!(catalog_id, %error, "cache update failed");
                    }
                }
            }
        }

        unit.data_writer
            .write(BufferUtilities::to_f64_bytes(&target))
            .await?;

        Ok(())
    }

    fn pipeline_position(item: &CatalogItem) -> usize {
        item.resource
            .properties
            .as_ref()
            .and_then(|properties| properties.get(PIPELINE_POSITION_PROPERTY))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize
    }
}

fn dedupe_groups(groups_value: Value) -> Value {
    match groups_value {
        Value::Array(groups) => {
            let mut seen = HashSet::new();

            Value::Array(
                groups
                    .into_iter()
                    .filter(|group| match group.as_str() {
                        Some(group) => seen.insert(group.to_string()),
                        None => true,
                    })
                    .collect(),
            )
        }
        other => other,
    }
}
