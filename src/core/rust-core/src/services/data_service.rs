use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use nexus_extensibility::data_model::{RepresentationKind, SamplePeriod};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use uuid::Uuid;

use crate::core::CatalogItemRequestPipeWriter;
use crate::errors::{NexusError, Result};
use crate::extensibility::DataSourceController;
use crate::services::{DataControllerService, DataSourcePipeline, MemoryTracker};
use crate::utilities::{TimeUtilities, when_all_fail_fast};

/// The units of one pipeline, read through one controller.
struct ReadingGroup {
    controller: DataSourceController,
    units: Vec<CatalogItemRequestPipeWriter>,
}

/// The read orchestrator: validates a read, negotiates a memory allocation,
/// chunks the total time range accordingly and fans one concurrent
/// controller read per pipeline group out per chunk, reporting aggregate
/// monotone progress. Non-fatal chunk failures are logged and skipped;
/// out-of-memory aborts the read.
pub struct DataService {
    controller_service: Arc<DataControllerService>,
    memory_tracker: Arc<MemoryTracker>,
}

impl DataService {
    /// Creates the service.
    pub fn new(
        controller_service: Arc<DataControllerService>,
        memory_tracker: Arc<MemoryTracker>,
    ) -> Self {
        DataService {
            controller_service,
            memory_tracker,
        }
    }

    /// Reads `[begin, end)` at the given sample period into the per-request
    /// pipes and completes them afterwards.
    pub async fn read(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        sample_period: SamplePeriod,
        units: Vec<CatalogItemRequestPipeWriter>,
        report_progress: &(dyn Fn(f64) + Send + Sync),
        cancellation_token: CancellationToken,
    ) -> Result<()> {
        Self::validate(begin, end, &sample_period, &units)?;

        if units.is_empty() {
            report_progress(1.0);
            return Ok(());
        }

        // One row spans all requests; processed representations widen to
        // FLOAT64 through their derived item.
        let bytes_per_row: u64 = units
            .iter()
            .map(|unit| unit.request.item.representation.element_size() as u64)
            .sum();

        let total_ticks =
            TimeUtilities::ticks_of(end) - TimeUtilities::ticks_of(begin);
        let total_row_count = (total_ticks / sample_period.as_nanos()) as u64;
        let total_byte_count = bytes_per_row * total_row_count;

        let allocation = self
            .memory_tracker
            .register_allocation(bytes_per_row, total_byte_count, &cancellation_token)
            .await?;

        let rows_per_chunk = allocation.actual_byte_count() / bytes_per_row;

        let largest_base_ticks = units
            .iter()
            .filter_map(|unit| {
                unit.request
                    .base_item
                    .as_ref()
                    .map(|base_item| base_item.representation.sample_period.as_nanos())
            })
            .max()
            .unwrap_or_else(|| sample_period.as_nanos());

        let mut max_period_ticks = sample_period
            .as_nanos()
            .saturating_mul(i64::try_from(rows_per_chunk).unwrap_or(i64::MAX));

        max_period_ticks = (max_period_ticks / largest_base_ticks) * largest_base_ticks;

        if max_period_ticks == 0 {
            return Err(NexusError::OutOfMemory(
                "the granted memory does not cover a single base period per chunk".to_string(),
            ));
        }

        debug!(
            bytes_per_row,
            total_byte_count,
            chunk_byte_count = allocation.actual_byte_count(),
            "start orchestrated read"
        );

        let mut reading_groups = self.build_reading_groups(units).await?;
        let group_count = reading_groups.len();

        let group_progress: Vec<AtomicU64> =
            (0..group_count).map(|_| AtomicU64::new(0)).collect();
        let last_reported = AtomicU64::new(0);

        let mut consumed_ticks: i64 = 0;

        while consumed_ticks < total_ticks {
            if cancellation_token.is_cancelled() {
                return Err(NexusError::Cancelled);
            }

            let chunk_ticks = max_period_ticks.min(total_ticks - consumed_ticks);
            let chunk_begin =
                TimeUtilities::from_ticks(TimeUtilities::ticks_of(begin) + consumed_ticks);
            let chunk_end = TimeUtilities::from_ticks(
                TimeUtilities::ticks_of(begin) + consumed_ticks + chunk_ticks,
            );

            let chunk_futures: Vec<_> = reading_groups
                .iter_mut()
                .zip(0..)
                .map(|(group, group_index): (&mut ReadingGroup, usize)| {
                    let group_progress = &group_progress;
                    let last_reported = &last_reported;
                    let cancellation_token = cancellation_token.clone();

                    async move {
                        let progress_callback = move |value: f64| {
                            let bits = value.clamp(0.0, 1.0).to_bits();
                            group_progress[group_index].fetch_max(bits, Ordering::SeqCst);

                            let chunk_fraction = group_progress
                                .iter()
                                .map(|cell| f64::from_bits(cell.load(Ordering::SeqCst)))
                                .sum::<f64>()
                                / group_count as f64;

                            let overall = (consumed_ticks as f64
                                + chunk_fraction * chunk_ticks as f64)
                                / total_ticks as f64;

                            let overall_bits = overall.to_bits();
                            let previous =
                                last_reported.fetch_max(overall_bits, Ordering::SeqCst);

                            if overall_bits > previous {
                                report_progress(overall.min(1.0));
                            }
                        };

                        let result = group
                            .controller
                            .read(
                                chunk_begin,
                                chunk_end,
                                &mut group.units,
                                &progress_callback,
                                cancellation_token,
                            )
                            .await;

                        match result {
                            Ok(()) => Ok(()),
                            Err(error @ NexusError::OutOfMemory(_)) => Err(error),
                            Err(NexusError::Cancelled) => Err(NexusError::Cancelled),
                            Err(error) => {
                                error!(%error, "a pipeline group failed for this chunk");
                                Ok(())
                            }
                        }
                    }
                })
                .collect();

            when_all_fail_fast(chunk_futures, &cancellation_token).await?;

            consumed_ticks += chunk_ticks;

            for cell in &group_progress {
                cell.store(0, Ordering::SeqCst);
            }
        }

        drop(allocation);

        for group in reading_groups {
            for unit in group.units {
                unit.data_writer.complete();
            }
        }

        report_progress(1.0);

        Ok(())
    }

    async fn build_reading_groups(
        &self,
        units: Vec<CatalogItemRequestPipeWriter>,
    ) -> Result<Vec<ReadingGroup>> {
        let mut grouped: Vec<(Uuid, Arc<DataSourcePipeline>, Vec<CatalogItemRequestPipeWriter>)> =
            Vec::new();

        for unit in units {
            let reference = unit.request.container.pipeline().ok_or_else(|| {
                NexusError::validation("the root catalog has no readable resources")
            })?;

            let pipeline_id = reference.pipeline_id;
            let pipeline = reference.pipeline.clone();

            match grouped.iter_mut().find(|(id, _, _)| *id == pipeline_id) {
                Some((_, _, group_units)) => group_units.push(unit),
                None => grouped.push((pipeline_id, pipeline, vec![unit])),
            }
        }

        let mut reading_groups = Vec::with_capacity(grouped.len());

        for (_, pipeline, group_units) in grouped {
            let controller = self
                .controller_service
                .get_controller(&pipeline, None)
                .await?;

            reading_groups.push(ReadingGroup {
                controller,
                units: group_units,
            });
        }

        Ok(reading_groups)
    }

    fn validate(
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        sample_period: &SamplePeriod,
        units: &[CatalogItemRequestPipeWriter],
    ) -> Result<()> {
        if begin >= end {
            return Err(NexusError::validation(
                "the begin of the read range must precede its end",
            ));
        }

        if !TimeUtilities::is_aligned(begin, sample_period)
            || !TimeUtilities::is_aligned(end, sample_period)
        {
            return Err(NexusError::validation(format!(
                "begin and end must be multiples of the sample period {}",
                sample_period.to_unit_string()
            )));
        }

        for unit in units {
            let item = &unit.request.item;

            if item.representation.sample_period != *sample_period {
                return Err(NexusError::validation(format!(
                    "the representation {} does not match the requested sample period {}",
                    item.to_path(),
                    sample_period.to_unit_string()
                )));
            }

            if let Some(base_item) = &unit.request.base_item {
                let target_ticks = item.representation.sample_period.as_nanos();
                let base_ticks = base_item.representation.sample_period.as_nanos();

                let valid = if item.representation.kind == RepresentationKind::Resampled {
                    target_ticks <= base_ticks && base_ticks % target_ticks == 0
                } else {
                    target_ticks >= base_ticks && target_ticks % base_ticks == 0
                };

                if !valid {
                    return Err(NexusError::validation(format!(
                        "the sample periods of {} and its base are not integer multiples",
                        item.to_path()
                    )));
                }
            } else if item.representation.kind != RepresentationKind::Original {
                return Err(NexusError::validation(format!(
                    "the processed representation {} requires a base item",
                    item.to_path()
                )));
            }
        }

        Ok(())
    }
}
