use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, TimeDelta, Utc};
use nexus_extensibility::data_model::CatalogItem;
use tracing::debug;

use crate::core::{CacheEntry, Interval, push_merged};
use crate::errors::{NexusError, Result};
use crate::services::DatabaseService;
use crate::utilities::TimeUtilities;

/// Routes cache reads and writes to bucket files. The time axis decomposes
/// into one bucket per UTC day; each bucket is guarded by a process-wide
/// per-file lock so concurrent readers and writers of the same bucket
/// serialize while distinct buckets proceed in parallel.
pub struct CacheService {
    database: Arc<DatabaseService>,
    locks: StdMutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl CacheService {
    /// Creates the service.
    pub fn new(database: Arc<DatabaseService>) -> Self {
        CacheService {
            database,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Prefills the target buffer with the cached samples of the window
    /// `[begin, begin + target.len() * samplePeriod)` and returns the
    /// uncached intervals, merged across bucket boundaries.
    pub async fn read(
        &self,
        item: &CatalogItem,
        begin: DateTime<Utc>,
        target: &mut [f64],
    ) -> Result<Vec<Interval>> {
        let sample_period = item.representation.sample_period;
        let sample_period_ticks = sample_period.as_nanos();
        let end = begin + TimeDelta::nanoseconds(sample_period_ticks * target.len() as i64);
        let file_period = TimeUtilities::one_day();

        let mut uncached = Vec::new();
        let mut current_begin = begin;

        while current_begin < end {
            let file_begin = TimeUtilities::floor_ticks(
                current_begin,
                file_period.num_nanoseconds().unwrap_or(i64::MAX),
            );
            let current_end = (file_begin + file_period).min(end);

            let path = self.database.cache_entry_path(
                item.catalog.id.as_ref(),
                item.resource.id.as_ref(),
                &sample_period,
                file_begin,
            );

            let target_offset =
                ((TimeUtilities::ticks_of(current_begin) - TimeUtilities::ticks_of(begin))
                    / sample_period_ticks) as usize;
            let length = ((TimeUtilities::ticks_of(current_end)
                - TimeUtilities::ticks_of(current_begin))
                / sample_period_ticks) as usize;

            if path.is_file() {
                let lock = self.lock_for(&path);
                let _guard = lock.lock().await;

                let mut entry =
                    CacheEntry::open(&path, file_begin, file_period, sample_period)?;

                for interval in entry.read(
                    current_begin,
                    &mut target[target_offset..target_offset + length],
                )? {
                    push_merged(&mut uncached, interval);
                }
            } else {
                push_merged(&mut uncached, Interval::new(current_begin, current_end));
            }

            current_begin = current_end;
        }

        Ok(uncached)
    }

    /// Writes the computed samples of the given intervals back into the
    /// bucket files. `source` covers `[begin, begin + source.len() *
    /// samplePeriod)`; only the slices belonging to the intervals are
    /// written, so a partially failed source read never caches stale data.
    pub async fn update(
        &self,
        item: &CatalogItem,
        begin: DateTime<Utc>,
        source: &[f64],
        intervals: &[Interval],
    ) -> Result<()> {
        let sample_period = item.representation.sample_period;
        let sample_period_ticks = sample_period.as_nanos();
        let end = begin + TimeDelta::nanoseconds(sample_period_ticks * source.len() as i64);
        let file_period = TimeUtilities::one_day();

        for interval in intervals {
            let interval_begin = interval.begin.max(begin);
            let interval_end = interval.end.min(end);

            let mut current_begin = interval_begin;

            while current_begin < interval_end {
                let file_begin = TimeUtilities::floor_ticks(
                    current_begin,
                    file_period.num_nanoseconds().unwrap_or(i64::MAX),
                );
                let current_end = (file_begin + file_period).min(interval_end);

                let source_offset =
                    ((TimeUtilities::ticks_of(current_begin) - TimeUtilities::ticks_of(begin))
                        / sample_period_ticks) as usize;
                let length = ((TimeUtilities::ticks_of(current_end)
                    - TimeUtilities::ticks_of(current_begin))
                    / sample_period_ticks) as usize;

                let path = self.database.cache_entry_path(
                    item.catalog.id.as_ref(),
                    item.resource.id.as_ref(),
                    &sample_period,
                    file_begin,
                );

                let lock = self.lock_for(&path);
                let _guard = lock.lock().await;

                let mut entry =
                    CacheEntry::open(&path, file_begin, file_period, sample_period)?;

                entry.write(
                    current_begin,
                    &source[source_offset..source_offset + length],
                )?;

                current_begin = current_end;
            }
        }

        Ok(())
    }

    /// Clears the cached data of a catalog by deleting the bucket files
    /// whose bucket start falls into `[begin, end)`. Days are traversed in
    /// sequence so progress can be reported.
    pub async fn clear(
        &self,
        catalog_id: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        report_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<()> {
        if begin >= end {
            return Err(NexusError::validation(
                "the begin of the clear range must precede its end",
            ));
        }

        let file_period = TimeUtilities::one_day();
        let file_period_ticks = file_period.num_nanoseconds().unwrap_or(i64::MAX);

        let first_day = TimeUtilities::floor_ticks(begin, file_period_ticks);
        let last_day = TimeUtilities::floor_ticks(end, file_period_ticks);

        let day_count =
            ((TimeUtilities::ticks_of(last_day) - TimeUtilities::ticks_of(first_day))
                / file_period_ticks) as usize
                + 1;

        let mut day = first_day;
        let mut cleared = 0usize;

        while day <= last_day {
            if day >= begin && day < end {
                self.database.clear_cache_entries(catalog_id, day).await?;
                debug!(catalog_id, day = %day, "cleared cache buckets");
            }

            cleared += 1;
            report_progress(cleared as f64 / day_count as f64);

            day = day + file_period;
        }

        Ok(())
    }

    fn lock_for(&self, path: &PathBuf) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        locks
            .entry(path.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use nexus_extensibility::data_model::{
        NexusDataType, Representation, RepresentationKind, Resource, ResourceCatalog,
        ResourceCatalogId, ResourceId, SamplePeriod,
    };
    use tempfile::TempDir;

    use super::*;
    use crate::options::PathsOptions;

    fn instant(value: &str) -> DateTime<Utc> {
        value.parse().unwrap()
    }

    fn catalog_item(sample_period: &str) -> CatalogItem {
        let catalog = ResourceCatalog::new(ResourceCatalogId::try_new("/A/B".to_string()).unwrap());

        let resource = Resource {
            id: ResourceId::try_new("T1".to_string()).unwrap(),
            properties: None,
            representations: None,
        };

        CatalogItem {
            catalog,
            resource,
            representation: Representation {
                data_type: NexusDataType::FLOAT64,
                sample_period: SamplePeriod::from_unit_string(sample_period).unwrap(),
                kind: RepresentationKind::Mean,
                parameters: None,
            },
            parameters: None,
        }
    }

    fn cache_service(directory: &TempDir) -> CacheService {
        let root = directory.path();

        CacheService::new(Arc::new(DatabaseService::new(PathsOptions {
            cache: root.join("cache"),
            catalogs: root.join("catalogs"),
            artifacts: root.join("artifacts"),
            packages: root.join("packages"),
            config: root.join("config"),
        })))
    }

    #[tokio::test]
    async fn missing_buckets_are_fully_uncached() {
        let directory = TempDir::new().unwrap();
        let service = cache_service(&directory);
        let item = catalog_item("1_h");

        let mut target = vec![0f64; 6];
        let uncached = service
            .read(&item, instant("2020-01-01T00:00:00Z"), &mut target)
            .await
            .unwrap();

        assert_eq!(
            uncached,
            vec![Interval::new(
                instant("2020-01-01T00:00:00Z"),
                instant("2020-01-01T06:00:00Z")
            )]
        );
    }

    #[tokio::test]
    async fn update_then_read_round_trips_across_buckets() {
        let directory = TempDir::new().unwrap();
        let service = cache_service(&directory);
        let item = catalog_item("6_h");

        // Two days, eight samples; cache all of them.
        let begin = instant("2020-01-01T00:00:00Z");
        let source: Vec<f64> = (0..8).map(|index| index as f64 * 1.5).collect();
        let whole = Interval::new(begin, instant("2020-01-03T00:00:00Z"));

        service.update(&item, begin, &source, &[whole]).await.unwrap();

        let mut target = vec![0f64; 8];
        let uncached = service.read(&item, begin, &mut target).await.unwrap();

        assert!(uncached.is_empty());
        assert_eq!(target, source);
    }

    #[tokio::test]
    async fn update_writes_only_the_given_intervals() {
        let directory = TempDir::new().unwrap();
        let service = cache_service(&directory);
        let item = catalog_item("6_h");

        let begin = instant("2020-01-01T00:00:00Z");
        let source: Vec<f64> = (0..4).map(|index| index as f64).collect();

        // Only the second half was computed successfully.
        let computed = Interval::new(instant("2020-01-01T12:00:00Z"), instant("2020-01-02T00:00:00Z"));

        service
            .update(&item, begin, &source, &[computed])
            .await
            .unwrap();

        let mut target = vec![0f64; 4];
        let uncached = service.read(&item, begin, &mut target).await.unwrap();

        assert_eq!(
            uncached,
            vec![Interval::new(begin, instant("2020-01-01T12:00:00Z"))]
        );
        assert_eq!(&target[2..], &[2.0, 3.0]);
    }

    #[tokio::test]
    async fn clear_removes_buckets_in_range() {
        let directory = TempDir::new().unwrap();
        let service = cache_service(&directory);
        let item = catalog_item("6_h");

        let begin = instant("2020-01-01T00:00:00Z");
        let source: Vec<f64> = (0..8).map(|index| index as f64).collect();
        let whole = Interval::new(begin, instant("2020-01-03T00:00:00Z"));

        service.update(&item, begin, &source, &[whole]).await.unwrap();

        service
            .clear(
                "/A/B",
                instant("2020-01-02T00:00:00Z"),
                instant("2020-01-03T00:00:00Z"),
                &|_| {},
            )
            .await
            .unwrap();

        let mut target = vec![0f64; 8];
        let uncached = service.read(&item, begin, &mut target).await.unwrap();

        // Day one survived, day two is gone.
        assert_eq!(
            uncached,
            vec![Interval::new(
                instant("2020-01-02T00:00:00Z"),
                instant("2020-01-03T00:00:00Z")
            )]
        );
        assert_eq!(&target[..4], &[0.0, 1.0, 2.0, 3.0]);
    }
}
