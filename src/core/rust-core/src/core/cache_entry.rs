use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use nexus_extensibility::data_model::SamplePeriod;

use crate::errors::{NexusError, Result};
use crate::utilities::TimeUtilities;

/// The interval index is a single count byte, so a bucket holds at most 255
/// cached intervals. A write that would exceed the bound fails instead of
/// truncating the index.
pub const MAX_INTERVAL_COUNT: usize = 255;

/// A half-open time interval `[begin, end)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Interval {
    /// The inclusive begin.
    pub begin: DateTime<Utc>,

    /// The exclusive end.
    pub end: DateTime<Utc>,
}

impl Interval {
    /// Creates an interval.
    pub fn new(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Interval { begin, end }
    }

    /// Whether the interval contains no time at all.
    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }
}

/// One cache bucket file:
///
/// ```text
/// offset 0           : f64 x (filePeriod / samplePeriod)   dense data
/// offset dataLen     : u8 N                                interval count
/// offset dataLen + 1 : N x (i64 beginTicks, i64 endTicks)  little-endian
/// ```
///
/// The intervals are disjoint, sorted by begin, non-adjacent and lie within
/// the file bucket. Entries are single-threaded; the cache service hands out
/// one exclusive handle per bucket file.
pub struct CacheEntry {
    file: File,
    file_begin: DateTime<Utc>,
    file_end: DateTime<Utc>,
    sample_period: SamplePeriod,
    element_count: usize,
}

impl CacheEntry {
    /// Opens or creates the bucket file. A fresh file is grown to hold the
    /// dense data region and an empty interval index.
    pub fn open(
        path: &Path,
        file_begin: DateTime<Utc>,
        file_period: TimeDelta,
        sample_period: SamplePeriod,
    ) -> Result<Self> {
        let file_period_ticks = file_period.num_nanoseconds().unwrap_or(0);
        let sample_period_ticks = sample_period.as_nanos();

        if file_period_ticks <= 0 || file_period_ticks % sample_period_ticks != 0 {
            return Err(NexusError::validation(format!(
                "the file period {file_period} is not a multiple of the sample period"
            )));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let element_count = (file_period_ticks / sample_period_ticks) as usize;

        let entry = CacheEntry {
            file,
            file_begin,
            file_end: file_begin + file_period,
            sample_period,
            element_count,
        };

        if entry.file.metadata()?.len() == 0 {
            entry
                .file
                .set_len(entry.data_length() + 1 + 2 * size_of::<i64>() as u64)?;
        }

        Ok(entry)
    }

    /// Reads the window `[begin, begin + target.len() * samplePeriod)`.
    /// Cached sub-windows are copied into the corresponding target slices;
    /// the returned intervals are the non-empty, disjoint uncached
    /// sub-windows, adjacent ones merged.
    pub fn read(&mut self, begin: DateTime<Utc>, target: &mut [f64]) -> Result<Vec<Interval>> {
        let end = begin + TimeDelta::nanoseconds(self.sample_period.as_nanos() * target.len() as i64);
        self.check_window(begin, end)?;

        let mut uncached: Vec<Interval> = Vec::new();
        let mut current = begin;

        for interval in self.read_intervals()? {
            let cached_begin = interval.begin.max(begin);
            let cached_end = interval.end.min(end);

            if cached_begin >= cached_end {
                continue;
            }

            if current < cached_begin {
                push_merged(&mut uncached, Interval::new(current, cached_begin));
            }

            let target_offset = self.index_of(cached_begin) - self.index_of(begin);
            let length = self.index_of(cached_end) - self.index_of(cached_begin);
            self.read_values(cached_begin, &mut target[target_offset..target_offset + length])?;

            current = current.max(cached_end);
        }

        if current < end {
            push_merged(&mut uncached, Interval::new(current, end));
        }

        Ok(uncached)
    }

    /// Writes the samples starting at `begin` and inserts the covered
    /// interval into the index, coalescing overlapping and adjacent entries.
    pub fn write(&mut self, begin: DateTime<Utc>, source: &[f64]) -> Result<()> {
        let end = begin + TimeDelta::nanoseconds(self.sample_period.as_nanos() * source.len() as i64);
        self.check_window(begin, end)?;

        if source.is_empty() {
            return Ok(());
        }

        let mut intervals = self.read_intervals()?;
        intervals.push(Interval::new(begin, end));

        intervals.sort_by_key(|interval| {
            (
                TimeUtilities::ticks_of(interval.begin),
                TimeUtilities::ticks_of(interval.end),
            )
        });

        let mut coalesced: Vec<Interval> = Vec::new();

        for interval in intervals {
            match coalesced.last_mut() {
                Some(last) if interval.begin <= last.end => {
                    last.end = last.end.max(interval.end);
                }
                _ => coalesced.push(interval),
            }
        }

        if coalesced.len() > MAX_INTERVAL_COUNT {
            return Err(NexusError::validation(format!(
                "the write would exceed the maximum of {MAX_INTERVAL_COUNT} cached intervals"
            )));
        }

        self.write_values(begin, source)?;
        self.write_intervals(&coalesced)?;

        Ok(())
    }

    /// The intervals currently recorded in the trailer.
    pub fn read_intervals(&mut self) -> Result<Vec<Interval>> {
        self.file.seek(SeekFrom::Start(self.data_length()))?;

        let mut count_buffer = [0u8; 1];
        self.file.read_exact(&mut count_buffer)?;
        let count = count_buffer[0] as usize;

        let mut tick_buffer = vec![0u8; count * 2 * size_of::<i64>()];
        self.file.read_exact(&mut tick_buffer)?;

        let mut intervals = Vec::with_capacity(count);

        for pair in tick_buffer.chunks_exact(2 * size_of::<i64>()) {
            let mut begin_bytes = [0u8; 8];
            let mut end_bytes = [0u8; 8];
            begin_bytes.copy_from_slice(&pair[0..8]);
            end_bytes.copy_from_slice(&pair[8..16]);

            intervals.push(Interval::new(
                TimeUtilities::from_ticks(i64::from_le_bytes(begin_bytes)),
                TimeUtilities::from_ticks(i64::from_le_bytes(end_bytes)),
            ));
        }

        Ok(intervals)
    }

    fn write_intervals(&mut self, intervals: &[Interval]) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.data_length()))?;

        let mut buffer = Vec::with_capacity(1 + intervals.len() * 2 * size_of::<i64>());
        buffer.push(intervals.len() as u8);

        for interval in intervals {
            buffer.extend_from_slice(&TimeUtilities::ticks_of(interval.begin).to_le_bytes());
            buffer.extend_from_slice(&TimeUtilities::ticks_of(interval.end).to_le_bytes());
        }

        self.file.write_all(&buffer)?;
        self.file.set_len(self.data_length() + buffer.len() as u64)?;

        Ok(())
    }

    fn read_values(&mut self, begin: DateTime<Utc>, target: &mut [f64]) -> Result<()> {
        let offset = self.index_of(begin) as u64 * size_of::<f64>() as u64;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; target.len() * size_of::<f64>()];
        self.file.read_exact(&mut buffer)?;

        for (index, value) in target.iter_mut().enumerate() {
            let mut value_bytes = [0u8; 8];
            value_bytes.copy_from_slice(&buffer[index * 8..(index + 1) * 8]);
            *value = f64::from_le_bytes(value_bytes);
        }

        Ok(())
    }

    fn write_values(&mut self, begin: DateTime<Utc>, source: &[f64]) -> Result<()> {
        let offset = self.index_of(begin) as u64 * size_of::<f64>() as u64;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut buffer = Vec::with_capacity(source.len() * size_of::<f64>());

        for value in source {
            buffer.extend_from_slice(&value.to_le_bytes());
        }

        self.file.write_all(&buffer)?;

        Ok(())
    }

    fn check_window(&self, begin: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
        if begin < self.file_begin
            || end > self.file_end
            || begin > end
            || !TimeUtilities::is_aligned(begin, &self.sample_period)
        {
            return Err(NexusError::validation(format!(
                "the window [{begin}, {end}) does not fit the file bucket [{}, {})",
                self.file_begin, self.file_end
            )));
        }

        Ok(())
    }

    fn index_of(&self, value: DateTime<Utc>) -> usize {
        ((TimeUtilities::ticks_of(value) - TimeUtilities::ticks_of(self.file_begin))
            / self.sample_period.as_nanos()) as usize
    }

    fn data_length(&self) -> u64 {
        self.element_count as u64 * size_of::<f64>() as u64
    }
}

/// Appends an uncached interval, merging it with the tail when adjacent.
pub(crate) fn push_merged(uncached: &mut Vec<Interval>, interval: Interval) {
    if interval.is_empty() {
        return;
    }

    match uncached.last_mut() {
        Some(last) if last.end == interval.begin => last.end = interval.end,
        _ => uncached.push(interval),
    }
}
