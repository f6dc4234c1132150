use nexus_extensibility::data_model::{NexusDataType, RepresentationKind};

use crate::errors::{NexusError, Result};
use crate::utilities::{NexusPrimitive, for_data_type};

/// The aggregation and resampling kernels. Aggregation folds blocks of
/// `block_size` base samples into one target sample, honoring the NaN
/// threshold; resampling stretch-holds each base sample `block_size` times.
pub struct ProcessingService {
    aggregation_nan_threshold: f64,
}

impl ProcessingService {
    /// Creates the service with the configured NaN threshold.
    pub fn new(aggregation_nan_threshold: f64) -> Self {
        ProcessingService {
            aggregation_nan_threshold,
        }
    }

    /// Aggregates raw base samples into the target buffer. A block yields
    /// NaN when the fraction of valid samples falls below the threshold,
    /// otherwise the kernel runs over the valid subset.
    pub fn aggregate(
        &self,
        data_type: NexusDataType,
        kind: RepresentationKind,
        data: &[u8],
        status: &[u8],
        target: &mut [f64],
        block_size: usize,
    ) -> Result<()> {
        if !kind.is_aggregation() {
            return Err(NexusError::internal(format!(
                "the representation kind {kind:?} is not an aggregation"
            )));
        }

        if matches!(
            kind,
            RepresentationKind::MinBitwise | RepresentationKind::MaxBitwise
        ) && !data_type.is_integer()
        {
            return Err(NexusError::validation(format!(
                "bit-wise aggregations require an integer data type, got {data_type:?}"
            )));
        }

        let threshold = self.aggregation_nan_threshold;

        for_data_type!(
            data_type,
            aggregate_typed(kind, data, status, target, block_size, threshold)
        )
    }

    /// Stretch-holds base samples into the target buffer, discarding the
    /// first `offset` outputs and propagating invalid status as NaN.
    pub fn resample(
        &self,
        data_type: NexusDataType,
        data: &[u8],
        status: &[u8],
        target: &mut [f64],
        block_size: usize,
        offset: usize,
    ) -> Result<()> {
        for_data_type!(
            data_type,
            resample_typed(data, status, target, block_size, offset)
        )
    }
}

fn aggregate_typed<T: NexusPrimitive>(
    kind: RepresentationKind,
    data: &[u8],
    status: &[u8],
    target: &mut [f64],
    block_size: usize,
    threshold: f64,
) -> Result<()> {
    if block_size == 0
        || data.len() != status.len() * T::SIZE
        || status.len() != target.len() * block_size
    {
        return Err(NexusError::internal(format!(
            "aggregation buffer mismatch: {} data bytes, {} status bytes, {} target elements, block size {block_size}",
            data.len(),
            status.len(),
            target.len()
        )));
    }

    for (block_index, output) in target.iter_mut().enumerate() {
        let status_block = &status[block_index * block_size..(block_index + 1) * block_size];
        let valid_count = status_block.iter().filter(|status| **status == 1).count();

        if (valid_count as f64) < threshold * block_size as f64 {
            *output = f64::NAN;
            continue;
        }

        let valid_values = status_block.iter().enumerate().filter_map(|(index, status)| {
            if *status == 1 {
                let element_index = block_index * block_size + index;
                Some(T::from_le_slice(
                    &data[element_index * T::SIZE..(element_index + 1) * T::SIZE],
                ))
            } else {
                None
            }
        });

        *output = match kind {
            RepresentationKind::Min => valid_values
                .map(|value| value.to_f64())
                .fold(f64::INFINITY, f64::min),

            RepresentationKind::Max => valid_values
                .map(|value| value.to_f64())
                .fold(f64::NEG_INFINITY, f64::max),

            RepresentationKind::Sum => valid_values.map(|value| value.to_f64()).sum(),

            RepresentationKind::Mean => {
                let sum: f64 = valid_values.map(|value| value.to_f64()).sum();
                sum / valid_count as f64
            }

            RepresentationKind::MeanPolarDeg => {
                let (sin_sum, cos_sum) = valid_values
                    .map(|value| value.to_f64().to_radians())
                    .fold((0.0, 0.0), |(sin_sum, cos_sum), radians| {
                        (sin_sum + radians.sin(), cos_sum + radians.cos())
                    });

                let degrees = sin_sum.atan2(cos_sum).to_degrees();

                degrees.rem_euclid(360.0)
            }

            RepresentationKind::MinBitwise => {
                fold_bits(valid_values, |accumulator, bits| accumulator & bits)
            }

            RepresentationKind::MaxBitwise => {
                fold_bits(valid_values, |accumulator, bits| accumulator | bits)
            }

            RepresentationKind::Original | RepresentationKind::Resampled => {
                return Err(NexusError::internal(
                    "non-aggregation kind reached the aggregation kernel",
                ));
            }
        };
    }

    Ok(())
}

fn fold_bits<T: NexusPrimitive>(
    values: impl Iterator<Item = T>,
    fold: impl Fn(u64, u64) -> u64,
) -> f64 {
    let mut accumulator: Option<u64> = None;

    for value in values {
        let bits = value.to_raw_bits();

        accumulator = Some(match accumulator {
            Some(current) => fold(current, bits),
            None => bits,
        });
    }

    match accumulator {
        Some(bits) => T::from_raw_bits(bits).to_f64(),
        None => f64::NAN,
    }
}

fn resample_typed<T: NexusPrimitive>(
    data: &[u8],
    status: &[u8],
    target: &mut [f64],
    block_size: usize,
    offset: usize,
) -> Result<()> {
    if block_size == 0
        || data.len() != status.len() * T::SIZE
        || target.len() + offset > status.len() * block_size
    {
        return Err(NexusError::internal(format!(
            "resampling buffer mismatch: {} data bytes, {} status bytes, {} target elements, block size {block_size}, offset {offset}",
            data.len(),
            status.len(),
            target.len()
        )));
    }

    for (index, output) in target.iter_mut().enumerate() {
        let element_index = (index + offset) / block_size;

        *output = if status[element_index] != 1 {
            f64::NAN
        } else {
            T::from_le_slice(&data[element_index * T::SIZE..(element_index + 1) * T::SIZE]).to_f64()
        };
    }

    Ok(())
}
