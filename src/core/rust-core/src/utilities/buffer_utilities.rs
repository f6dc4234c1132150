use nexus_extensibility::data_model::NexusDataType;

use crate::errors::{NexusError, Result};

/// A primitive element type of a representation, decodable from
/// little-endian bytes and widenable to f64.
pub trait NexusPrimitive: Copy + PartialOrd + Send + Sync + 'static {
    /// The element size in bytes.
    const SIZE: usize;

    /// Whether the type is an integer type (bit-wise aggregations require
    /// integer inputs).
    const IS_INTEGER: bool;

    /// Decodes one element from exactly `SIZE` little-endian bytes.
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// Widens the element to f64.
    fn to_f64(self) -> f64;

    /// The raw bit pattern, zero- or sign-extended to 64 bits.
    fn to_raw_bits(self) -> u64;

    /// Reconstructs an element from a (truncated) 64-bit pattern.
    fn from_raw_bits(bits: u64) -> Self;
}

macro_rules! impl_integer_primitive {
    ($type:ty) => {
        impl NexusPrimitive for $type {
            const SIZE: usize = std::mem::size_of::<$type>();
            const IS_INTEGER: bool = true;

            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut buffer = [0u8; std::mem::size_of::<$type>()];
                buffer.copy_from_slice(bytes);
                <$type>::from_le_bytes(buffer)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn to_raw_bits(self) -> u64 {
                self as u64
            }

            fn from_raw_bits(bits: u64) -> Self {
                bits as $type
            }
        }
    };
}

impl_integer_primitive!(u8);
impl_integer_primitive!(i8);
impl_integer_primitive!(u16);
impl_integer_primitive!(i16);
impl_integer_primitive!(u32);
impl_integer_primitive!(i32);
impl_integer_primitive!(u64);
impl_integer_primitive!(i64);

impl NexusPrimitive for f32 {
    const SIZE: usize = 4;
    const IS_INTEGER: bool = false;

    fn from_le_slice(bytes: &[u8]) -> Self {
        let mut buffer = [0u8; 4];
        buffer.copy_from_slice(bytes);
        f32::from_le_bytes(buffer)
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn to_raw_bits(self) -> u64 {
        self.to_bits() as u64
    }

    fn from_raw_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl NexusPrimitive for f64 {
    const SIZE: usize = 8;
    const IS_INTEGER: bool = false;

    fn from_le_slice(bytes: &[u8]) -> Self {
        let mut buffer = [0u8; 8];
        buffer.copy_from_slice(bytes);
        f64::from_le_bytes(buffer)
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn to_raw_bits(self) -> u64 {
        self.to_bits()
    }

    fn from_raw_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

/// Dispatches a generic function over the primitive type behind a
/// [NexusDataType].
macro_rules! for_data_type {
    ($data_type:expr, $function:ident ( $($argument:expr),* )) => {
        match $data_type {
            NexusDataType::UINT8 => $function::<u8>($($argument),*),
            NexusDataType::INT8 => $function::<i8>($($argument),*),
            NexusDataType::UINT16 => $function::<u16>($($argument),*),
            NexusDataType::INT16 => $function::<i16>($($argument),*),
            NexusDataType::UINT32 => $function::<u32>($($argument),*),
            NexusDataType::INT32 => $function::<i32>($($argument),*),
            NexusDataType::UINT64 => $function::<u64>($($argument),*),
            NexusDataType::INT64 => $function::<i64>($($argument),*),
            NexusDataType::FLOAT32 => $function::<f32>($($argument),*),
            NexusDataType::FLOAT64 => $function::<f64>($($argument),*),
        }
    };
}

pub(crate) use for_data_type;

/// Typed views over raw byte buffers and the representation status masking.
pub struct BufferUtilities;

impl BufferUtilities {
    /// Widens a raw little-endian buffer to f64 while applying the status
    /// buffer: elements whose status is not 1 become NaN.
    pub fn apply_representation_status(
        data_type: NexusDataType,
        data: &[u8],
        status: &[u8],
        target: &mut [f64],
    ) -> Result<()> {
        for_data_type!(data_type, apply_representation_status_typed(data, status, target))
    }

    /// Reinterprets a little-endian byte buffer as f64 values.
    pub fn from_f64_bytes(data: &[u8], target: &mut [f64]) {
        for (index, value) in target.iter_mut().enumerate() {
            *value = f64::from_le_slice(&data[index * 8..(index + 1) * 8]);
        }
    }

    /// Encodes f64 values as little-endian bytes.
    pub fn to_f64_bytes(values: &[f64]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(values.len() * 8);

        for value in values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        bytes
    }
}

fn apply_representation_status_typed<T: NexusPrimitive>(
    data: &[u8],
    status: &[u8],
    target: &mut [f64],
) -> Result<()> {
    if data.len() != status.len() * T::SIZE || status.len() != target.len() {
        return Err(NexusError::internal(format!(
            "buffer length mismatch: {} data bytes, {} status bytes, {} target elements",
            data.len(),
            status.len(),
            target.len()
        )));
    }

    for (index, value) in target.iter_mut().enumerate() {
        *value = if status[index] != 1 {
            f64::NAN
        } else {
            T::from_le_slice(&data[index * T::SIZE..(index + 1) * T::SIZE]).to_f64()
        };
    }

    Ok(())
}
