//! Dense buffer element types.

use arrow_array::{
    types::{
        Float16Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
        UInt16Type, UInt32Type, UInt64Type, UInt8Type,
    },
    ArrowPrimitiveType,
};
use arrow_buffer::ArrowNativeType;
use arrow_schema::DataType;
use half::{bf16, f16};

/// The element type of a dense buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[non_exhaustive]
#[rustfmt::skip]
pub enum Dtype {
    /// `int8`
    #[display("int8")] Int8,
    /// `int16`
    #[display("int16")] Int16,
    /// `int32`
    #[display("int32")] Int32,
    /// `int64`
    #[display("int64")] Int64,
    /// `uint8`
    #[display("uint8")] UInt8,
    /// `uint16`
    #[display("uint16")] UInt16,
    /// `uint32`
    #[display("uint32")] UInt32,
    /// `uint64`
    #[display("uint64")] UInt64,
    /// `float16` IEEE 754 half-precision floating point.
    #[display("float16")] Float16,
    /// `bfloat16` brain floating point: sign bit, 8 bits exponent, 7 bits mantissa.
    #[display("bfloat16")] BFloat16,
    /// `float32` IEEE 754 single-precision floating point.
    #[display("float32")] Float32,
    /// `float64` IEEE 754 double-precision floating point.
    #[display("float64")] Float64,
}

impl Dtype {
    /// Returns the element type of an Arrow primitive data type, or [`None`] if there is no equivalent.
    #[must_use]
    pub fn from_arrow(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Int8 => Some(Self::Int8),
            DataType::Int16 => Some(Self::Int16),
            DataType::Int32 => Some(Self::Int32),
            DataType::Int64 => Some(Self::Int64),
            DataType::UInt8 => Some(Self::UInt8),
            DataType::UInt16 => Some(Self::UInt16),
            DataType::UInt32 => Some(Self::UInt32),
            DataType::UInt64 => Some(Self::UInt64),
            DataType::Float16 => Some(Self::Float16),
            DataType::Float32 => Some(Self::Float32),
            DataType::Float64 => Some(Self::Float64),
            _ => None,
        }
    }

    /// Returns the equivalent Arrow primitive data type.
    ///
    /// `bfloat16` has no Arrow primitive equivalent and returns [`None`].
    #[must_use]
    pub fn to_arrow(self) -> Option<DataType> {
        match self {
            Self::Int8 => Some(DataType::Int8),
            Self::Int16 => Some(DataType::Int16),
            Self::Int32 => Some(DataType::Int32),
            Self::Int64 => Some(DataType::Int64),
            Self::UInt8 => Some(DataType::UInt8),
            Self::UInt16 => Some(DataType::UInt16),
            Self::UInt32 => Some(DataType::UInt32),
            Self::UInt64 => Some(DataType::UInt64),
            Self::Float16 => Some(DataType::Float16),
            Self::Float32 => Some(DataType::Float32),
            Self::Float64 => Some(DataType::Float64),
            Self::BFloat16 => None,
        }
    }

    /// Returns the size of an element in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }
}

/// A plain-old-data element of a dense buffer with a runtime [`Dtype`] tag.
pub trait Element: bytemuck::Pod + Send + Sync + 'static {
    /// The element type.
    const DTYPE: Dtype;
}

/// An [`Element`] that can be stored in an Arrow primitive array.
pub trait TensorElement: Element + ArrowNativeType {
    /// The Arrow primitive type with this element as its native type.
    type ArrowType: ArrowPrimitiveType<Native = Self>;
}

macro_rules! impl_element {
    ($t:ty, $dtype:ident) => {
        impl Element for $t {
            const DTYPE: Dtype = Dtype::$dtype;
        }
    };
    ($t:ty, $dtype:ident, $arrow_type:ty) => {
        impl_element!($t, $dtype);

        impl TensorElement for $t {
            type ArrowType = $arrow_type;
        }
    };
}

impl_element!(i8, Int8, Int8Type);
impl_element!(i16, Int16, Int16Type);
impl_element!(i32, Int32, Int32Type);
impl_element!(i64, Int64, Int64Type);
impl_element!(u8, UInt8, UInt8Type);
impl_element!(u16, UInt16, UInt16Type);
impl_element!(u32, UInt32, UInt32Type);
impl_element!(u64, UInt64, UInt64Type);
impl_element!(f16, Float16, Float16Type);
impl_element!(f32, Float32, Float32Type);
impl_element!(f64, Float64, Float64Type);
impl_element!(bf16, BFloat16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtype_arrow_round_trip() {
        for dtype in [
            Dtype::Int8,
            Dtype::UInt16,
            Dtype::Float16,
            Dtype::Float32,
            Dtype::Float64,
        ] {
            let data_type = dtype.to_arrow().unwrap();
            assert_eq!(Dtype::from_arrow(&data_type), Some(dtype));
        }
        assert_eq!(Dtype::BFloat16.to_arrow(), None);
        assert_eq!(Dtype::from_arrow(&DataType::Utf8), None);
    }

    #[test]
    fn dtype_display() {
        assert_eq!(Dtype::BFloat16.to_string(), "bfloat16");
        assert_eq!(<u8 as Element>::DTYPE.to_string(), "uint8");
        assert_eq!(bf16::DTYPE.size(), 2);
    }
}
