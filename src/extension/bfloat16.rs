//! The `lance.bfloat16` extension type: brain floating point values stored as 2-byte fixed size binary.
//!
//! Values are stored little-endian.

use std::{any::Any, sync::Arc};

use arrow_array::{cast::AsArray, FixedSizeBinaryArray};
use arrow_buffer::Buffer;
use arrow_schema::DataType;
use half::bf16;
use ndarray::{Array1, ArrayView1, CowArray, Ix1};

use super::{
    Dtype, Element, ExtensionArray, ExtensionClass, ExtensionError, ExtensionScalar,
    ExtensionType, ExtensionTypePlugin,
};

const BFLOAT16_SIZE: i32 = 2;
const BFLOAT16_BYTES: usize = 2;

// Register the extension type.
inventory::submit! {
    ExtensionTypePlugin::new(BFloat16Type::NAME, create_bfloat16_type)
}

fn create_bfloat16_type() -> Arc<dyn ExtensionType> {
    Arc::new(BFloat16Type)
}

/// The `lance.bfloat16` extension type, layered on `FixedSizeBinary(2)` storage.
///
/// The metadata is empty, a non-empty payload is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BFloat16Type;

impl BFloat16Type {
    /// The extension type name.
    pub const NAME: &'static str = "lance.bfloat16";
}

impl ExtensionType for BFloat16Type {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn storage_type(&self) -> DataType {
        DataType::FixedSizeBinary(BFLOAT16_SIZE)
    }

    fn serialize(&self) -> Vec<u8> {
        Vec::new()
    }

    fn deserialize(
        &self,
        storage_type: &DataType,
        serialized: &[u8],
    ) -> Result<Arc<dyn ExtensionType>, ExtensionError> {
        self.supports_storage_type(storage_type)?;
        if serialized.is_empty() {
            Ok(Arc::new(Self))
        } else {
            Err(ExtensionError::Decode(format!(
                "{} does not accept metadata, got {} bytes",
                Self::NAME,
                serialized.len()
            )))
        }
    }

    fn array_class(&self) -> ExtensionClass {
        ExtensionClass::BFloat16
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An array of [`bf16`] values.
pub type BFloat16Array = ExtensionArray<BFloat16Type>;

/// A single [`bf16`] value.
pub type BFloat16Scalar<'a> = ExtensionScalar<'a, BFloat16Type>;

impl BFloat16Array {
    /// Create an array from a dense buffer of [`bf16`] without copying.
    ///
    /// The buffer of `array` becomes the storage buffer if `array` is in standard layout. The array has no nulls.
    ///
    /// # Errors
    /// Returns [`ExtensionError::IncompatibleDtype`] if the element type of `array` is not [`bf16`].
    pub fn from_ndarray<T: Element>(array: Array1<T>) -> Result<Self, ExtensionError> {
        if T::DTYPE != Dtype::BFloat16 {
            return Err(ExtensionError::IncompatibleDtype {
                expected: Dtype::BFloat16,
                found: T::DTYPE,
            });
        }
        let len = array.len();
        let array = if array.is_standard_layout() {
            array
        } else {
            array.as_standard_layout().into_owned()
        };
        let (values, offset) = array.into_raw_vec_and_offset();
        let mut values: Vec<u16> = bytemuck::allocation::try_cast_vec(values)
            .map_err(|(err, _)| ExtensionError::ZeroCopyUnavailable(err.to_string()))?;
        values.iter_mut().for_each(|value| *value = value.to_le());
        let buffer = Buffer::from_vec(values)
            .slice_with_length(offset.unwrap_or(0) * BFLOAT16_BYTES, len * BFLOAT16_BYTES);
        let storage = FixedSizeBinaryArray::try_new(BFLOAT16_SIZE, buffer, None)?;
        Self::from_storage(BFloat16Type, Arc::new(storage))
    }

    /// Create an array from optional [`bf16`] values, [`None`] is null.
    ///
    /// # Errors
    /// Returns an [`ExtensionError::Arrow`] if the storage array cannot be built.
    pub fn from_bf16<I>(values: I) -> Result<Self, ExtensionError>
    where
        I: IntoIterator<Item = Option<bf16>>,
    {
        let storage = FixedSizeBinaryArray::try_from_sparse_iter_with_size(
            values.into_iter().map(|value| value.map(bf16::to_le_bytes)),
            BFLOAT16_SIZE,
        )?;
        Self::from_storage(BFloat16Type, Arc::new(storage))
    }

    /// Create an array from optional [`f32`] values rounded to the nearest [`bf16`], [`None`] is null.
    ///
    /// # Errors
    /// Returns an [`ExtensionError::Arrow`] if the storage array cannot be built.
    pub fn from_f32_iter<I>(values: I) -> Result<Self, ExtensionError>
    where
        I: IntoIterator<Item = Option<f32>>,
    {
        Self::from_bf16(values.into_iter().map(|value| value.map(bf16::from_f32)))
    }

    /// Returns the storage array.
    #[must_use]
    pub fn values(&self) -> &FixedSizeBinaryArray {
        self.storage().as_fixed_size_binary()
    }

    /// Returns the value at `index`, or [`None`] if null or out of bounds.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<bf16> {
        self.scalar(index).and_then(|scalar| scalar.as_native())
    }

    /// Returns the values as a dense buffer.
    ///
    /// The storage buffer is reinterpreted without copying where possible.
    /// Otherwise the values are copied, unless `zero_copy_only` is set.
    ///
    /// # Errors
    /// Returns [`ExtensionError::NullValuesPresent`] if any value is null,
    /// or [`ExtensionError::ZeroCopyUnavailable`] if `zero_copy_only` is set and the storage buffer cannot be reinterpreted in place.
    pub fn to_ndarray(
        &self,
        zero_copy_only: bool,
    ) -> Result<CowArray<'_, bf16, Ix1>, ExtensionError> {
        let null_count = self.null_count();
        if null_count > 0 {
            return Err(ExtensionError::NullValuesPresent(null_count));
        }
        let bytes = self.values().value_data();
        let reinterpreted = if cfg!(target_endian = "little") {
            bytemuck::try_cast_slice::<u8, bf16>(bytes).map_err(|err| err.to_string())
        } else {
            Err("the storage buffer is little-endian".to_string())
        };
        match reinterpreted {
            Ok(values) => Ok(CowArray::from(ArrayView1::from(values))),
            Err(reason) if zero_copy_only => Err(ExtensionError::ZeroCopyUnavailable(reason)),
            Err(reason) => {
                log::trace!("copying bfloat16 values: {reason}");
                let values = bytes
                    .chunks_exact(BFLOAT16_BYTES)
                    .map(|bytes| bf16::from_le_bytes([bytes[0], bytes[1]]))
                    .collect::<Array1<_>>();
                Ok(CowArray::from(values))
            }
        }
    }
}

impl BFloat16Scalar<'_> {
    /// Returns the value, or [`None`] if null.
    #[must_use]
    pub fn as_native(&self) -> Option<bf16> {
        if self.is_null() {
            return None;
        }
        let bytes = self.storage().as_fixed_size_binary().value(self.index());
        <[u8; 2]>::try_from(bytes).ok().map(bf16::from_le_bytes)
    }
}
