//! The `lance.arrow.fixed_shape_image_tensor` extension type: a batch of decoded images with a fixed shape.

use std::{any::Any, sync::Arc};

use arrow_array::{
    cast::AsArray, ArrayRef, ArrowPrimitiveType, BinaryArray, FixedSizeListArray, PrimitiveArray,
};
use arrow_buffer::ScalarBuffer;
use arrow_schema::{DataType, Field, FieldRef};
use itertools::Itertools;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::codec::{default_image_encoder, DenseImage, ImageEncoder};

use super::{
    Dtype, EncodedImageArray, EncodedImageType, ExtensionArray, ExtensionClass, ExtensionError,
    ExtensionScalar, ExtensionType, TensorElement,
};

/// The serialized metadata of a [`FixedShapeImageTensorType`].
#[derive(Serialize, Deserialize)]
struct FixedShapeImageTensorMetadata {
    shape: Vec<usize>,
}

/// The `lance.arrow.fixed_shape_image_tensor` extension type.
///
/// The storage type is a `FixedSizeList` of a primitive value type with `prod(shape)` elements per image.
/// The shape excludes the leading batch dimension, for example `[height, width, channels]`.
///
/// ### Metadata
/// The shape is serialized as JSON, for example `{"shape":[32,32,3]}`.
/// The value type is recovered from the storage type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FixedShapeImageTensorType {
    value_type: DataType,
    shape: Vec<usize>,
    list_size: i32,
}

impl FixedShapeImageTensorType {
    /// The extension type name.
    pub const NAME: &'static str = "lance.arrow.fixed_shape_image_tensor";

    /// Create a new fixed shape image tensor type.
    ///
    /// # Errors
    /// Returns [`ExtensionError::InvalidInputType`] if `value_type` is not a primitive numeric type,
    /// or the number of elements in `shape` is zero or exceeds [`i32::MAX`].
    pub fn new(value_type: DataType, shape: Vec<usize>) -> Result<Self, ExtensionError> {
        if Dtype::from_arrow(&value_type).is_none() {
            return Err(ExtensionError::InvalidInputType(format!(
                "{value_type} is not a supported tensor value type"
            )));
        }
        let list_size = shape
            .iter()
            .try_fold(1usize, |size, &dim| size.checked_mul(dim))
            .and_then(|size| i32::try_from(size).ok())
            .filter(|&size| size > 0)
            .ok_or_else(|| {
                ExtensionError::InvalidInputType(format!(
                    "shape [{}] is not a valid image shape",
                    shape.iter().join(", ")
                ))
            })?;
        Ok(Self {
            value_type,
            shape,
            list_size,
        })
    }

    /// Returns the value type.
    #[must_use]
    pub fn value_type(&self) -> &DataType {
        &self.value_type
    }

    /// Returns the element type of the value type.
    #[must_use]
    pub fn dtype(&self) -> Dtype {
        // value_type is validated by new
        Dtype::from_arrow(&self.value_type).unwrap_or(Dtype::UInt8)
    }

    /// Returns the shape of each image.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of elements of each image.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn list_size(&self) -> usize {
        self.list_size as usize
    }

    fn item_field(&self) -> FieldRef {
        Arc::new(Field::new("item", self.value_type.clone(), true))
    }
}

impl ExtensionType for FixedShapeImageTensorType {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn storage_type(&self) -> DataType {
        DataType::FixedSizeList(self.item_field(), self.list_size)
    }

    fn serialize(&self) -> Vec<u8> {
        serde_json::to_vec(&FixedShapeImageTensorMetadata {
            shape: self.shape.clone(),
        })
        .unwrap_or_default()
    }

    fn deserialize(
        &self,
        storage_type: &DataType,
        serialized: &[u8],
    ) -> Result<Arc<dyn ExtensionType>, ExtensionError> {
        let DataType::FixedSizeList(field, list_size) = storage_type else {
            return Err(ExtensionError::type_mismatch(
                Self::NAME,
                "FixedSizeList",
                storage_type,
            ));
        };
        if Dtype::from_arrow(field.data_type()).is_none() {
            return Err(ExtensionError::type_mismatch(
                Self::NAME,
                "FixedSizeList of a primitive numeric type",
                storage_type,
            ));
        }
        let list_size = usize::try_from(*list_size)
            .map_err(|_| ExtensionError::Decode(format!("invalid list size {list_size}")))?;
        let shape = if serialized.is_empty() {
            vec![list_size]
        } else {
            serde_json::from_slice::<FixedShapeImageTensorMetadata>(serialized)
                .map_err(|err| ExtensionError::Decode(err.to_string()))?
                .shape
        };
        if shape.iter().product::<usize>() != list_size {
            return Err(ExtensionError::Decode(format!(
                "shape [{}] does not match the list size {list_size}",
                shape.iter().join(", ")
            )));
        }
        let extension_type = Self::new(field.data_type().clone(), shape)
            .map_err(|err| ExtensionError::Decode(err.to_string()))?;
        extension_type.supports_storage_type(storage_type)?;
        Ok(Arc::new(extension_type))
    }

    fn array_class(&self) -> ExtensionClass {
        ExtensionClass::FixedShapeImageTensor
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An array of fixed shape image tensors.
pub type FixedShapeImageTensorArray = ExtensionArray<FixedShapeImageTensorType>;

/// A single fixed shape image tensor.
pub type FixedShapeImageTensorScalar<'a> = ExtensionScalar<'a, FixedShapeImageTensorType>;

impl FixedShapeImageTensorArray {
    /// Create a tensor array from a dense array with a leading batch dimension.
    ///
    /// The value type and shape are derived from the element type and the trailing dimensions of `array`.
    /// The buffer of `array` becomes the storage values buffer without copying if `array` is in standard layout.
    ///
    /// # Errors
    /// Returns [`ExtensionError::InvalidInputType`] if `array` has no dimensions or images with zero elements.
    pub fn from_ndarray<T: TensorElement>(array: ArrayD<T>) -> Result<Self, ExtensionError> {
        let Some((_batch, shape)) = array.shape().split_first() else {
            return Err(ExtensionError::InvalidInputType(
                "a tensor array requires a leading batch dimension".to_string(),
            ));
        };
        let extension_type = FixedShapeImageTensorType::new(
            <T::ArrowType as ArrowPrimitiveType>::DATA_TYPE,
            shape.to_vec(),
        )?;

        let len = array.len();
        let array = if array.is_standard_layout() {
            array
        } else {
            array.as_standard_layout().into_owned()
        };
        let (values, offset) = array.into_raw_vec_and_offset();
        let values = ScalarBuffer::from(values).slice(offset.unwrap_or(0), len);
        let values = PrimitiveArray::<T::ArrowType>::new(values, None);
        let storage = FixedSizeListArray::try_new(
            extension_type.item_field(),
            extension_type.list_size,
            Arc::new(values),
            None,
        )?;
        Self::from_storage(extension_type, Arc::new(storage))
    }

    /// Create a tensor array from a stack of decoded images.
    ///
    /// # Errors
    /// See [`FixedShapeImageTensorArray::from_ndarray`].
    pub fn from_dense(images: DenseImage) -> Result<Self, ExtensionError> {
        match images {
            DenseImage::UInt8(array) => Self::from_ndarray(array),
            DenseImage::UInt16(array) => Self::from_ndarray(array),
            DenseImage::Float32(array) => Self::from_ndarray(array),
        }
    }

    fn values_view<T: TensorElement>(&self) -> Result<ArrayViewD<'_, T>, ExtensionError> {
        let found = self.extension_type().dtype();
        if found != T::DTYPE {
            return Err(ExtensionError::IncompatibleDtype {
                expected: T::DTYPE,
                found,
            });
        }
        let values = self
            .storage()
            .as_fixed_size_list()
            .values()
            .as_primitive::<T::ArrowType>();
        let mut shape = vec![self.len()];
        shape.extend_from_slice(self.extension_type().shape());
        let values = values
            .values()
            .get(..self.len() * self.extension_type().list_size())
            .ok_or_else(|| {
                ExtensionError::ShapeMismatch("tensor values are shorter than the array".to_string())
            })?;
        Ok(ArrayViewD::from_shape(IxDyn(&shape), values)?)
    }

    fn check_no_nulls(&self) -> Result<(), ExtensionError> {
        match self.null_count() {
            0 => Ok(()),
            null_count => Err(ExtensionError::NullValuesPresent(null_count)),
        }
    }

    /// Returns a zero-copy view of the tensors with shape `[len, ..shape]`.
    ///
    /// # Errors
    /// Returns [`ExtensionError::IncompatibleDtype`] if `T` is not the element type of the array,
    /// or [`ExtensionError::NullValuesPresent`] if any tensor is null.
    pub fn to_ndarray_view<T: TensorElement>(&self) -> Result<ArrayViewD<'_, T>, ExtensionError> {
        self.check_no_nulls()?;
        self.values_view()
    }

    /// Returns a copy of the tensors with shape `[len, ..shape]`.
    ///
    /// # Errors
    /// See [`FixedShapeImageTensorArray::to_ndarray_view`].
    pub fn to_ndarray<T: TensorElement>(&self) -> Result<ArrayD<T>, ExtensionError> {
        Ok(self.to_ndarray_view()?.to_owned())
    }

    fn values_dense(&self) -> Result<DenseImage, ExtensionError> {
        match self.extension_type().dtype() {
            Dtype::UInt8 => Ok(DenseImage::UInt8(self.values_view()?.to_owned())),
            Dtype::UInt16 => Ok(DenseImage::UInt16(self.values_view()?.to_owned())),
            Dtype::Float32 => Ok(DenseImage::Float32(self.values_view()?.to_owned())),
            found => Err(ExtensionError::IncompatibleDtype {
                expected: Dtype::UInt8,
                found,
            }),
        }
    }

    /// Returns a copy of the tensors as a stack of decoded images.
    ///
    /// # Errors
    /// Returns [`ExtensionError::IncompatibleDtype`] if the element type is not `uint8`, `uint16`, or `float32`,
    /// or [`ExtensionError::NullValuesPresent`] if any tensor is null.
    pub fn to_dense(&self) -> Result<DenseImage, ExtensionError> {
        self.check_no_nulls()?;
        self.values_dense()
    }

    /// Encode each image into an encoded image array with the same length.
    ///
    /// Null tensors produce null images.
    /// If `encoder` is [`None`], the [default image encoder](crate::codec::default_image_encoder) is used.
    ///
    /// # Errors
    /// Returns [`ExtensionError::IncompatibleDtype`] if the element type is not `uint8`, `uint16`, or `float32`,
    /// or [`ExtensionError::Encode`] if an image cannot be encoded.
    pub fn to_encoded(
        &self,
        encoder: Option<&dyn ImageEncoder>,
    ) -> Result<EncodedImageArray, ExtensionError> {
        let default_encoder;
        let encoder = match encoder {
            Some(encoder) => encoder,
            None => {
                default_encoder = default_image_encoder()?;
                default_encoder.as_ref()
            }
        };
        let images = self.values_dense()?;
        let encoded = (0..self.len())
            .map(|index| {
                if self.is_null(index) {
                    Ok(None)
                } else {
                    encoder.encode(&images.index_axis(index)).map(Some)
                }
            })
            .collect::<Result<Vec<_>, ExtensionError>>()?;
        let encoded: ArrayRef = Arc::new(encoded.into_iter().collect::<BinaryArray>());
        EncodedImageArray::from_storage(EncodedImageType, encoded)
    }
}

impl FixedShapeImageTensorScalar<'_> {
    /// Returns the flattened values of the tensor, or [`None`] if null.
    #[must_use]
    pub fn as_native(&self) -> Option<ArrayRef> {
        (!self.is_null()).then(|| self.storage().as_fixed_size_list().value(self.index()))
    }
}

#[cfg(test)]
mod tests {
    use arrow_array::{types::UInt8Type, Array};
    use ndarray::{array, s};

    use super::*;

    #[test]
    fn tensor_type_metadata() {
        let tensor = FixedShapeImageTensorType::new(DataType::UInt16, vec![4, 2, 3]).unwrap();
        assert_eq!(tensor.list_size(), 24);
        assert_eq!(tensor.dtype(), Dtype::UInt16);
        assert_eq!(tensor.serialize(), br#"{"shape":[4,2,3]}"#);
        let deserialized = tensor
            .deserialize(&tensor.storage_type(), &tensor.serialize())
            .unwrap();
        assert_eq!(
            deserialized.as_any().downcast_ref::<FixedShapeImageTensorType>(),
            Some(&tensor)
        );

        let flat = tensor.deserialize(&tensor.storage_type(), b"").unwrap();
        let flat = flat.as_any().downcast_ref::<FixedShapeImageTensorType>().unwrap();
        assert_eq!(flat.shape(), [24]);
    }

    #[test]
    fn tensor_type_invalid() {
        assert!(FixedShapeImageTensorType::new(DataType::Utf8, vec![1]).is_err());
        assert!(FixedShapeImageTensorType::new(DataType::UInt8, vec![2, 0]).is_err());

        let tensor = FixedShapeImageTensorType::new(DataType::UInt8, vec![2, 2]).unwrap();
        assert!(matches!(
            tensor.deserialize(&tensor.storage_type(), br#"{"shape":[3]}"#),
            Err(ExtensionError::Decode(_))
        ));
        assert!(matches!(
            tensor.deserialize(&tensor.storage_type(), b"{"),
            Err(ExtensionError::Decode(_))
        ));
        assert!(matches!(
            tensor.deserialize(&DataType::Binary, b""),
            Err(ExtensionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn tensor_from_ndarray_zero_copy() {
        let images = ArrayD::from_shape_vec(IxDyn(&[2, 2, 3]), (0u8..12).collect()).unwrap();
        let expected = images.clone();
        let pointer = images.as_ptr();
        let array = FixedShapeImageTensorArray::from_ndarray(images).unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array.extension_type().shape(), [2, 3]);
        assert_eq!(array.extension_type().value_type(), &DataType::UInt8);

        let values = array
            .storage()
            .as_fixed_size_list()
            .values()
            .as_primitive::<UInt8Type>()
            .values()
            .as_ptr();
        assert_eq!(pointer, values);
        assert_eq!(array.to_ndarray_view::<u8>().unwrap(), expected.view());

        let scalar = array.scalar(1).unwrap().as_native().unwrap();
        assert_eq!(scalar.len(), 6);
    }

    #[test]
    fn tensor_from_ndarray_non_standard_layout() {
        let images = array![[[1u16, 2], [3, 4]], [[5, 6], [7, 8]]].into_dyn();
        let transposed = images.clone().reversed_axes();
        let array = FixedShapeImageTensorArray::from_ndarray(transposed.clone()).unwrap();
        assert_eq!(array.to_ndarray::<u16>().unwrap(), transposed);

        let sliced = images.slice_move(s![1.., .., ..]).into_dyn();
        let array = FixedShapeImageTensorArray::from_ndarray(sliced.clone()).unwrap();
        assert_eq!(array.to_ndarray::<u16>().unwrap(), sliced);
    }

    #[test]
    fn tensor_to_ndarray_dtype() {
        let images = ArrayD::<f32>::zeros(IxDyn(&[1, 2, 2, 1]));
        let array = FixedShapeImageTensorArray::from_ndarray(images).unwrap();
        assert!(matches!(
            array.to_ndarray::<u8>(),
            Err(ExtensionError::IncompatibleDtype {
                expected: Dtype::UInt8,
                found: Dtype::Float32
            })
        ));
        assert_eq!(array.to_dense().unwrap().dtype(), Dtype::Float32);
    }

    #[test]
    fn tensor_from_ndarray_invalid() {
        let scalar = ArrayD::<u8>::zeros(IxDyn(&[]));
        assert!(matches!(
            FixedShapeImageTensorArray::from_ndarray(scalar),
            Err(ExtensionError::InvalidInputType(_))
        ));
    }

    #[test]
    fn tensor_to_encoded_with_encoder() {
        let images =
            ArrayD::from_shape_vec(IxDyn(&[3, 1, 2, 1]), vec![1u8, 2, 3, 4, 5, 6]).unwrap();
        let array = FixedShapeImageTensorArray::from_ndarray(images).unwrap();
        let encoder = |image: &DenseImage| -> Result<Vec<u8>, ExtensionError> {
            match image {
                DenseImage::UInt8(array) => Ok(array.iter().copied().collect()),
                _ => Err(ExtensionError::Encode("unsupported".to_string())),
            }
        };
        let encoded = array.to_encoded(Some(&encoder)).unwrap();
        assert_eq!(encoded.len(), 3);
        let blobs: Vec<_> = encoded.iter().map(|image| image.as_native()).collect();
        assert_eq!(
            blobs,
            vec![
                Some([1u8, 2].as_slice()),
                Some([3, 4].as_slice()),
                Some([5, 6].as_slice())
            ]
        );
    }

    #[cfg(not(feature = "image"))]
    #[test]
    fn tensor_to_encoded_without_encoder() {
        let images = ArrayD::from_shape_vec(IxDyn(&[1, 1, 1, 1]), vec![7u8]).unwrap();
        let array = FixedShapeImageTensorArray::from_ndarray(images).unwrap();
        assert!(matches!(
            array.to_encoded(None),
            Err(ExtensionError::Encode(_))
        ));
    }
}
