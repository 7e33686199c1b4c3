//! The `lance.arrow.encoded_image` extension type: encoded image bytes such as PNG or JPEG.

use std::{any::Any, sync::Arc};

use arrow_array::{cast::AsArray, BinaryArray};
use arrow_schema::DataType;

use crate::codec::{probe_image_decoder, stack_images, ImageDecoder};

use super::{
    ExtensionArray, ExtensionClass, ExtensionError, ExtensionScalar, ExtensionType,
    FixedShapeImageTensorArray,
};

/// The `lance.arrow.encoded_image` extension type, layered on `Binary` storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EncodedImageType;

impl EncodedImageType {
    /// The extension type name.
    pub const NAME: &'static str = "lance.arrow.encoded_image";
}

impl ExtensionType for EncodedImageType {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn storage_type(&self) -> DataType {
        DataType::Binary
    }

    fn serialize(&self) -> Vec<u8> {
        Vec::new()
    }

    fn deserialize(
        &self,
        storage_type: &DataType,
        _serialized: &[u8],
    ) -> Result<Arc<dyn ExtensionType>, ExtensionError> {
        self.supports_storage_type(storage_type)?;
        Ok(Arc::new(Self))
    }

    fn array_class(&self) -> ExtensionClass {
        ExtensionClass::EncodedImage
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An array of encoded images.
pub type EncodedImageArray = ExtensionArray<EncodedImageType>;

/// A single encoded image.
pub type EncodedImageScalar<'a> = ExtensionScalar<'a, EncodedImageType>;

impl EncodedImageArray {
    /// Wrap a binary array of encoded images without copying.
    ///
    /// # Errors
    /// Infallible for a [`BinaryArray`], the result type is kept for symmetry with the other constructors.
    pub fn from_binary_array(images: BinaryArray) -> Result<Self, ExtensionError> {
        Self::from_storage(EncodedImageType, Arc::new(images))
    }

    /// Returns the encoded images.
    #[must_use]
    pub fn images(&self) -> &BinaryArray {
        self.storage().as_binary::<i32>()
    }

    /// Decode every image and stack them into a tensor array with a leading batch dimension.
    ///
    /// If `decoder` is [`None`], the first available decoder is selected with [`probe_image_decoder`].
    ///
    /// # Errors
    /// Returns
    ///  - [`ExtensionError::NoDecoderAvailable`] if no decoder is supplied and none is available,
    ///  - [`ExtensionError::Decode`] if an image is null or cannot be decoded, or
    ///  - [`ExtensionError::ShapeMismatch`] if the array is empty or the decoded images differ in shape or element type.
    pub fn image_to_tensor(
        &self,
        decoder: Option<&dyn ImageDecoder>,
    ) -> Result<FixedShapeImageTensorArray, ExtensionError> {
        let probed;
        let decoder = match decoder {
            Some(decoder) => decoder,
            None => {
                probed = probe_image_decoder()?;
                probed.as_ref()
            }
        };
        let images = self
            .images()
            .iter()
            .enumerate()
            .map(|(index, bytes)| {
                let bytes = bytes.ok_or_else(|| {
                    ExtensionError::Decode(format!("cannot decode null image at index {index}"))
                })?;
                decoder.decode(bytes)
            })
            .collect::<Result<Vec<_>, _>>()?;
        FixedShapeImageTensorArray::from_dense(stack_images(&images)?)
    }
}

impl<'a> EncodedImageScalar<'a> {
    /// Returns the encoded image bytes, or [`None`] if null.
    #[must_use]
    pub fn as_native(&self) -> Option<&'a [u8]> {
        let images = self.storage().as_binary::<i32>();
        (!self.is_null()).then(|| images.value(self.index()))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use crate::codec::DenseImage;

    use super::*;

    /// Decodes a blob into a 1x1 gray image holding its length.
    fn length_decoder(bytes: &[u8]) -> Result<DenseImage, ExtensionError> {
        let length =
            u8::try_from(bytes.len()).map_err(|err| ExtensionError::Decode(err.to_string()))?;
        Ok(DenseImage::UInt8(ArrayD::from_elem(IxDyn(&[1, 1, 1]), length)))
    }

    #[test]
    fn encoded_image_from_binary_array() {
        let images = BinaryArray::from_opt_vec(vec![Some(b"ab".as_slice()), None]);
        let array = EncodedImageArray::from_binary_array(images).unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array.extension_type().name(), EncodedImageType::NAME);
        assert_eq!(array.scalar(0).unwrap().as_native(), Some(b"ab".as_slice()));
        assert_eq!(array.scalar(1).unwrap().as_native(), None);
    }

    #[test]
    fn encoded_image_to_tensor_with_decoder() {
        let images = BinaryArray::from_vec(vec![b"a".as_slice(), b"abc".as_slice()]);
        let array = EncodedImageArray::from_binary_array(images).unwrap();
        let tensor = array.image_to_tensor(Some(&length_decoder)).unwrap();
        assert_eq!(tensor.len(), 2);
        assert_eq!(tensor.extension_type().shape(), [1, 1, 1]);
        let pixels = tensor.to_ndarray::<u8>().unwrap();
        assert_eq!(pixels.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn encoded_image_to_tensor_null() {
        let images = BinaryArray::from_opt_vec(vec![Some(b"a".as_slice()), None]);
        let array = EncodedImageArray::from_binary_array(images).unwrap();
        assert!(matches!(
            array.image_to_tensor(Some(&length_decoder)),
            Err(ExtensionError::Decode(_))
        ));
    }

    #[test]
    fn encoded_image_to_tensor_shape_mismatch() {
        let decoder = |bytes: &[u8]| -> Result<DenseImage, ExtensionError> {
            Ok(DenseImage::UInt8(ArrayD::zeros(IxDyn(&[bytes.len(), 1, 3]))))
        };
        let images = BinaryArray::from_vec(vec![b"a".as_slice(), b"ab".as_slice()]);
        let array = EncodedImageArray::from_binary_array(images).unwrap();
        assert!(matches!(
            array.image_to_tensor(Some(&decoder)),
            Err(ExtensionError::ShapeMismatch(_))
        ));
    }

    #[cfg(not(feature = "image"))]
    #[test]
    fn encoded_image_to_tensor_without_decoder() {
        let images = BinaryArray::from_vec(vec![b"a".as_slice()]);
        let array = EncodedImageArray::from_binary_array(images).unwrap();
        assert!(matches!(
            array.image_to_tensor(None),
            Err(ExtensionError::NoDecoderAvailable)
        ));
    }
}
