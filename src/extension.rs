//! Logical extension types layered over Arrow storage types.
//!
//! An [`ExtensionType`] pairs a unique name with the exact Arrow storage type it is layered on and a metadata serialization contract.
//! An [`ExtensionArray`] binds a validated storage array to its extension type, and an [`ExtensionScalar`] is a read-only view of one element.
//!
//! The extension types of this crate are:
//!
//! | Extension type                  | Name                                   | Storage type                  |
//! |---------------------------------|----------------------------------------|-------------------------------|
//! | [`ImageUriType`]                | `lance.arrow.image_uri`                | `Utf8`                        |
//! | [`EncodedImageType`]            | `lance.arrow.encoded_image`            | `Binary`                      |
//! | [`FixedShapeImageTensorType`]   | `lance.arrow.fixed_shape_image_tensor` | `FixedSizeList<T>(prod(shape))` |
//! | [`BFloat16Type`]                | `lance.bfloat16`                       | `FixedSizeBinary(2)`          |
//!
//! Conversions flow from URIs to encoded bytes to decoded tensors and back to encoded bytes:
//! [`ImageUriArray::read_uris`] → [`EncodedImageArray::image_to_tensor`] → [`FixedShapeImageTensorArray::to_encoded`].
//!
//! Extension identity travels with an Arrow [`Field`] (see [`extension_field`]) and is reconstructed with an [`ExtensionTypeRegistry`].

mod bfloat16;
mod element;
mod encoded_image;
mod extension_array;
mod extension_errors;
mod fixed_shape_image_tensor;
mod image_uri;
mod registry;

pub use bfloat16::{BFloat16Array, BFloat16Scalar, BFloat16Type};
pub use element::{Dtype, Element, TensorElement};
pub use encoded_image::{EncodedImageArray, EncodedImageScalar, EncodedImageType};
pub use extension_array::{ExtensionArray, ExtensionScalar};
pub use extension_errors::ExtensionError;
pub use fixed_shape_image_tensor::{
    FixedShapeImageTensorArray, FixedShapeImageTensorScalar, FixedShapeImageTensorType,
};
pub use image_uri::{ImageUriArray, ImageUriScalar, ImageUriType};
pub use registry::{init_registry, AnyExtensionArray, ExtensionTypePlugin, ExtensionTypeRegistry};

use std::{any::Any, collections::HashMap, fmt::Debug, sync::Arc};

use arrow_schema::{
    extension::{EXTENSION_TYPE_METADATA_KEY, EXTENSION_TYPE_NAME_KEY},
    DataType, Field,
};

/// The wrapper used to present the values of an extension type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionClass {
    /// [`ImageUriArray`] and [`ImageUriScalar`].
    ImageUri,
    /// [`EncodedImageArray`] and [`EncodedImageScalar`].
    EncodedImage,
    /// [`FixedShapeImageTensorArray`] and [`FixedShapeImageTensorScalar`].
    FixedShapeImageTensor,
    /// [`BFloat16Array`] and [`BFloat16Scalar`].
    BFloat16,
    /// No specialised wrapper, values are presented as the storage array.
    Storage,
}

/// Traits for a logical extension type.
///
/// Two extension types with the same name, storage type, and serialized metadata are interchangeable.
/// [`ExtensionType::deserialize`] is the left inverse of [`ExtensionType::serialize`]:
/// `t.deserialize(&t.storage_type(), &t.serialize())` reconstructs an extension type equal to `t`.
pub trait ExtensionType: Debug + Send + Sync + 'static {
    /// The globally unique name of the extension type.
    fn name(&self) -> &'static str;

    /// The exact Arrow storage type the extension type is layered on.
    fn storage_type(&self) -> DataType;

    /// Serialize the parameters of the extension type.
    ///
    /// Parameterless extension types return an empty payload.
    fn serialize(&self) -> Vec<u8>;

    /// Reconstruct an extension type of this kind from a storage type and a serialized payload.
    ///
    /// # Errors
    /// Returns [`ExtensionError::TypeMismatch`] if `storage_type` is incompatible with this kind of extension type,
    /// or [`ExtensionError::Decode`] if `serialized` is malformed.
    fn deserialize(
        &self,
        storage_type: &DataType,
        serialized: &[u8],
    ) -> Result<Arc<dyn ExtensionType>, ExtensionError>;

    /// The wrapper used to present arrays of this extension type.
    fn array_class(&self) -> ExtensionClass;

    /// The wrapper used to present scalars of this extension type.
    fn scalar_class(&self) -> ExtensionClass {
        self.array_class()
    }

    /// Check that `storage_type` exactly matches the storage type of this extension type.
    ///
    /// Child field names are not compared.
    ///
    /// # Errors
    /// Returns [`ExtensionError::TypeMismatch`] if the storage types differ.
    fn supports_storage_type(&self, storage_type: &DataType) -> Result<(), ExtensionError> {
        let expected = self.storage_type();
        if expected.equals_datatype(storage_type) {
            Ok(())
        } else {
            Err(ExtensionError::type_mismatch(
                self.name(),
                expected,
                storage_type,
            ))
        }
    }

    /// Returns `self` as [`Any`] for downcasting to the concrete extension type.
    fn as_any(&self) -> &dyn Any;
}

impl PartialEq for dyn ExtensionType {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
            && self.serialize() == other.serialize()
            && self.storage_type().equals_datatype(&other.storage_type())
    }
}

impl Eq for dyn ExtensionType {}

/// Create an Arrow [`Field`] with the storage type of `extension_type`, tagged with its name and serialized metadata.
#[must_use]
pub fn extension_field(name: &str, extension_type: &dyn ExtensionType, nullable: bool) -> Field {
    let mut metadata = HashMap::from([(
        EXTENSION_TYPE_NAME_KEY.to_string(),
        extension_type.name().to_string(),
    )]);
    let serialized = extension_type.serialize();
    if !serialized.is_empty() {
        metadata.insert(
            EXTENSION_TYPE_METADATA_KEY.to_string(),
            String::from_utf8_lossy(&serialized).into_owned(),
        );
    }
    Field::new(name, extension_type.storage_type(), nullable).with_metadata(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_field_metadata() {
        let field = extension_field("bf16", &BFloat16Type, true);
        assert_eq!(field.data_type(), &DataType::FixedSizeBinary(2));
        assert_eq!(
            field.metadata().get(EXTENSION_TYPE_NAME_KEY).map(String::as_str),
            Some("lance.bfloat16")
        );
        assert!(!field.metadata().contains_key(EXTENSION_TYPE_METADATA_KEY));

        let tensor = FixedShapeImageTensorType::new(DataType::UInt8, vec![2, 2, 3]).unwrap();
        let field = extension_field("tensor", &tensor, false);
        assert_eq!(
            field.metadata().get(EXTENSION_TYPE_METADATA_KEY).map(String::as_str),
            Some(r#"{"shape":[2,2,3]}"#)
        );
    }

    #[test]
    fn extension_type_equality() {
        let a: Arc<dyn ExtensionType> = Arc::new(ImageUriType);
        let b: Arc<dyn ExtensionType> = Arc::new(ImageUriType);
        let c: Arc<dyn ExtensionType> = Arc::new(EncodedImageType);
        assert!(*a == *b);
        assert!(*a != *c);

        let t1: Arc<dyn ExtensionType> =
            Arc::new(FixedShapeImageTensorType::new(DataType::UInt8, vec![1, 4]).unwrap());
        let t2: Arc<dyn ExtensionType> =
            Arc::new(FixedShapeImageTensorType::new(DataType::UInt8, vec![4]).unwrap());
        assert!(*t1 != *t2);
    }

    #[test]
    fn supports_storage_type() {
        assert!(ImageUriType.supports_storage_type(&DataType::Utf8).is_ok());
        assert!(matches!(
            ImageUriType.supports_storage_type(&DataType::Binary),
            Err(ExtensionError::TypeMismatch { .. })
        ));
        assert!(BFloat16Type
            .supports_storage_type(&DataType::FixedSizeBinary(4))
            .is_err());
    }
}
