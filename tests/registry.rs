#![allow(missing_docs)]

use std::{error::Error, sync::Arc};

use arrow_array::{ArrayRef, BinaryArray, StringArray};
use arrow_schema::DataType;
use lance_arrow::extension::{
    extension_field, init_registry, AnyExtensionArray, BFloat16Type, EncodedImageType,
    ExtensionError, ExtensionType, FixedShapeImageTensorArray, FixedShapeImageTensorType,
    ImageUriType,
};

fn extension_types() -> Result<Vec<Arc<dyn ExtensionType>>, ExtensionError> {
    Ok(vec![
        Arc::new(ImageUriType),
        Arc::new(EncodedImageType),
        Arc::new(FixedShapeImageTensorType::new(DataType::UInt8, vec![8, 8, 3])?),
        Arc::new(FixedShapeImageTensorType::new(DataType::Float32, vec![4])?),
        Arc::new(BFloat16Type),
    ])
}

#[test]
fn registry_deserialize_round_trip() -> Result<(), Box<dyn Error>> {
    let mut registry = init_registry()?;
    registry.register(Arc::new(ImageUriType))?;
    registry.register(Arc::new(EncodedImageType))?;
    registry.register(Arc::new(FixedShapeImageTensorType::new(
        DataType::UInt8,
        vec![1],
    )?))?;
    for extension_type in extension_types()? {
        let deserialized = registry.deserialize(
            extension_type.name(),
            &extension_type.storage_type(),
            &extension_type.serialize(),
        )?;
        assert!(*deserialized == *extension_type, "{extension_type:?}");
    }
    Ok(())
}

#[test]
fn registry_register_idempotent() -> Result<(), Box<dyn Error>> {
    let mut registry = init_registry()?;
    let registered = registry.len();
    registry.register(Arc::new(BFloat16Type))?;
    assert_eq!(registry.len(), registered);

    let tensor = Arc::new(FixedShapeImageTensorType::new(DataType::UInt8, vec![2, 2])?);
    registry.register(tensor.clone())?;
    registry.register(tensor)?;
    let conflicting = Arc::new(FixedShapeImageTensorType::new(DataType::UInt8, vec![4])?);
    assert!(matches!(
        registry.register(conflicting),
        Err(ExtensionError::RegistryConflict(_))
    ));
    Ok(())
}

#[test]
fn registry_unknown_extension_type() -> Result<(), Box<dyn Error>> {
    let registry = init_registry()?;
    let field = extension_field("uris", &ImageUriType, true);
    let storage: ArrayRef = Arc::new(StringArray::from(vec!["a.png"]));
    assert!(matches!(
        registry.wrap(&field, storage),
        Err(ExtensionError::UnknownExtensionType(name)) if name == ImageUriType::NAME
    ));
    Ok(())
}

#[test]
fn registry_wrap_tensor_field() -> Result<(), Box<dyn Error>> {
    let mut registry = init_registry()?;
    let exemplar = FixedShapeImageTensorType::new(DataType::UInt8, vec![1])?;
    registry.register(Arc::new(exemplar))?;

    let images = ndarray::ArrayD::from_shape_vec(vec![2, 2, 2, 1], (0u8..8).collect())?;
    let array = FixedShapeImageTensorArray::from_ndarray(images)?;
    let field = array.field("images");
    let (_, storage) = array.clone().into_dyn();

    let AnyExtensionArray::FixedShapeImageTensor(wrapped) = registry.wrap(&field, storage)? else {
        panic!("expected a tensor array");
    };
    assert_eq!(wrapped.extension_type().shape(), [2, 2, 1]);
    assert_eq!(wrapped, array);

    let encoded = extension_field("images", &EncodedImageType, false);
    let storage: ArrayRef = Arc::new(BinaryArray::from_vec(vec![b"png".as_slice()]));
    assert!(registry.wrap(&encoded, storage).is_err());
    Ok(())
}
