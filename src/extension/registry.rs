//! Reconstruction of extension types and arrays from tagged Arrow fields.

use std::{collections::HashMap, sync::Arc};

use arrow_array::{Array, ArrayRef};
use arrow_schema::{
    extension::{EXTENSION_TYPE_METADATA_KEY, EXTENSION_TYPE_NAME_KEY},
    DataType, Field,
};

use super::{
    BFloat16Array, BFloat16Type, EncodedImageArray, EncodedImageType, ExtensionClass,
    ExtensionError, ExtensionType, FixedShapeImageTensorArray, FixedShapeImageTensorType,
    ImageUriArray, ImageUriType,
};

/// An extension type plugin.
///
/// Plugins are submitted with [`inventory::submit`] and registered by [`init_registry`].
/// `create_fn` returns an exemplar of the extension type used to [deserialize](ExtensionType::deserialize) tagged columns.
#[derive(Debug)]
pub struct ExtensionTypePlugin {
    name: &'static str,
    create_fn: fn() -> Arc<dyn ExtensionType>,
}

inventory::collect!(ExtensionTypePlugin);

impl ExtensionTypePlugin {
    /// Create a new [`ExtensionTypePlugin`].
    pub const fn new(name: &'static str, create_fn: fn() -> Arc<dyn ExtensionType>) -> Self {
        Self { name, create_fn }
    }

    /// Returns the extension type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Create the exemplar extension type.
    #[must_use]
    pub fn create(&self) -> Arc<dyn ExtensionType> {
        (self.create_fn)()
    }
}

/// A table of extension types keyed by name.
#[derive(Debug, Default, Clone)]
pub struct ExtensionTypeRegistry {
    types: HashMap<&'static str, Arc<dyn ExtensionType>>,
}

/// Create a registry holding every [`ExtensionTypePlugin`] compiled into the program.
///
/// Only `lance.bfloat16` is submitted by this crate, the image extension types are registered on demand with [`ExtensionTypeRegistry::register`].
///
/// # Errors
/// Returns [`ExtensionError::RegistryConflict`] if two different plugins share a name.
pub fn init_registry() -> Result<ExtensionTypeRegistry, ExtensionError> {
    let mut registry = ExtensionTypeRegistry::new();
    for plugin in inventory::iter::<ExtensionTypePlugin> {
        registry.register(plugin.create())?;
    }
    Ok(registry)
}

impl ExtensionTypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension type under its name.
    ///
    /// Registering an extension type equal to the one already registered under the name is a no-op.
    ///
    /// # Errors
    /// Returns [`ExtensionError::RegistryConflict`] if a different extension type is registered under the name.
    pub fn register(
        &mut self,
        extension_type: Arc<dyn ExtensionType>,
    ) -> Result<(), ExtensionError> {
        let name = extension_type.name();
        match self.types.get(name) {
            Some(registered) if **registered == *extension_type => {
                log::debug!("extension type {name} is already registered");
                Ok(())
            }
            Some(_) => Err(ExtensionError::RegistryConflict(name.to_string())),
            None => {
                log::debug!("registered extension type {name}");
                self.types.insert(name, extension_type);
                Ok(())
            }
        }
    }

    /// Returns the extension type registered under `name`.
    ///
    /// # Errors
    /// Returns [`ExtensionError::UnknownExtensionType`] if no extension type is registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<&Arc<dyn ExtensionType>, ExtensionError> {
        self.types
            .get(name)
            .ok_or_else(|| ExtensionError::UnknownExtensionType(name.to_string()))
    }

    /// Returns true if an extension type is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Returns the registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.types.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered extension types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no extension types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Reconstruct the extension type registered under `name` from a storage type and serialized metadata.
    ///
    /// # Errors
    /// Returns [`ExtensionError::UnknownExtensionType`] if `name` is not registered,
    /// or the error of [`ExtensionType::deserialize`].
    pub fn deserialize(
        &self,
        name: &str,
        storage_type: &DataType,
        serialized: &[u8],
    ) -> Result<Arc<dyn ExtensionType>, ExtensionError> {
        self.lookup(name)?.deserialize(storage_type, serialized)
    }

    /// Wrap `storage` with the extension type tagged on `field`.
    ///
    /// A field without an extension name yields [`AnyExtensionArray::Storage`].
    ///
    /// # Errors
    /// Returns
    ///  - [`ExtensionError::TypeMismatch`] if the data types of `field` and `storage` differ,
    ///  - [`ExtensionError::UnknownExtensionType`] if the extension name is not registered, or
    ///  - the error of [`ExtensionType::deserialize`].
    pub fn wrap(
        &self,
        field: &Field,
        storage: ArrayRef,
    ) -> Result<AnyExtensionArray, ExtensionError> {
        let Some(name) = field.metadata().get(EXTENSION_TYPE_NAME_KEY) else {
            return Ok(AnyExtensionArray::Storage(storage));
        };
        if !field.data_type().equals_datatype(storage.data_type()) {
            return Err(ExtensionError::type_mismatch(
                name,
                field.data_type(),
                storage.data_type(),
            ));
        }
        let serialized = field
            .metadata()
            .get(EXTENSION_TYPE_METADATA_KEY)
            .map_or(&[][..], String::as_bytes);
        let extension_type = self.deserialize(name, storage.data_type(), serialized)?;
        AnyExtensionArray::from_storage(extension_type, storage)
    }
}

/// An extension array with its concrete array class resolved at runtime.
#[derive(Debug, Clone)]
pub enum AnyExtensionArray {
    /// An [`ImageUriArray`].
    ImageUri(ImageUriArray),
    /// An [`EncodedImageArray`].
    EncodedImage(EncodedImageArray),
    /// A [`FixedShapeImageTensorArray`].
    FixedShapeImageTensor(FixedShapeImageTensorArray),
    /// A [`BFloat16Array`].
    BFloat16(BFloat16Array),
    /// An extension type without a specialised array class.
    Other {
        /// The extension type.
        extension_type: Arc<dyn ExtensionType>,
        /// The storage array.
        storage: ArrayRef,
    },
    /// A storage array without an extension type.
    Storage(ArrayRef),
}

fn downcast<T: ExtensionType + Clone>(extension_type: &Arc<dyn ExtensionType>) -> Option<T> {
    extension_type.as_any().downcast_ref::<T>().cloned()
}

impl AnyExtensionArray {
    /// Wrap `storage` in the array class of `extension_type`.
    ///
    /// # Errors
    /// Returns [`ExtensionError::TypeMismatch`] if the data type of `storage` does not match the storage type of `extension_type`.
    pub fn from_storage(
        extension_type: Arc<dyn ExtensionType>,
        storage: ArrayRef,
    ) -> Result<Self, ExtensionError> {
        extension_type.supports_storage_type(storage.data_type())?;
        let wrapped = match extension_type.array_class() {
            ExtensionClass::ImageUri => downcast::<ImageUriType>(&extension_type)
                .map(|t| ImageUriArray::from_storage(t, storage.clone()).map(Self::ImageUri)),
            ExtensionClass::EncodedImage => {
                downcast::<EncodedImageType>(&extension_type).map(|t| {
                    EncodedImageArray::from_storage(t, storage.clone()).map(Self::EncodedImage)
                })
            }
            ExtensionClass::FixedShapeImageTensor => {
                downcast::<FixedShapeImageTensorType>(&extension_type).map(|t| {
                    FixedShapeImageTensorArray::from_storage(t, storage.clone())
                        .map(Self::FixedShapeImageTensor)
                })
            }
            ExtensionClass::BFloat16 => downcast::<BFloat16Type>(&extension_type)
                .map(|t| BFloat16Array::from_storage(t, storage.clone()).map(Self::BFloat16)),
            ExtensionClass::Storage => None,
        };
        wrapped.unwrap_or(Ok(Self::Other {
            extension_type,
            storage,
        }))
    }

    /// Returns the extension type name, or [`None`] for a storage array.
    #[must_use]
    pub fn extension_name(&self) -> Option<&'static str> {
        match self {
            Self::ImageUri(array) => Some(array.extension_type().name()),
            Self::EncodedImage(array) => Some(array.extension_type().name()),
            Self::FixedShapeImageTensor(array) => Some(array.extension_type().name()),
            Self::BFloat16(array) => Some(array.extension_type().name()),
            Self::Other { extension_type, .. } => Some(extension_type.name()),
            Self::Storage(_) => None,
        }
    }

    /// Returns the storage array.
    #[must_use]
    pub fn storage(&self) -> &ArrayRef {
        match self {
            Self::ImageUri(array) => array.storage(),
            Self::EncodedImage(array) => array.storage(),
            Self::FixedShapeImageTensor(array) => array.storage(),
            Self::BFloat16(array) => array.storage(),
            Self::Other { storage, .. } | Self::Storage(storage) => storage,
        }
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage().len()
    }

    /// Returns true if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage().is_empty()
    }
}
