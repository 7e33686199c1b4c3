use std::sync::Arc;

use arrow_array::{Array, ArrayRef, BooleanArray};
use arrow_schema::Field;

use super::{extension_field, ExtensionError, ExtensionType};

/// An Arrow storage array bound to an extension type.
///
/// The storage type of the array matches [`ExtensionType::storage_type`], this is validated on construction.
/// Arrays are immutable views over reference counted Arrow buffers, so cloning and slicing do not copy data.
#[derive(Debug, Clone)]
pub struct ExtensionArray<T: ExtensionType> {
    extension_type: T,
    storage: ArrayRef,
}

impl<T: ExtensionType + Clone> ExtensionArray<T> {
    /// Wrap `storage` with `extension_type`.
    ///
    /// # Errors
    /// Returns [`ExtensionError::TypeMismatch`] if the data type of `storage` does not match the storage type of `extension_type`.
    pub fn from_storage(extension_type: T, storage: ArrayRef) -> Result<Self, ExtensionError> {
        extension_type.supports_storage_type(storage.data_type())?;
        Ok(Self {
            extension_type,
            storage,
        })
    }

    /// Returns the extension type.
    #[must_use]
    pub fn extension_type(&self) -> &T {
        &self.extension_type
    }

    /// Returns the storage array.
    #[must_use]
    pub fn storage(&self) -> &ArrayRef {
        &self.storage
    }

    /// Consume the array and return the storage array.
    #[must_use]
    pub fn into_storage(self) -> ArrayRef {
        self.storage
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns true if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Returns the number of null elements.
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.storage.null_count()
    }

    /// Returns true if the element at `index` is null.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        self.storage.is_null(index)
    }

    /// Returns a zero-copy slice of `length` elements starting at `offset`.
    ///
    /// # Panics
    /// Panics if `offset + length > self.len()`.
    #[must_use]
    pub fn slice(&self, offset: usize, length: usize) -> Self {
        Self {
            extension_type: self.extension_type.clone(),
            storage: self.storage.slice(offset, length),
        }
    }

    /// Returns the elements where `mask` is true, preserving order.
    ///
    /// # Errors
    /// Returns [`ExtensionError::ShapeMismatch`] if the mask length differs from the array length.
    pub fn filter(&self, mask: &BooleanArray) -> Result<Self, ExtensionError> {
        if mask.len() != self.len() {
            return Err(ExtensionError::ShapeMismatch(format!(
                "mask length {} does not match array length {}",
                mask.len(),
                self.len()
            )));
        }
        let storage = arrow_select::filter::filter(self.storage.as_ref(), mask)?;
        Ok(Self {
            extension_type: self.extension_type.clone(),
            storage,
        })
    }

    /// Returns a scalar view of the element at `index`, or [`None`] if `index` is out of bounds.
    #[must_use]
    pub fn scalar(&self, index: usize) -> Option<ExtensionScalar<'_, T>> {
        (index < self.len()).then_some(ExtensionScalar { array: self, index })
    }

    /// Returns an iterator over scalar views of the elements.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = ExtensionScalar<'_, T>> + '_ {
        (0..self.len()).map(move |index| ExtensionScalar { array: self, index })
    }

    /// Returns an Arrow [`Field`] for this array tagged with the extension type.
    #[must_use]
    pub fn field(&self, name: &str) -> Field {
        extension_field(name, &self.extension_type, self.null_count() > 0)
    }

    /// Erase the concrete extension type.
    #[must_use]
    pub fn into_dyn(self) -> (Arc<dyn ExtensionType>, ArrayRef) {
        (Arc::new(self.extension_type), self.storage)
    }
}

impl<T: ExtensionType + PartialEq> PartialEq for ExtensionArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.extension_type == other.extension_type
            && self.storage.as_ref() == other.storage.as_ref()
    }
}

/// A read-only view of one element of an [`ExtensionArray`].
#[derive(Debug)]
pub struct ExtensionScalar<'a, T: ExtensionType> {
    array: &'a ExtensionArray<T>,
    index: usize,
}

impl<T: ExtensionType> Clone for ExtensionScalar<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ExtensionType> Copy for ExtensionScalar<'_, T> {}

impl<'a, T: ExtensionType + Clone> ExtensionScalar<'a, T> {
    /// Returns the extension type.
    #[must_use]
    pub fn extension_type(&self) -> &'a T {
        &self.array.extension_type
    }

    /// Returns the storage array the scalar views.
    #[must_use]
    pub fn storage(&self) -> &'a ArrayRef {
        &self.array.storage
    }

    /// Returns the element index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns true if the element is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.array.storage.is_null(self.index)
    }

    /// Returns the element as a single element storage array.
    #[must_use]
    pub fn value(&self) -> ArrayRef {
        self.array.storage.slice(self.index, 1)
    }
}
