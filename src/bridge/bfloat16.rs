use arrow_array::{ArrayRef, BooleanArray};
use half::bf16;
use ndarray::{Array1, CowArray, Ix1};

use crate::extension::{BFloat16Array, BFloat16Type, Element, ExtensionError};

use super::{
    DtypeKind, TabularExtensionArray, TabularExtensionDtype, TabularIndexer, TabularItem,
};

/// The tabular dtype of `lance.bfloat16`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BFloat16Dtype;

impl TabularExtensionDtype for BFloat16Dtype {
    type Scalar = bf16;
    type Array = BFloat16Column;

    const KIND: DtypeKind = DtypeKind::Float;
    const NAME: &'static str = BFloat16Type::NAME;

    fn construct_from_string(string: &str) -> Result<Self, ExtensionError> {
        if string == Self::NAME {
            Ok(Self)
        } else {
            Err(ExtensionError::InvalidInputType(format!(
                "cannot construct a {} dtype from '{string}'",
                Self::NAME
            )))
        }
    }
}

/// A `lance.bfloat16` column of a tabular framework.
#[derive(Debug, Clone, PartialEq)]
pub struct BFloat16Column {
    array: BFloat16Array,
}

impl BFloat16Column {
    /// Create a column over `array`.
    #[must_use]
    pub fn new(array: BFloat16Array) -> Self {
        Self { array }
    }

    /// Create a column from a dense buffer of [`bf16`] without copying.
    ///
    /// # Errors
    /// Returns [`ExtensionError::IncompatibleDtype`] if the element type of `array` is not [`bf16`].
    pub fn from_numpy<T: Element>(array: Array1<T>) -> Result<Self, ExtensionError> {
        BFloat16Array::from_ndarray(array).map(Self::new)
    }

    /// Returns the underlying extension array.
    #[must_use]
    pub fn array(&self) -> &BFloat16Array {
        &self.array
    }

    /// Consume the column and return the underlying extension array.
    #[must_use]
    pub fn into_array(self) -> BFloat16Array {
        self.array
    }
}

impl From<BFloat16Array> for BFloat16Column {
    fn from(array: BFloat16Array) -> Self {
        Self::new(array)
    }
}

impl TabularExtensionArray for BFloat16Column {
    type Dtype = BFloat16Dtype;
    type Scalar = bf16;
    type Element = bf16;

    fn dtype(&self) -> BFloat16Dtype {
        BFloat16Dtype
    }

    fn from_sequence<I>(scalars: I) -> Result<Self, ExtensionError>
    where
        I: IntoIterator<Item = Option<bf16>>,
    {
        BFloat16Array::from_bf16(scalars).map(Self::new)
    }

    fn from_arrow(storage: ArrayRef) -> Result<Self, ExtensionError> {
        BFloat16Array::from_storage(BFloat16Type, storage).map(Self::new)
    }

    fn arrow_array(&self) -> ArrayRef {
        self.array.storage().clone()
    }

    fn len(&self) -> usize {
        self.array.len()
    }

    fn get_item(
        &self,
        indexer: TabularIndexer<'_>,
    ) -> Result<TabularItem<bf16, Self>, ExtensionError> {
        let len = self.len();
        match indexer {
            TabularIndexer::Position(index) => self
                .array
                .scalar(index)
                .map(|scalar| TabularItem::Scalar(scalar.as_native()))
                .ok_or(ExtensionError::IndexOutOfBounds { index, len }),
            TabularIndexer::Slice(range) => {
                if range.start > range.end || range.end > len {
                    return Err(ExtensionError::IndexOutOfBounds {
                        index: range.end,
                        len,
                    });
                }
                let array = self.array.slice(range.start, range.len());
                Ok(TabularItem::Array(Self::new(array)))
            }
            TabularIndexer::Mask(mask) => {
                let mask = BooleanArray::from(mask.to_vec());
                let array = self.array.filter(&mask)?;
                Ok(TabularItem::Array(Self::new(array)))
            }
        }
    }

    fn isna(&self) -> Array1<bool> {
        (0..self.len()).map(|index| self.array.is_null(index)).collect()
    }

    fn to_numpy(&self) -> Result<CowArray<'_, bf16, Ix1>, ExtensionError> {
        self.array.to_ndarray(false)
    }
}

impl BFloat16Array {
    /// Returns the tabular dtype of the array.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn to_tabular_dtype(&self) -> BFloat16Dtype {
        BFloat16Dtype
    }

    /// Wrap the array in a tabular column.
    #[must_use]
    pub fn into_tabular(self) -> BFloat16Column {
        BFloat16Column::new(self)
    }
}
