//! An adapter exposing extension arrays to tabular analytics frameworks.
//!
//! A tabular framework (a dataframe library) treats a column type as a first-class dtype if it provides
//! the capabilities of [`TabularExtensionDtype`] and [`TabularExtensionArray`]:
//! a kind tag, a missing value sentinel, a unique name, construction from native sequences and Arrow storage,
//! position/slice/mask indexing, null detection, and zero-copy export to a dense buffer.
//!
//! The adapters own no data beyond a reference to the underlying extension array.
//!
//! [`BFloat16Dtype`] and [`BFloat16Column`] implement the bridge for `lance.bfloat16`.

mod bfloat16;

pub use bfloat16::{BFloat16Column, BFloat16Dtype};

use std::ops::Range;

use arrow_array::ArrayRef;
use ndarray::{Array1, CowArray, Ix1};

use crate::extension::{Element, ExtensionError};

/// The kind of a dtype, following the single character codes of numeric array libraries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum DtypeKind {
    /// `b`
    #[display("b")]
    Boolean,
    /// `i`
    #[display("i")]
    SignedInteger,
    /// `u`
    #[display("u")]
    UnsignedInteger,
    /// `f`
    #[display("f")]
    Float,
    /// `O`
    #[display("O")]
    Object,
}

/// An indexer into a [`TabularExtensionArray`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabularIndexer<'a> {
    /// A single element.
    Position(usize),
    /// A contiguous range of elements.
    Slice(Range<usize>),
    /// The elements where the mask is true, in order.
    Mask(&'a [bool]),
}

impl From<usize> for TabularIndexer<'_> {
    fn from(position: usize) -> Self {
        Self::Position(position)
    }
}

impl From<Range<usize>> for TabularIndexer<'_> {
    fn from(range: Range<usize>) -> Self {
        Self::Slice(range)
    }
}

impl<'a> From<&'a [bool]> for TabularIndexer<'a> {
    fn from(mask: &'a [bool]) -> Self {
        Self::Mask(mask)
    }
}

/// The result of indexing a [`TabularExtensionArray`].
#[derive(Debug, Clone, PartialEq)]
pub enum TabularItem<S, A> {
    /// A native scalar, [`None`] if missing.
    Scalar(Option<S>),
    /// A new array.
    Array(A),
}

impl<S, A> TabularItem<S, A> {
    /// Returns the scalar, or [`None`] if the item is an array.
    pub fn into_scalar(self) -> Option<Option<S>> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            Self::Array(_) => None,
        }
    }

    /// Returns the array, or [`None`] if the item is a scalar.
    pub fn into_array(self) -> Option<A> {
        match self {
            Self::Scalar(_) => None,
            Self::Array(array) => Some(array),
        }
    }
}

/// The dtype capabilities required by a tabular framework.
pub trait TabularExtensionDtype: Sized {
    /// The native scalar type.
    type Scalar;

    /// The array type constructed for this dtype.
    type Array: TabularExtensionArray<Dtype = Self>;

    /// The kind of the dtype.
    const KIND: DtypeKind;

    /// The unique name of the dtype.
    const NAME: &'static str;

    /// Returns the kind of the dtype.
    fn kind(&self) -> DtypeKind {
        Self::KIND
    }

    /// Returns the unique name of the dtype.
    fn name(&self) -> &'static str {
        Self::NAME
    }

    /// The missing value sentinel.
    fn na_value(&self) -> Option<Self::Scalar> {
        None
    }

    /// Construct the dtype from its name.
    ///
    /// # Errors
    /// Returns [`ExtensionError::InvalidInputType`] if `string` is not the name of the dtype.
    fn construct_from_string(string: &str) -> Result<Self, ExtensionError>;
}

/// The array capabilities required by a tabular framework.
pub trait TabularExtensionArray: Sized {
    /// The dtype of the array.
    type Dtype: TabularExtensionDtype;

    /// The native scalar type.
    type Scalar;

    /// The element type of the dense buffer export.
    type Element: Element;

    /// Returns the dtype.
    fn dtype(&self) -> Self::Dtype;

    /// Construct an array from native scalars, [`None`] is missing.
    ///
    /// # Errors
    /// Returns an [`ExtensionError`] if the storage array cannot be built.
    fn from_sequence<I>(scalars: I) -> Result<Self, ExtensionError>
    where
        I: IntoIterator<Item = Option<Self::Scalar>>;

    /// Construct an array from its Arrow storage representation.
    ///
    /// # Errors
    /// Returns [`ExtensionError::TypeMismatch`] if `storage` has the wrong data type.
    fn from_arrow(storage: ArrayRef) -> Result<Self, ExtensionError>;

    /// Returns the Arrow storage representation.
    fn arrow_array(&self) -> ArrayRef;

    /// Returns the number of elements.
    fn len(&self) -> usize;

    /// Returns true if the array has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index the array.
    ///
    /// A position returns a native scalar, a slice returns a zero-copy view, and a mask returns the selected elements in order.
    ///
    /// # Errors
    /// Returns [`ExtensionError::IndexOutOfBounds`] if a position or slice is out of bounds,
    /// or [`ExtensionError::ShapeMismatch`] if the mask length differs from the array length.
    fn get_item(
        &self,
        indexer: TabularIndexer<'_>,
    ) -> Result<TabularItem<Self::Scalar, Self>, ExtensionError>;

    /// Returns a mask that is true where elements are missing.
    fn isna(&self) -> Array1<bool>;

    /// Export the array to a dense buffer, without copying where possible.
    ///
    /// # Errors
    /// Returns [`ExtensionError::NullValuesPresent`] if any element is missing.
    fn to_numpy(&self) -> Result<CowArray<'_, Self::Element, Ix1>, ExtensionError>;
}
