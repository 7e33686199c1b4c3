//! Logical extension types for [Apache Arrow](https://arrow.apache.org) columns used by Lance.
//!
//! An extension type gives a column of a plain Arrow storage type additional meaning while keeping it
//! representable, transmissible, and queryable as the storage type:
//!  - `lance.arrow.image_uri`: URIs of images ([`extension::ImageUriArray`]),
//!  - `lance.arrow.encoded_image`: encoded image bytes ([`extension::EncodedImageArray`]),
//!  - `lance.arrow.fixed_shape_image_tensor`: decoded images of a fixed shape ([`extension::FixedShapeImageTensorArray`]),
//!  - `lance.bfloat16`: brain floating point values ([`extension::BFloat16Array`]).
//!
//! ## Getting Started
//! - [`extension`] describes the extension type protocol and the array and scalar views.
//! - [`extension::init_registry`] creates the registry used to reconstruct tagged columns.
//! - [`codec`] holds the image decoders and encoders used by the conversion pipeline.
//! - [`bridge`] adapts `lance.bfloat16` to the dtype protocol of tabular analytics frameworks.
//!
//! ## Example
//! ```rust
//! # use half::bf16;
//! use lance_arrow::extension::{init_registry, AnyExtensionArray, BFloat16Array};
//!
//! let array = BFloat16Array::from_f32_iter([Some(1.0), None, Some(2.5)])?;
//! let field = array.field("values");
//! let (_, storage) = array.into_dyn();
//!
//! let registry = init_registry()?;
//! let AnyExtensionArray::BFloat16(array) = registry.wrap(&field, storage)? else {
//!     unreachable!()
//! };
//! assert_eq!(array.value(2), Some(bf16::from_f32(2.5)));
//! # Ok::<(), lance_arrow::extension::ExtensionError>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `image`: PNG and JPEG decoding and PNG encoding with the [`image`](https://docs.rs/image) crate.
//!  - `bridge`: the tabular framework [`bridge`].
//!
//! #### Non-Default
//!  - `object_store`: read `s3://` and `gs://` image URIs with [`object_store`](https://docs.rs/object_store).
//!
//! ## Logging
//! Registry updates and decoder selection are logged at the `debug` level, image reads at the `trace` level, with the [`log`] facade.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

#[cfg(feature = "bridge")]
pub mod bridge;
pub mod codec;
pub mod config;
pub mod extension;

pub use lance_arrow_filesystem as filesystem;
