//! Image codecs used by the conversion pipeline.
//!
//! An [`ImageDecoder`] turns encoded image bytes into a [`DenseImage`], an [`ImageEncoder`] does the reverse.
//! Closures with matching signatures implement both traits, so a decoder can be passed inline:
//! ```
//! # use lance_arrow::codec::{DenseImage, ImageDecoder};
//! # use lance_arrow::extension::ExtensionError;
//! let decoder = |bytes: &[u8]| -> Result<DenseImage, ExtensionError> {
//!     Ok(DenseImage::UInt8(ndarray::ArrayD::from_shape_vec(vec![1, bytes.len(), 1], bytes.to_vec())?))
//! };
//! let image = decoder.decode(&[1, 2, 3])?;
//! assert_eq!(image.shape(), [1, 3, 1]);
//! # Ok::<(), ExtensionError>(())
//! ```
//!
//! Decoders are registered at compile time with an [`ImageDecoderPlugin`] and selected by [`probe_image_decoder`].

#[cfg(feature = "image")]
mod image_codec;

#[cfg(feature = "image")]
pub use image_codec::{ImageCrateDecoder, PngImageEncoder};

use std::sync::Arc;

use itertools::Itertools;
use ndarray::{ArrayD, ArrayViewD, Axis};

use crate::{
    config::global_config,
    extension::{Dtype, ExtensionError},
};

/// A decoded image, or a stack of decoded images, with a runtime element type.
///
/// Single images have the shape `(height, width, channels)`.
#[derive(Debug, Clone, PartialEq)]
pub enum DenseImage {
    /// 8-bit unsigned integer pixels.
    UInt8(ArrayD<u8>),
    /// 16-bit unsigned integer pixels.
    UInt16(ArrayD<u16>),
    /// 32-bit floating point pixels.
    Float32(ArrayD<f32>),
}

impl DenseImage {
    /// Returns the element type.
    #[must_use]
    pub fn dtype(&self) -> Dtype {
        match self {
            Self::UInt8(_) => Dtype::UInt8,
            Self::UInt16(_) => Dtype::UInt16,
            Self::Float32(_) => Dtype::Float32,
        }
    }

    /// Returns the shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::UInt8(array) => array.shape(),
            Self::UInt16(array) => array.shape(),
            Self::Float32(array) => array.shape(),
        }
    }

    /// Returns the image at `index` along the leading dimension.
    ///
    /// # Panics
    /// Panics if the image has no dimensions or `index` is out of bounds.
    #[must_use]
    pub fn index_axis(&self, index: usize) -> Self {
        match self {
            Self::UInt8(array) => Self::UInt8(array.index_axis(Axis(0), index).to_owned()),
            Self::UInt16(array) => Self::UInt16(array.index_axis(Axis(0), index).to_owned()),
            Self::Float32(array) => Self::Float32(array.index_axis(Axis(0), index).to_owned()),
        }
    }
}

fn stack_views<T: Clone>(views: &[ArrayViewD<'_, T>]) -> Result<ArrayD<T>, ExtensionError> {
    Ok(ndarray::stack(Axis(0), views)?)
}

macro_rules! stack_variant {
    ($images:expr, $variant:ident) => {{
        let views = $images
            .iter()
            .filter_map(|image| match image {
                DenseImage::$variant(array) => Some(array.view()),
                _ => None,
            })
            .collect::<Vec<_>>();
        DenseImage::$variant(stack_views(&views)?)
    }};
}

/// Stack images of identical shape and element type along a new leading dimension.
///
/// # Errors
/// Returns [`ExtensionError::ShapeMismatch`] if `images` is empty, or the images differ in shape or element type.
pub fn stack_images(images: &[DenseImage]) -> Result<DenseImage, ExtensionError> {
    let Some(first) = images.first() else {
        return Err(ExtensionError::ShapeMismatch(
            "cannot stack zero images".to_string(),
        ));
    };
    if !images.iter().map(DenseImage::dtype).all_equal() {
        return Err(ExtensionError::ShapeMismatch(format!(
            "cannot stack images with element types {}",
            images.iter().map(DenseImage::dtype).unique().join(", ")
        )));
    }
    Ok(match first {
        DenseImage::UInt8(_) => stack_variant!(images, UInt8),
        DenseImage::UInt16(_) => stack_variant!(images, UInt16),
        DenseImage::Float32(_) => stack_variant!(images, Float32),
    })
}

/// Decodes encoded image bytes.
pub trait ImageDecoder: Send + Sync {
    /// Decode `bytes` into an image of shape `(height, width, channels)`.
    ///
    /// # Errors
    /// Returns [`ExtensionError::Decode`] if `bytes` is not a supported image.
    fn decode(&self, bytes: &[u8]) -> Result<DenseImage, ExtensionError>;
}

impl<F> ImageDecoder for F
where
    F: Fn(&[u8]) -> Result<DenseImage, ExtensionError> + Send + Sync,
{
    fn decode(&self, bytes: &[u8]) -> Result<DenseImage, ExtensionError> {
        self(bytes)
    }
}

/// Encodes an image into bytes.
pub trait ImageEncoder: Send + Sync {
    /// Encode an image of shape `(height, width, channels)`.
    ///
    /// # Errors
    /// Returns [`ExtensionError::Encode`] if the image shape or element type is not supported.
    fn encode(&self, image: &DenseImage) -> Result<Vec<u8>, ExtensionError>;
}

impl<F> ImageEncoder for F
where
    F: Fn(&DenseImage) -> Result<Vec<u8>, ExtensionError> + Send + Sync,
{
    fn encode(&self, image: &DenseImage) -> Result<Vec<u8>, ExtensionError> {
        self(image)
    }
}

/// An image decoder plugin.
///
/// `create_fn` returns [`None`] if the decoder is unavailable at runtime.
pub struct ImageDecoderPlugin {
    identifier: &'static str,
    create_fn: fn() -> Option<Arc<dyn ImageDecoder>>,
}

inventory::collect!(ImageDecoderPlugin);

impl ImageDecoderPlugin {
    /// Create a new [`ImageDecoderPlugin`].
    pub const fn new(
        identifier: &'static str,
        create_fn: fn() -> Option<Arc<dyn ImageDecoder>>,
    ) -> Self {
        Self {
            identifier,
            create_fn,
        }
    }

    /// Returns the identifier of the decoder.
    #[must_use]
    pub const fn identifier(&self) -> &'static str {
        self.identifier
    }

    /// Create the decoder, or return [`None`] if it is unavailable.
    #[must_use]
    pub fn create(&self) -> Option<Arc<dyn ImageDecoder>> {
        (self.create_fn)()
    }
}

/// Select the first available image decoder.
///
/// Registered decoders are probed in the [image decoder order](crate::config::Config#image-decoder-order),
/// then the remaining decoders in identifier order.
///
/// # Errors
/// Returns [`ExtensionError::NoDecoderAvailable`] if no decoder is available.
pub fn probe_image_decoder() -> Result<Arc<dyn ImageDecoder>, ExtensionError> {
    let order = global_config().image_decoder_order().to_vec();
    let plugins = inventory::iter::<ImageDecoderPlugin>
        .into_iter()
        .sorted_by_key(|plugin| {
            (
                order
                    .iter()
                    .position(|identifier| identifier == plugin.identifier())
                    .unwrap_or(usize::MAX),
                plugin.identifier(),
            )
        });
    for plugin in plugins {
        if let Some(decoder) = plugin.create() {
            log::debug!("selected image decoder {}", plugin.identifier());
            return Ok(decoder);
        }
        log::debug!("image decoder {} is unavailable", plugin.identifier());
    }
    Err(ExtensionError::NoDecoderAvailable)
}

/// Returns the default image encoder.
///
/// With the `image` feature this is a [`PngImageEncoder`] with the [PNG compression](crate::config::Config#png-compression) of the global config.
///
/// # Errors
/// Returns [`ExtensionError::Encode`] if no image encoder is compiled in.
pub fn default_image_encoder() -> Result<Arc<dyn ImageEncoder>, ExtensionError> {
    #[cfg(feature = "image")]
    {
        Ok(Arc::new(PngImageEncoder::new(
            global_config().png_compression(),
        )))
    }
    #[cfg(not(feature = "image"))]
    {
        Err(ExtensionError::Encode(
            "no image encoder is available, enable the `image` feature or pass an encoder"
                .to_string(),
        ))
    }
}
