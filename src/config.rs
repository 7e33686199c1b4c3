//! `lance_arrow` global configuration options.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Global configuration options for the `lance_arrow` crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// # Codec Configuration Options
///
/// ## Image Decoder Order
/// > default: `["image"]`
///
/// The identifiers of image decoders in the order they are probed when [`EncodedImageArray::image_to_tensor`](crate::extension::EncodedImageArray::image_to_tensor) is called without a decoder.
/// The first decoder that is available is used.
/// Registered decoders that are not listed are probed afterwards, in identifier order.
///
/// ## PNG Compression
/// > default: [`PngCompression::Default`]
///
/// The compression level of the default image encoder used by [`FixedShapeImageTensorArray::to_encoded`](crate::extension::FixedShapeImageTensorArray::to_encoded).
#[derive(Debug)]
pub struct Config {
    image_decoder_order: Vec<String>,
    png_compression: PngCompression,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            image_decoder_order: vec!["image".to_string()],
            png_compression: PngCompression::default(),
        }
    }
}

/// The compression level of encoded PNG images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PngCompression {
    /// Balance encoding speed and size.
    #[default]
    Default,
    /// Fast encoding with a larger output.
    Fast,
    /// Slow encoding with the smallest output.
    Best,
}

impl Config {
    /// Get the [image decoder order](#image-decoder-order) configuration.
    #[must_use]
    pub fn image_decoder_order(&self) -> &[String] {
        &self.image_decoder_order
    }

    /// Set the [image decoder order](#image-decoder-order) configuration.
    pub fn set_image_decoder_order(&mut self, image_decoder_order: Vec<String>) {
        self.image_decoder_order = image_decoder_order;
    }

    /// Get the [PNG compression](#png-compression) configuration.
    #[must_use]
    pub fn png_compression(&self) -> PngCompression {
        self.png_compression
    }

    /// Set the [PNG compression](#png-compression) configuration.
    pub fn set_png_compression(&mut self, png_compression: PngCompression) {
        self.png_compression = png_compression;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global `lance_arrow` configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global `lance_arrow` configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.image_decoder_order(), ["image".to_string()]);
        assert_eq!(config.png_compression(), PngCompression::Default);
    }

    #[test]
    fn config_png_compression() {
        let mut config = Config::default();
        config.set_png_compression(PngCompression::Best);
        assert_eq!(config.png_compression(), PngCompression::Best);
        config.set_image_decoder_order(vec![]);
        assert!(config.image_decoder_order().is_empty());
    }
}
