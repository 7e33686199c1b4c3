use image::{
    codecs::png::{CompressionType, FilterType, PngEncoder},
    DynamicImage, ExtendedColorType, ImageEncoder as _,
};
use ndarray::{ArrayD, IxDyn};

use crate::{config::PngCompression, extension::ExtensionError};

use super::{DenseImage, ImageDecoder, ImageDecoderPlugin, ImageEncoder};

inventory::submit! {
    ImageDecoderPlugin::new(ImageCrateDecoder::IDENTIFIER, create_image_crate_decoder)
}

fn create_image_crate_decoder() -> Option<std::sync::Arc<dyn ImageDecoder>> {
    Some(std::sync::Arc::new(ImageCrateDecoder))
}

/// Decodes PNG and JPEG images with the `image` crate.
///
/// Grayscale, RGB, and RGBA images with 8-bit, 16-bit, or 32-bit float channels keep their channel layout and element type.
/// Other color types are converted to 8-bit RGBA.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    /// The plugin identifier.
    pub const IDENTIFIER: &'static str = "image";
}

fn hwc<T>(
    height: u32,
    width: u32,
    channels: usize,
    pixels: Vec<T>,
) -> Result<ArrayD<T>, ExtensionError> {
    let shape = IxDyn(&[height as usize, width as usize, channels]);
    Ok(ArrayD::from_shape_vec(shape, pixels)?)
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DenseImage, ExtensionError> {
        let image = image::load_from_memory(bytes)
            .map_err(|err| ExtensionError::Decode(err.to_string()))?;
        let (width, height) = (image.width(), image.height());
        let channels = usize::from(image.color().channel_count());
        Ok(match image {
            DynamicImage::ImageLuma8(buffer) => {
                DenseImage::UInt8(hwc(height, width, channels, buffer.into_raw())?)
            }
            DynamicImage::ImageLumaA8(buffer) => {
                DenseImage::UInt8(hwc(height, width, channels, buffer.into_raw())?)
            }
            DynamicImage::ImageRgb8(buffer) => {
                DenseImage::UInt8(hwc(height, width, channels, buffer.into_raw())?)
            }
            DynamicImage::ImageRgba8(buffer) => {
                DenseImage::UInt8(hwc(height, width, channels, buffer.into_raw())?)
            }
            DynamicImage::ImageLuma16(buffer) => {
                DenseImage::UInt16(hwc(height, width, channels, buffer.into_raw())?)
            }
            DynamicImage::ImageLumaA16(buffer) => {
                DenseImage::UInt16(hwc(height, width, channels, buffer.into_raw())?)
            }
            DynamicImage::ImageRgb16(buffer) => {
                DenseImage::UInt16(hwc(height, width, channels, buffer.into_raw())?)
            }
            DynamicImage::ImageRgba16(buffer) => {
                DenseImage::UInt16(hwc(height, width, channels, buffer.into_raw())?)
            }
            DynamicImage::ImageRgb32F(buffer) => {
                DenseImage::Float32(hwc(height, width, channels, buffer.into_raw())?)
            }
            DynamicImage::ImageRgba32F(buffer) => {
                DenseImage::Float32(hwc(height, width, channels, buffer.into_raw())?)
            }
            other => DenseImage::UInt8(hwc(height, width, 4, other.into_rgba8().into_raw())?),
        })
    }
}

/// Encodes 8-bit and 16-bit images as PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngImageEncoder {
    compression: PngCompression,
}

impl PngImageEncoder {
    /// Create a new PNG encoder.
    #[must_use]
    pub fn new(compression: PngCompression) -> Self {
        Self { compression }
    }
}

impl From<PngCompression> for CompressionType {
    fn from(compression: PngCompression) -> Self {
        match compression {
            PngCompression::Default => Self::Default,
            PngCompression::Fast => Self::Fast,
            PngCompression::Best => Self::Best,
        }
    }
}

fn color_type(image: &DenseImage, channels: usize) -> Result<ExtendedColorType, ExtensionError> {
    match (image, channels) {
        (DenseImage::UInt8(_), 1) => Ok(ExtendedColorType::L8),
        (DenseImage::UInt8(_), 2) => Ok(ExtendedColorType::La8),
        (DenseImage::UInt8(_), 3) => Ok(ExtendedColorType::Rgb8),
        (DenseImage::UInt8(_), 4) => Ok(ExtendedColorType::Rgba8),
        (DenseImage::UInt16(_), 1) => Ok(ExtendedColorType::L16),
        (DenseImage::UInt16(_), 2) => Ok(ExtendedColorType::La16),
        (DenseImage::UInt16(_), 3) => Ok(ExtendedColorType::Rgb16),
        (DenseImage::UInt16(_), 4) => Ok(ExtendedColorType::Rgba16),
        _ => Err(ExtensionError::Encode(format!(
            "cannot encode a {} image with {channels} channels as PNG",
            image.dtype()
        ))),
    }
}

impl ImageEncoder for PngImageEncoder {
    fn encode(&self, image: &DenseImage) -> Result<Vec<u8>, ExtensionError> {
        let (height, width, channels) = match image.shape() {
            &[height, width] => (height, width, 1),
            &[height, width, channels] => (height, width, channels),
            shape => {
                return Err(ExtensionError::Encode(format!(
                    "cannot encode an image of shape {shape:?}, expected (height, width, channels)"
                )))
            }
        };
        let color = color_type(image, channels)?;
        let to_u32 = |size: usize| {
            u32::try_from(size).map_err(|_| {
                ExtensionError::Encode(format!("image dimension {size} is too large"))
            })
        };
        let (height, width) = (to_u32(height)?, to_u32(width)?);

        let mut bytes = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            &mut bytes,
            self.compression.into(),
            FilterType::Adaptive,
        );
        let result = match image {
            DenseImage::UInt8(array) => {
                let array = array.as_standard_layout();
                encoder.write_image(array.as_slice().unwrap_or_default(), width, height, color)
            }
            DenseImage::UInt16(array) => {
                let array = array.as_standard_layout();
                let pixels = array.as_slice().unwrap_or_default();
                encoder.write_image(bytemuck::cast_slice(pixels), width, height, color)
            }
            DenseImage::Float32(_) => {
                return Err(ExtensionError::Encode(
                    "cannot encode a float32 image as PNG".to_string(),
                ))
            }
        };
        result.map_err(|err| ExtensionError::Encode(err.to_string()))?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_round_trip_rgba() {
        let pixels =
            ArrayD::from_shape_vec(IxDyn(&[1, 2, 4]), vec![42u8, 42, 42, 255, 1, 2, 3, 4]).unwrap();
        let image = DenseImage::UInt8(pixels);
        let bytes = PngImageEncoder::default().encode(&image).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        assert_eq!(ImageCrateDecoder.decode(&bytes).unwrap(), image);
    }

    #[test]
    fn png_round_trip_gray16() {
        let pixels = ArrayD::from_shape_vec(IxDyn(&[2, 1, 1]), vec![1u16, 60000]).unwrap();
        let image = DenseImage::UInt16(pixels);
        let bytes = PngImageEncoder::new(PngCompression::Best)
            .encode(&image)
            .unwrap();
        assert_eq!(ImageCrateDecoder.decode(&bytes).unwrap(), image);
    }

    #[test]
    fn png_unsupported() {
        let image = DenseImage::Float32(ArrayD::zeros(IxDyn(&[1, 1, 3])));
        assert!(matches!(
            PngImageEncoder::default().encode(&image),
            Err(ExtensionError::Encode(_))
        ));
        let image = DenseImage::UInt8(ArrayD::zeros(IxDyn(&[1, 1, 5])));
        assert!(PngImageEncoder::default().encode(&image).is_err());
    }

    #[test]
    fn decode_invalid() {
        assert!(matches!(
            ImageCrateDecoder.decode(b"not an image"),
            Err(ExtensionError::Decode(_))
        ));
    }
}
