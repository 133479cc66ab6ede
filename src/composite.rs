use std::io::Write;
use std::path::Path;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

use crate::error::DysonError;

pub fn load_band(path: &Path) -> Result<DynamicImage, DysonError> {
    image::open(path).map_err(|err| DysonError::Image(format!("{}: {err}", path.display())))
}

/// Merges three single-channel rasters into one RGB raster. Pixel values are
/// copied as-is; all three bands must share dimensions and bit depth.
pub fn merge_bands(
    red: DynamicImage,
    green: DynamicImage,
    blue: DynamicImage,
) -> Result<DynamicImage, DysonError> {
    let dims = [
        (red.width(), red.height()),
        (green.width(), green.height()),
        (blue.width(), blue.height()),
    ];
    if dims[0] != dims[1] || dims[0] != dims[2] {
        return Err(DysonError::BandMismatch(format!(
            "band dimensions differ: red {:?}, green {:?}, blue {:?}",
            dims[0], dims[1], dims[2]
        )));
    }

    match (red, green, blue) {
        (DynamicImage::ImageLuma8(r), DynamicImage::ImageLuma8(g), DynamicImage::ImageLuma8(b)) => {
            Ok(DynamicImage::ImageRgb8(merge8(&r, &g, &b)))
        }
        (
            DynamicImage::ImageLuma16(r),
            DynamicImage::ImageLuma16(g),
            DynamicImage::ImageLuma16(b),
        ) => Ok(DynamicImage::ImageRgb16(merge16(&r, &g, &b))),
        (r, g, b) => Err(DysonError::BandMismatch(format!(
            "bands must be single-channel with one bit depth, got {:?}, {:?}, {:?}",
            r.color(),
            g.color(),
            b.color()
        ))),
    }
}

fn merge8(r: &GrayImage, g: &GrayImage, b: &GrayImage) -> RgbImage {
    RgbImage::from_fn(r.width(), r.height(), |x, y| {
        Rgb([r.get_pixel(x, y)[0], g.get_pixel(x, y)[0], b.get_pixel(x, y)[0]])
    })
}

type Gray16 = ImageBuffer<Luma<u16>, Vec<u16>>;

fn merge16(r: &Gray16, g: &Gray16, b: &Gray16) -> ImageBuffer<Rgb<u16>, Vec<u16>> {
    ImageBuffer::from_fn(r.width(), r.height(), |x, y| {
        Rgb([r.get_pixel(x, y)[0], g.get_pixel(x, y)[0], b.get_pixel(x, y)[0]])
    })
}

/// Stored (uncompressed) PNG without row filtering.
pub fn write_png<W: Write>(image: &DynamicImage, writer: W) -> Result<(), DysonError> {
    let encoder = PngEncoder::new_with_quality(
        writer,
        CompressionType::Uncompressed,
        FilterType::NoFilter,
    );
    image
        .write_with_encoder(encoder)
        .map_err(|err| DysonError::Image(err.to_string()))
}
