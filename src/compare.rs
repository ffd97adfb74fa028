use fast_image_resize::images::Image;
use fast_image_resize::{PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::GrayImage;
use crate::Error;

#[inline]
fn get_luma(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32 * 77) + (g as u32 * 150) + (b as u32 * 29)) >> 8 // Approx Rec. 709 luma
}

fn to_grayscale(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3)
        .map(|pixel| get_luma(pixel[0], pixel[1], pixel[2]) as u8)
        .collect()
}

/// Size of the comparison proxy for a frame, never smaller than 1x1
pub fn proxy_size(width: u32, height: u32, comparison_scale: u32) -> (u32, u32) {
    let scale = comparison_scale.max(1);
    ((width / scale).max(1), (height / scale).max(1))
}

/// Builds the grayscale, downscaled image used to compare frames.
///
/// `rgb` is packed rgb24 of `width`x`height` pixels.
pub fn build_proxy(rgb: &[u8], width: u32, height: u32, comparison_scale: u32) -> Result<GrayImage, Error> {
    if width == 0 || height == 0 {
        return Err(Error::Proxy(format!("frame has no pixels ({}x{})", width, height)));
    }
    let gray = to_grayscale(rgb);
    let (proxy_width, proxy_height) = proxy_size(width, height, comparison_scale);
    if (proxy_width, proxy_height) == (width, height) {
        return GrayImage::from_raw(width, height, gray)
            .ok_or_else(|| Error::Proxy("frame buffer is smaller than its dimensions".to_string()));
    }

    let src = Image::from_vec_u8(width, height, gray, PixelType::U8)
        .map_err(|e| Error::Proxy(e.to_string()))?;
    let mut dst = Image::new(proxy_width, proxy_height, PixelType::U8);
    // Nearest keeps the noise of the source, the oracle is tuned for that
    let resize_options = ResizeOptions::new().resize_alg(ResizeAlg::Nearest);
    Resizer::new()
        .resize(&src, &mut dst, &resize_options)
        .map_err(|e| Error::Proxy(e.to_string()))?;

    GrayImage::from_raw(proxy_width, proxy_height, dst.into_vec())
        .ok_or_else(|| Error::Proxy("resized buffer does not match proxy size".to_string()))
}

/// Scores how different two proxies are. Higher means more different.
///
/// Both proxies always have the same dimensions, sources reject frames that change size.
pub trait SimilarityOracle {
    fn dissimilarity(&self, a: &GrayImage, b: &GrayImage) -> f64;
}

impl<T> SimilarityOracle for T
where
    T: Fn(&GrayImage, &GrayImage) -> f64,
{
    fn dissimilarity(&self, a: &GrayImage, b: &GrayImage) -> f64 {
        self(a, b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferenceStats {
    pub mean: f64,
    pub std_dev: f64,
}

/// Mean and population standard deviation of the per pixel absolute difference.
///
/// Panics if the images differ in size.
pub fn difference_stats(a: &GrayImage, b: &GrayImage) -> DifferenceStats {
    assert_eq!(a.dimensions(), b.dimensions());
    let n = a.as_raw().len();
    if n == 0 {
        return DifferenceStats { mean: 0.0, std_dev: 0.0 };
    }

    let (sum, sum_sq) = a.as_raw().iter().zip(b.as_raw())
        .map(|(a, b)| a.abs_diff(*b) as u64)
        .fold((0u64, 0u64), |(sum, sum_sq), d| (sum + d, sum_sq + d * d));

    let mean = sum as f64 / n as f64;
    let variance = (sum_sq as f64 / n as f64 - mean * mean).max(0.0);
    DifferenceStats { mean, std_dev: variance.sqrt() }
}

/// Uses the standard deviation of the difference.
///
/// Localized change (motion, new content) spreads the difference, while uniform
/// compression noise mostly shifts the mean.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDevOracle;

impl SimilarityOracle for StdDevOracle {
    fn dissimilarity(&self, a: &GrayImage, b: &GrayImage) -> f64 {
        difference_stats(a, b).std_dev
    }
}
