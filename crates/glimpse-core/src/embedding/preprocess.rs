//! Image preprocessing for CLIP-style visual encoders.
//!
//! - Resize the shorter side to `image_size` (bicubic), center crop a square
//! - Scale pixels to [0, 1], normalize with the CLIP per-channel mean/std
//! - Tensor layout: NCHW [batch, channels, height, width]

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// CLIP normalization mean (per-channel).
const NORM_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];

/// CLIP normalization std (per-channel).
const NORM_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Preprocess an image for CLIP inference.
pub fn preprocess(image: &DynamicImage, image_size: u32) -> Array4<f32> {
    let (width, height) = (image.width().max(1), image.height().max(1));
    let scale = image_size as f32 / width.min(height) as f32;
    let resized_w = ((width as f32 * scale).round() as u32).max(image_size);
    let resized_h = ((height as f32 * scale).round() as u32).max(image_size);

    let resized = image.resize_exact(resized_w, resized_h, FilterType::CatmullRom);
    let left = (resized_w - image_size) / 2;
    let top = (resized_h - image_size) / 2;
    let rgb = resized.crop_imm(left, top, image_size, image_size).to_rgb8();

    let size = image_size as usize;
    let mut tensor = Array4::<f32>::zeros((1, CHANNELS, size, size));

    // Index the raw buffers directly: get_pixel and 4D indexing are
    // bounds-checked per access.
    let raw = rgb.as_raw();
    if let Some(tensor_data) = tensor.as_slice_mut() {
        for (i, pixel) in raw.chunks_exact(3).enumerate() {
            let y = i / size;
            let x = i % size;
            for (c, &val) in pixel.iter().enumerate() {
                let idx = c * size * size + y * size + x;
                tensor_data[idx] = (val as f32 / 255.0 - NORM_MEAN[c]) / NORM_STD[c];
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    #[test]
    fn test_preprocess_shape() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(640, 480));
        let tensor = preprocess(&img, 224);
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_preprocess_tall_image_is_cropped_square() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 900));
        let tensor = preprocess(&img, 32);
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let img =
            DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, image::Rgb([255, 255, 255])));
        let tensor = preprocess(&img, 16);
        let expected_r = (1.0 - NORM_MEAN[0]) / NORM_STD[0];
        assert!((tensor[[0, 0, 8, 8]] - expected_r).abs() < 1e-3);

        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, image::Rgb([0, 0, 0])));
        let tensor = preprocess(&img, 16);
        let expected_b = -NORM_MEAN[2] / NORM_STD[2];
        assert!((tensor[[0, 2, 3, 3]] - expected_b).abs() < 1e-3);
    }
}
