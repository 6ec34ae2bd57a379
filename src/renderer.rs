use egui::ColorImage;
use image::imageops::{self, FilterType};
use image::RgbaImage;

/// Scales `bitmap` so its larger axis fills the matching window axis.
///
/// Landscape images take the window width, everything else (portrait and
/// square) takes the window height. The other axis follows the aspect ratio
/// and is truncated, so a landscape image may still overflow the window
/// height when the window and image shapes disagree.
pub fn scale_to_window(bitmap: &RgbaImage, window_size: [u32; 2]) -> RgbaImage {
    let (width, height) = bitmap.dimensions();
    if width == 0 || height == 0 {
        return bitmap.clone();
    }

    let [window_width, window_height] = window_size;
    let (target_width, target_height) = if width > height {
        (window_width, scaled_axis(height, window_width, width))
    } else {
        (scaled_axis(width, window_height, height), window_height)
    };

    if (target_width, target_height) == (width, height) {
        return bitmap.clone();
    }

    imageops::resize(bitmap, target_width, target_height, FilterType::Triangle)
}

fn scaled_axis(value: u32, target: u32, dominant: u32) -> u32 {
    let scaled = (u64::from(value) * u64::from(target)) / u64::from(dominant);
    (scaled as u32).max(1)
}

pub fn render_rgba(bitmap: &RgbaImage) -> ColorImage {
    let (width, height) = bitmap.dimensions();
    ColorImage::from_rgba_unmultiplied([width as usize, height as usize], bitmap.as_raw())
}
