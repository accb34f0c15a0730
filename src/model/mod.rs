pub mod hrnet;

use image::{
    RgbImage,
    imageops::{self, FilterType},
};

use hrnet::BRANCH_ALIGNMENT;

/// Resizes an image to the requested `[height, width]` segmentation target.
///
/// Branch fusion needs both dimensions to be multiples of
/// [`BRANCH_ALIGNMENT`]; other targets are rejected here rather than failing
/// deep inside a forward pass.
pub fn prepare_segmentation_image(
    image: &RgbImage,
    target: [usize; 2],
) -> Result<RgbImage, String> {
    let [height, width] = target;
    if height == 0 || width == 0 {
        return Err("segmentation target resolution must be non-zero".to_string());
    }
    if height % BRANCH_ALIGNMENT != 0 || width % BRANCH_ALIGNMENT != 0 {
        return Err(format!(
            "segmentation target {height}x{width} must be divisible by {BRANCH_ALIGNMENT}"
        ));
    }

    if image.height() as usize == height && image.width() as usize == width {
        return Ok(image.clone());
    }

    Ok(imageops::resize(
        image,
        width as u32,
        height as u32,
        FilterType::CatmullRom,
    ))
}
