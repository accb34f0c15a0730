use burn::prelude::*;

use crate::model::hrnet::HRNet;

/// Converts packed RGB bytes into a tensor suitable for [`HRNet::forward`].
///
/// The input slice must contain `width * height * 3` bytes in row-major order.
/// The output tensor is channel-first (`NCHW`) with values scaled to `[0, 1]`.
pub fn rgb_to_input_tensor<B: Backend>(
    rgb: &[u8],
    width: usize,
    height: usize,
    device: &B::Device,
) -> Result<Tensor<B, 4>, String> {
    let Some(expected_len) = width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(3))
    else {
        return Err(format!("image dimensions {width}x{height} overflow"));
    };

    if rgb.len() != expected_len {
        return Err(format!(
            "expected {expected_len} RGB bytes for {width}x{height}, got {}",
            rgb.len()
        ));
    }

    let plane = width * height;
    let mut data = vec![0.0f32; 3 * plane];
    for channel in 0..3 {
        let dst = &mut data[channel * plane..(channel + 1) * plane];
        for (value, pixel) in dst.iter_mut().zip(rgb.chunks_exact(3)) {
            *value = pixel[channel] as f32 / 255.0;
        }
    }

    Ok(Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([1, 3, height, width]))
}

/// Runs segmentation directly from packed RGB bytes.
///
/// Combines [`rgb_to_input_tensor`] and [`HRNet::forward`]; the result holds
/// independent per-class probabilities shaped `[1, out_classes, height, width]`.
pub fn segment_from_rgb<B: Backend>(
    model: &HRNet<B>,
    rgb: &[u8],
    width: usize,
    height: usize,
    device: &B::Device,
) -> Result<Tensor<B, 4>, String> {
    let input = rgb_to_input_tensor::<B>(rgb, width, height, device)?;
    Ok(model.forward(input))
}
