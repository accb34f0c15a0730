use burn::{
    config::Config,
    tensor::{
        Tensor,
        backend::Backend,
        module,
        ops::{InterpolateMode as BurnInterpolateMode, InterpolateOptions},
    },
};

#[derive(Config, Debug, Copy, PartialEq, Eq)]
pub enum InterpolationMethod {
    Custom,
    Burn,
}

impl Default for InterpolationMethod {
    fn default() -> Self {
        Self::Burn
    }
}

fn sample_plane(plane: &[f32], width: usize, height: usize, x: f32, y: f32) -> f32 {
    let x0 = x.floor();
    let y0 = y.floor();
    let dx = x - x0;
    let dy = y - y0;

    let left = x0.max(0.0) as usize;
    let top = y0.max(0.0) as usize;
    let right = (x0 + 1.0).min((width - 1) as f32) as usize;
    let bottom = (y0 + 1.0).min((height - 1) as f32) as usize;

    let row_top = &plane[top * width..];
    let row_bottom = &plane[bottom * width..];

    let upper = row_top[left] * (1.0 - dx) + row_top[right] * dx;
    let lower = row_bottom[left] * (1.0 - dx) + row_bottom[right] * dx;

    upper * (1.0 - dy) + lower * dy
}

fn resize_bilinear_custom<B: Backend>(
    input: Tensor<B, 4>,
    output_size: [usize; 2],
) -> Tensor<B, 4> {
    let [batch, channels, in_height, in_width] = input.shape().dims::<4>();
    let [out_height, out_width] = output_size;

    let device = input.device();
    let data = input.into_data().convert::<f32>();
    let values = data
        .to_vec::<f32>()
        .expect("tensor data should convert to Vec<f32>");

    let plane_in = in_height * in_width;
    let plane_out = out_height * out_width;
    let mut output = vec![0.0f32; batch * channels * plane_out];

    let scale_y = in_height as f32 / out_height as f32;
    let scale_x = in_width as f32 / out_width as f32;

    for plane in 0..batch * channels {
        let src = &values[plane * plane_in..(plane + 1) * plane_in];
        let dst = &mut output[plane * plane_out..(plane + 1) * plane_out];

        for oy in 0..out_height {
            let sy = (oy as f32 + 0.5) * scale_y - 0.5;
            for ox in 0..out_width {
                let sx = (ox as f32 + 0.5) * scale_x - 0.5;
                dst[oy * out_width + ox] = sample_plane(src, in_width, in_height, sx, sy);
            }
        }
    }

    Tensor::<B, 1>::from_floats(output.as_slice(), &device).reshape([
        batch, channels, out_height, out_width,
    ])
}

/// Resizes a `NCHW` tensor to `[out_height, out_width]` with bilinear filtering.
///
/// `Custom` samples with half-pixel centers on the CPU; `Burn` uses the native
/// kernel, which aligns corners instead. Shapes agree, border values do not.
pub fn resize_bilinear<B: Backend>(
    input: Tensor<B, 4>,
    output_size: [usize; 2],
    method: InterpolationMethod,
) -> Tensor<B, 4> {
    assert!(
        output_size[0] > 0 && output_size[1] > 0,
        "resize target must be positive, got {output_size:?}"
    );

    let [_, _, in_height, in_width] = input.dims();
    if [in_height, in_width] == output_size {
        return input;
    }

    match method {
        InterpolationMethod::Custom => resize_bilinear_custom(input, output_size),
        InterpolationMethod::Burn => module::interpolate(
            input,
            output_size,
            InterpolateOptions::new(BurnInterpolateMode::Bilinear),
        ),
    }
}

/// Scales both spatial dimensions up by an integer factor.
pub fn upsample_bilinear<B: Backend>(
    input: Tensor<B, 4>,
    factor: usize,
    method: InterpolationMethod,
) -> Tensor<B, 4> {
    assert!(factor > 0, "upsample factor must be positive");

    let [_, _, height, width] = input.dims();
    resize_bilinear(input, [height * factor, width * factor], method)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = crate::InferenceBackend;

    fn tensor_from_values(
        device: &<TestBackend as Backend>::Device,
        values: &[f32],
        shape: [usize; 4],
    ) -> Tensor<TestBackend, 4> {
        Tensor::<TestBackend, 1>::from_floats(values, device).reshape(shape)
    }

    #[test]
    fn fixed_resize_matches_expected_grids() {
        let device = <TestBackend as Backend>::Device::default();
        let input = tensor_from_values(&device, &[0.0, 4.0, 8.0, 12.0], [1, 1, 2, 2]);
        let output_size = [4, 4];

        let custom = resize_bilinear(input.clone(), output_size, InterpolationMethod::Custom);
        let burn = resize_bilinear(input, output_size, InterpolationMethod::Burn);

        let expected_custom = tensor_from_values(
            &device,
            &[
                0.0, 1.0, 3.0, 4.0, //
                2.0, 3.0, 5.0, 6.0, //
                6.0, 7.0, 9.0, 10.0, //
                8.0, 9.0, 11.0, 12.0,
            ],
            [1, 1, 4, 4],
        );
        let expected_burn = tensor_from_values(
            &device,
            &[
                0.0, 1.3333334, 2.6666667, 4.0, //
                2.6666667, 4.0, 5.3333335, 6.6666665, //
                5.3333335, 6.6666665, 8.0, 9.333333, //
                8.0, 9.333333, 10.666667, 12.0,
            ],
            [1, 1, 4, 4],
        );

        assert!(
            custom
                .clone()
                .all_close(expected_custom, Some(1e-5), Some(1e-5)),
            "half-pixel interpolation output {custom:?} did not match expected values"
        );
        assert!(
            burn.clone().all_close(expected_burn, Some(1e-5), Some(1e-5)),
            "native interpolation output {burn:?} did not match expected values"
        );
        assert!(
            !custom.all_close(burn, Some(1e-5), Some(1e-5)),
            "half-pixel and native interpolation unexpectedly matched exactly"
        );
    }

    #[test]
    fn constant_input_survives_upsampling() {
        let device = <TestBackend as Backend>::Device::default();
        let input = Tensor::<TestBackend, 4>::full([1, 2, 2, 2], 5.0, &device);
        let expected = Tensor::<TestBackend, 4>::full([1, 2, 6, 6], 5.0, &device);

        for method in [InterpolationMethod::Custom, InterpolationMethod::Burn] {
            let output = upsample_bilinear(input.clone(), 3, method);
            assert_eq!(output.shape().dims::<4>(), [1, 2, 6, 6]);
            assert!(
                output
                    .clone()
                    .all_close(expected.clone(), Some(1e-5), Some(1e-5)),
                "{method:?} upsampling altered a constant plane: {output:?}"
            );
        }
    }

    #[test]
    fn matching_target_returns_input_unchanged() {
        let device = <TestBackend as Backend>::Device::default();
        let input = tensor_from_values(&device, &[3.0, -1.0, 0.5, 2.0, 7.0, -4.0], [1, 1, 2, 3]);

        let output = resize_bilinear(input.clone(), [2, 3], InterpolationMethod::Custom);

        assert!(
            output.all_close(input, Some(1e-6), Some(1e-6)),
            "resizing to the current size should be a no-op"
        );
    }
}
