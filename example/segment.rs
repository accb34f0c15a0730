#![recursion_limit = "256"]

use std::{fs, path::Path};

use burn::prelude::*;
use burn_hrnet::{
    InferenceBackend,
    inference::segment_from_rgb,
    model::{
        hrnet::{HRNet, HRNetConfig},
        prepare_segmentation_image,
    },
};
use image::{Rgb, RgbImage};

const OUT_CLASSES: usize = 4;
const TARGET_SIZE: [usize; 2] = [384, 384];

fn synthetic_input() -> RgbImage {
    let width = TARGET_SIZE[1] as u32;
    let height = TARGET_SIZE[0] as u32;
    RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width) as u8;
        let g = (y * 255 / height) as u8;
        Rgb([r, g, 128])
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let device = <InferenceBackend as Backend>::Device::default();

    let checkpoint_path = Path::new("assets/model/hrnet.mpk");
    let model = if checkpoint_path.exists() {
        HRNet::<InferenceBackend>::load(&device, HRNetConfig::new(OUT_CLASSES), checkpoint_path)
            .map_err(|err| format!("Failed to load checkpoint: {err}"))?
    } else {
        println!(
            "Checkpoint `{}` not found, running with untrained weights.",
            checkpoint_path.display()
        );
        HRNet::<InferenceBackend>::new(&device, HRNetConfig::new(OUT_CLASSES))
    };

    let image_path = Path::new("assets/image/test.jpg");
    let rgb = if image_path.exists() {
        let image = image::open(image_path)
            .map_err(|err| format!("Failed to load image `{}`: {err}", image_path.display()))?;
        prepare_segmentation_image(&image.to_rgb8(), TARGET_SIZE)?
    } else {
        println!(
            "Image `{}` not found, segmenting a synthetic gradient instead.",
            image_path.display()
        );
        synthetic_input()
    };

    let output = segment_from_rgb::<InferenceBackend>(
        &model,
        rgb.as_raw(),
        TARGET_SIZE[1],
        TARGET_SIZE[0],
        &device,
    )
    .map_err(|err| format!("Failed to run segmentation: {err}"))?;

    let [_, classes, out_height, out_width] = output.dims();
    let values = output
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| format!("Failed to read segmentation tensor values: {err:?}"))?;

    let plane = out_height * out_width;
    let level_step = 255 / (classes - 1).max(1);
    let pixels: Vec<u8> = (0..plane)
        .map(|pixel| {
            let mut best_class = 0;
            let mut best_score = f32::NEG_INFINITY;
            for class in 0..classes {
                let score = values[class * plane + pixel];
                if score > best_score {
                    best_score = score;
                    best_class = class;
                }
            }
            (best_class * level_step).min(255) as u8
        })
        .collect();

    let width_u32 = u32::try_from(out_width)
        .map_err(|_| format!("Mask width {out_width} exceeds supported output range"))?;
    let height_u32 = u32::try_from(out_height)
        .map_err(|_| format!("Mask height {out_height} exceeds supported output range"))?;
    let mask = image::GrayImage::from_vec(width_u32, height_u32, pixels).ok_or_else(|| {
        format!("Segmentation tensor size mismatch for {out_height}x{out_width} mask")
    })?;

    let output_path = image_path.with_file_name("test_mask.png");
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    mask.save(&output_path)?;

    println!("segmentation shape: [1, {classes}, {out_height}, {out_width}]");
    println!("Saved class mask to {}", output_path.display());

    Ok(())
}
