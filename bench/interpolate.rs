#![recursion_limit = "256"]

use burn::prelude::*;
use burn_hrnet::{
    InferenceBackend,
    model::hrnet::{InterpolationMethod, resize_bilinear},
};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

criterion_group! {
    name = interpolation_benchmarks;
    config = Criterion::default().sample_size(100);
    targets = interpolation_benchmark,
}
criterion_main!(interpolation_benchmarks);

fn interpolation_benchmark(c: &mut Criterion) {
    let device = <InferenceBackend as Backend>::Device::default();
    let bench_device = device.clone();

    struct ResizeCase {
        name: &'static str,
        channels: usize,
        batch: usize,
        in_height: usize,
        in_width: usize,
        out_height: usize,
        out_width: usize,
    }

    let cases = [
        ResizeCase {
            name: "c4_b1_96x96_to_384x384",
            channels: 4,
            batch: 1,
            in_height: 96,
            in_width: 96,
            out_height: 384,
            out_width: 384,
        },
        ResizeCase {
            name: "c32_b1_12x12_to_96x96",
            channels: 32,
            batch: 1,
            in_height: 12,
            in_width: 12,
            out_height: 96,
            out_width: 96,
        },
        ResizeCase {
            name: "c32_b1_48x48_to_96x96",
            channels: 32,
            batch: 1,
            in_height: 48,
            in_width: 48,
            out_height: 96,
            out_width: 96,
        },
        ResizeCase {
            name: "c3_b1_384x384_to_96x96",
            channels: 3,
            batch: 1,
            in_height: 384,
            in_width: 384,
            out_height: 96,
            out_width: 96,
        },
    ];

    let mut group = c.benchmark_group("burn_hrnet_interpolation");
    for case in cases {
        let input: Tensor<InferenceBackend, 4> = Tensor::zeros(
            [case.batch, case.channels, case.in_height, case.in_width],
            &device,
        );
        let throughput = (case.batch * case.channels * case.out_height * case.out_width) as u64;
        group.throughput(Throughput::Elements(throughput));

        group.bench_function(format!("{}::custom", case.name), |b| {
            b.iter(|| {
                let output = resize_bilinear(
                    input.clone(),
                    [case.out_height, case.out_width],
                    InterpolationMethod::Custom,
                );
                InferenceBackend::sync(&bench_device);
                black_box(output);
            });
        });

        group.bench_function(format!("{}::burn", case.name), |b| {
            b.iter(|| {
                let output = resize_bilinear(
                    input.clone(),
                    [case.out_height, case.out_width],
                    InterpolationMethod::Burn,
                );
                InferenceBackend::sync(&bench_device);
                black_box(output);
            });
        });
    }
    group.finish();
}
