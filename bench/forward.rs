#![recursion_limit = "256"]

use burn::prelude::*;
use burn_hrnet::{
    InferenceBackend,
    model::hrnet::{HRNet, HRNetConfig},
};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

criterion_group! {
    name = forward_benchmarks;
    config = Criterion::default().sample_size(10);
    targets = forward_benchmark,
}
criterion_main!(forward_benchmarks);

fn forward_benchmark(c: &mut Criterion) {
    let device = <InferenceBackend as Backend>::Device::default();
    let bench_device = device.clone();

    let model = HRNet::<InferenceBackend>::new(&device, HRNetConfig::new(4));
    let input_384 = Tensor::<InferenceBackend, 4>::zeros([1, 3, 384, 384], &device);
    let input_256 = Tensor::<InferenceBackend, 4>::zeros([1, 3, 256, 256], &device);

    let mut group = c.benchmark_group("burn_hrnet_forward");
    group.throughput(Throughput::Elements(1));
    group.bench_function("hrnet_384x384", |b| {
        b.iter(|| {
            let output = model.forward(input_384.clone());
            InferenceBackend::sync(&bench_device);
            black_box(output);
        });
    });
    group.bench_function("hrnet_256x256", |b| {
        b.iter(|| {
            let output = model.forward(input_256.clone());
            InferenceBackend::sync(&bench_device);
            black_box(output);
        });
    });
    group.finish();
}
