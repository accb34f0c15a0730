use burn::{
    nn::{conv::Conv2d, norm::BatchNorm},
    prelude::*,
    tensor::activation::relu,
};

use crate::model::hrnet::{conv1x1, conv3x3, norm2d};

const BOTTLENECK_MID_CHANNELS: usize = 64;
const BOTTLENECK_OUT_CHANNELS: usize = 256;

#[derive(Module, Debug)]
struct ResidualUnit<B: Backend> {
    conv1: Conv2d<B>,
    norm1: BatchNorm<B>,
    conv2: Conv2d<B>,
    norm2: BatchNorm<B>,
}

impl<B: Backend> ResidualUnit<B> {
    fn new(device: &B::Device, channels: usize) -> Self {
        Self {
            conv1: conv3x3(device, channels, channels, 1),
            norm1: norm2d(device, channels),
            conv2: conv3x3(device, channels, channels, 1),
            norm2: norm2d(device, channels),
        }
    }

    // Both activations sit before the shortcut add; the sum itself stays raw.
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.norm1.forward(self.conv1.forward(input.clone())));
        let x = relu(self.norm2.forward(self.conv2.forward(x)));
        x + input
    }
}

/// Four channel-preserving residual units in sequence.
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    units: Vec<ResidualUnit<B>>,
}

impl<B: Backend> BasicBlock<B> {
    pub fn new(device: &B::Device, channels: usize) -> Self {
        let units = (0..4).map(|_| ResidualUnit::new(device, channels)).collect();
        Self { units }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = input;
        for unit in &self.units {
            x = unit.forward(x);
        }
        x
    }
}

#[derive(Module, Debug)]
struct BottleneckUnit<B: Backend> {
    reduce: Conv2d<B>,
    norm1: BatchNorm<B>,
    conv: Conv2d<B>,
    norm2: BatchNorm<B>,
    expand: Conv2d<B>,
    norm3: BatchNorm<B>,
}

impl<B: Backend> BottleneckUnit<B> {
    fn new(device: &B::Device, in_channels: usize) -> Self {
        Self {
            reduce: conv1x1(device, in_channels, BOTTLENECK_MID_CHANNELS),
            norm1: norm2d(device, BOTTLENECK_MID_CHANNELS),
            conv: conv3x3(device, BOTTLENECK_MID_CHANNELS, BOTTLENECK_MID_CHANNELS, 1),
            norm2: norm2d(device, BOTTLENECK_MID_CHANNELS),
            expand: conv1x1(device, BOTTLENECK_MID_CHANNELS, BOTTLENECK_OUT_CHANNELS),
            norm3: norm2d(device, BOTTLENECK_OUT_CHANNELS),
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.norm1.forward(self.reduce.forward(input)));
        let x = relu(self.norm2.forward(self.conv.forward(x)));
        relu(self.norm3.forward(self.expand.forward(x)))
    }
}

/// Three 1x1/3x3/1x1 units expanding to 256 channels, with no shortcut
/// connection between them.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    units: Vec<BottleneckUnit<B>>,
}

impl<B: Backend> Bottleneck<B> {
    pub fn new(device: &B::Device, in_channels: usize) -> Self {
        let mut units = Vec::with_capacity(3);
        units.push(BottleneckUnit::new(device, in_channels));
        for _ in 0..2 {
            units.push(BottleneckUnit::new(device, BOTTLENECK_OUT_CHANNELS));
        }
        Self { units }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = input;
        for unit in &self.units {
            x = unit.forward(x);
        }
        x
    }
}
