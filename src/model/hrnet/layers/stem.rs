use burn::{
    nn::{conv::Conv2d, norm::BatchNorm},
    prelude::*,
    tensor::activation::relu,
};

use crate::model::hrnet::{conv3x3, norm2d};

use super::fusion::BRANCH_CHANNELS;

const STEM_MID_CHANNELS: usize = 64;

/// Reduces an RGB input to the top-branch feature map at a quarter of the
/// input resolution.
#[derive(Module, Debug)]
pub struct Stem<B: Backend> {
    conv1: Conv2d<B>,
    norm1: BatchNorm<B>,
    conv2: Conv2d<B>,
    norm2: BatchNorm<B>,
    conv3: Conv2d<B>,
    norm3: BatchNorm<B>,
}

impl<B: Backend> Stem<B> {
    pub fn new(device: &B::Device) -> Self {
        Self {
            conv1: conv3x3(device, 3, STEM_MID_CHANNELS, 2),
            norm1: norm2d(device, STEM_MID_CHANNELS),
            conv2: conv3x3(device, STEM_MID_CHANNELS, STEM_MID_CHANNELS, 2),
            norm2: norm2d(device, STEM_MID_CHANNELS),
            conv3: conv3x3(device, STEM_MID_CHANNELS, BRANCH_CHANNELS[0], 1),
            norm3: norm2d(device, BRANCH_CHANNELS[0]),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.norm1.forward(self.conv1.forward(input)));
        let x = relu(self.norm2.forward(self.conv2.forward(x)));
        relu(self.norm3.forward(self.conv3.forward(x)))
    }
}
