use burn::{
    module::Ignored,
    nn::{
        PaddingConfig2d,
        conv::{Conv2d, Conv2dConfig},
        norm::{BatchNorm, BatchNormConfig},
    },
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, RecorderError},
    tensor::activation::sigmoid,
};

pub mod layers {
    pub mod blocks;
    pub mod fusion;
    pub mod head;
    pub mod stem;
}
mod interpolate;

pub use interpolate::{InterpolationMethod, resize_bilinear, upsample_bilinear};

use layers::{
    blocks::BasicBlock,
    fusion::{BRANCH_CHANNELS, FusionStage, STAGE_BRANCH_COUNTS},
    head::{FUSED_CHANNELS, FusionHead},
    stem::Stem,
};

/// Input height and width must be multiples of this for the branches to stay
/// aligned across every fusion stage.
pub const BRANCH_ALIGNMENT: usize = 32;

const BN_EPSILON: f64 = 1e-3;
// Momentum here weights the incoming batch statistic, so 0.01 matches a 0.99
// running-average decay.
const BN_MOMENTUM: f64 = 0.01;

#[derive(Config, Debug)]
pub struct HRNetConfig {
    /// Number of independent class probability maps the network emits.
    pub out_classes: usize,

    #[config(default = "InterpolationMethod::Burn")]
    pub interpolation: InterpolationMethod,
}

#[derive(Module, Debug)]
struct Stage<B: Backend> {
    blocks: Vec<BasicBlock<B>>,
    fusion: FusionStage<B>,
}

impl<B: Backend> Stage<B> {
    fn new(device: &B::Device, stage: usize, method: InterpolationMethod) -> Self {
        let (input_branches, _) = STAGE_BRANCH_COUNTS[stage];
        let blocks = (0..input_branches)
            .map(|branch| BasicBlock::new(device, BRANCH_CHANNELS[branch]))
            .collect();

        Self {
            blocks,
            fusion: FusionStage::new(device, stage, method),
        }
    }

    fn forward(&self, branches: Vec<Tensor<B, 4>>) -> Vec<Tensor<B, 4>> {
        assert!(
            branches.len() == self.blocks.len(),
            "stage wired for {} branches, got {}",
            self.blocks.len(),
            branches.len()
        );

        let refined = branches
            .into_iter()
            .zip(&self.blocks)
            .map(|(branch, block)| block.forward(branch))
            .collect();
        self.fusion.forward(refined)
    }
}

#[derive(Module, Debug)]
pub struct HRNet<B: Backend> {
    stem: Stem<B>,
    stages: Vec<Stage<B>>,
    head: FusionHead<B>,
    classifier: Conv2d<B>,
    out_classes: usize,
    interpolation: Ignored<InterpolationMethod>,
}

impl<B: Backend> HRNet<B> {
    pub fn new(device: &B::Device, config: HRNetConfig) -> Self {
        assert!(
            config.out_classes > 0,
            "HRNet requires at least one output class"
        );

        let stages = (0..STAGE_BRANCH_COUNTS.len())
            .map(|stage| Stage::new(device, stage, config.interpolation))
            .collect();

        Self {
            stem: Stem::new(device),
            stages,
            head: FusionHead::new(device, config.interpolation),
            classifier: Conv2dConfig::new([FUSED_CHANNELS, config.out_classes], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            out_classes: config.out_classes,
            interpolation: Ignored(config.interpolation),
        }
    }

    /// Restores a model from a checkpoint written by [`HRNet::save`].
    pub fn load(
        device: &B::Device,
        config: HRNetConfig,
        checkpoint_path: impl AsRef<std::path::Path>,
    ) -> Result<Self, RecorderError> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        Self::new(device, config).load_file(checkpoint_path.as_ref(), &recorder, device)
    }

    pub fn save(self, checkpoint_path: impl AsRef<std::path::Path>) -> Result<(), RecorderError> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.save_file(checkpoint_path.as_ref(), &recorder)
    }

    /// Produces per-class probabilities at the input resolution, shaped
    /// `[batch, out_classes, height, width]` with values in `[0, 1]`.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, height, width] = input.dims();

        let mut branches = vec![self.stem.forward(input)];
        for stage in &self.stages {
            branches = stage.forward(branches);
        }

        let fused = self.head.forward(branches);
        let probabilities = sigmoid(self.classifier.forward(fused));
        resize_bilinear(probabilities, [height, width], self.interpolation.0)
    }

    pub fn out_classes(&self) -> usize {
        self.out_classes
    }

    pub fn interpolation_method(&self) -> InterpolationMethod {
        self.interpolation.0
    }
}

pub(crate) fn conv3x3<B: Backend>(
    device: &B::Device,
    in_channels: usize,
    out_channels: usize,
    stride: usize,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .init(device)
}

pub(crate) fn conv1x1<B: Backend>(
    device: &B::Device,
    in_channels: usize,
    out_channels: usize,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [1, 1]).init(device)
}

pub(crate) fn norm2d<B: Backend>(device: &B::Device, channels: usize) -> BatchNorm<B> {
    BatchNormConfig::new(channels)
        .with_epsilon(BN_EPSILON)
        .with_momentum(BN_MOMENTUM)
        .init(device)
}
