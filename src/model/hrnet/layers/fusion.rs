use burn::{
    module::Ignored,
    nn::{conv::Conv2d, norm::BatchNorm},
    prelude::*,
};

use crate::model::hrnet::{InterpolationMethod, conv1x1, conv3x3, norm2d, upsample_bilinear};

/// Channel width of each resolution branch, top (full resolution) first.
/// Branch `i` runs at `1 / 2^i` of the stem resolution.
pub const BRANCH_CHANNELS: [usize; 4] = [32, 64, 128, 256];

/// (input branches, output branches) of each fusion stage. The first three
/// stages spawn one new branch; the last keeps all four.
pub const STAGE_BRANCH_COUNTS: [(usize, usize); 4] = [(1, 2), (2, 3), (3, 4), (4, 4)];

const DOWNSCALE_CHAIN_CHANNELS: usize = 32;

/// Enumerates every directed resampling edge of a fusion stage, in the order
/// the stage both builds and applies them. Identity edges are excluded.
pub fn resample_paths(inputs: usize, outputs: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..outputs).flat_map(move |target| {
        (0..inputs)
            .filter(move |&source| source != target)
            .map(move |source| (source, target))
    })
}

#[derive(Module, Debug)]
struct DownscaleStep<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B>,
}

/// Carries a branch to a deeper one: one stride-2 convolution per halving,
/// widening on the final step only.
#[derive(Module, Debug)]
pub struct DownscaleFusionBranch<B: Backend> {
    steps: Vec<DownscaleStep<B>>,
}

impl<B: Backend> DownscaleFusionBranch<B> {
    pub fn new(device: &B::Device, in_channels: usize, out_channels: usize) -> Self {
        assert!(
            out_channels > in_channels,
            "downscale branch expects out_channels > in_channels, got {in_channels} -> {out_channels}"
        );

        let mut steps = Vec::new();
        let mut current = in_channels;
        let mut remaining = out_channels;
        while remaining > in_channels * 2 {
            steps.push(DownscaleStep {
                conv: conv3x3(device, current, DOWNSCALE_CHAIN_CHANNELS, 2),
                norm: norm2d(device, DOWNSCALE_CHAIN_CHANNELS),
            });
            current = DOWNSCALE_CHAIN_CHANNELS;
            remaining /= 2;
        }
        steps.push(DownscaleStep {
            conv: conv3x3(device, current, out_channels, 2),
            norm: norm2d(device, out_channels),
        });

        Self { steps }
    }

    // Halving steps stay activation-free; fusion sums raw batch-norm outputs.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = input;
        for step in &self.steps {
            x = step.norm.forward(step.conv.forward(x));
        }
        x
    }
}

/// Carries a branch to a shallower one: a 1x1 projection followed by one
/// bilinear upsample covering the whole resolution gap.
#[derive(Module, Debug)]
pub struct UpscaleFusionBranch<B: Backend> {
    project: Conv2d<B>,
    norm: BatchNorm<B>,
    factor: usize,
    method: Ignored<InterpolationMethod>,
}

impl<B: Backend> UpscaleFusionBranch<B> {
    pub fn new(
        device: &B::Device,
        in_channels: usize,
        out_channels: usize,
        method: InterpolationMethod,
    ) -> Self {
        assert!(
            in_channels > out_channels,
            "upscale branch expects in_channels > out_channels, got {in_channels} -> {out_channels}"
        );

        Self {
            project: conv1x1(device, in_channels, out_channels),
            norm: norm2d(device, out_channels),
            // Under the doubling channel schedule the spatial gap equals the
            // channel ratio.
            factor: in_channels / out_channels,
            method: Ignored(method),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.norm.forward(self.project.forward(input));
        upsample_bilinear(x, self.factor, self.method.0)
    }
}

#[derive(Module, Debug)]
struct BranchResample<B: Backend> {
    down: Option<DownscaleFusionBranch<B>>,
    up: Option<UpscaleFusionBranch<B>>,
}

impl<B: Backend> BranchResample<B> {
    fn new(device: &B::Device, source: usize, target: usize, method: InterpolationMethod) -> Self {
        let from = BRANCH_CHANNELS[source];
        let to = BRANCH_CHANNELS[target];

        if from < to {
            Self {
                down: Some(DownscaleFusionBranch::new(device, from, to)),
                up: None,
            }
        } else {
            Self {
                down: None,
                up: Some(UpscaleFusionBranch::new(device, from, to, method)),
            }
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        if let Some(down) = &self.down {
            down.forward(input)
        } else if let Some(up) = &self.up {
            up.forward(input)
        } else {
            input
        }
    }
}

/// Exchanges information across every branch pair at a stage boundary. Each
/// output branch sums its own input (when it has one) with one resampled
/// contribution per other input branch.
#[derive(Module, Debug)]
pub struct FusionStage<B: Backend> {
    resamples: Vec<BranchResample<B>>,
    input_branches: usize,
    output_branches: usize,
}

impl<B: Backend> FusionStage<B> {
    pub fn new(device: &B::Device, stage: usize, method: InterpolationMethod) -> Self {
        let (input_branches, output_branches) = STAGE_BRANCH_COUNTS[stage];
        let resamples = resample_paths(input_branches, output_branches)
            .map(|(source, target)| BranchResample::new(device, source, target, method))
            .collect();

        Self {
            resamples,
            input_branches,
            output_branches,
        }
    }

    pub fn forward(&self, inputs: Vec<Tensor<B, 4>>) -> Vec<Tensor<B, 4>> {
        assert!(
            inputs.len() == self.input_branches,
            "fusion stage wired for {} input branches, got {}",
            self.input_branches,
            inputs.len()
        );

        let mut outputs: Vec<Option<Tensor<B, 4>>> = vec![None; self.output_branches];
        for (target, input) in inputs.iter().enumerate().take(self.output_branches) {
            outputs[target] = Some(input.clone());
        }

        for ((source, target), resample) in
            resample_paths(self.input_branches, self.output_branches).zip(&self.resamples)
        {
            let contribution = resample.forward(inputs[source].clone());
            outputs[target] = Some(match outputs[target].take() {
                Some(sum) => sum + contribution,
                None => contribution,
            });
        }

        outputs
            .into_iter()
            .map(|branch| branch.expect("every output branch receives a contribution"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = crate::InferenceBackend;

    fn device() -> <TestBackend as Backend>::Device {
        <TestBackend as Backend>::Device::default()
    }

    fn ramp(
        device: &<TestBackend as Backend>::Device,
        shape: [usize; 4],
    ) -> Tensor<TestBackend, 4> {
        let len = shape.iter().product::<usize>();
        Tensor::<TestBackend, 1, Int>::arange(0..len as i64, device)
            .float()
            .div_scalar(len as f32)
            .reshape(shape)
    }

    #[test]
    fn resample_paths_match_stage_wiring() {
        let counts: Vec<usize> = STAGE_BRANCH_COUNTS
            .iter()
            .map(|&(inputs, outputs)| resample_paths(inputs, outputs).count())
            .collect();

        assert_eq!(counts, vec![1, 4, 9, 12]);
    }

    #[test]
    fn resample_paths_skip_identity_edges() {
        assert!(resample_paths(4, 4).all(|(source, target)| source != target));

        let stage_two: Vec<_> = resample_paths(2, 3).collect();
        assert_eq!(stage_two, vec![(1, 0), (0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn downscale_branch_halves_resolution_per_step() {
        let device = device();
        let branch = DownscaleFusionBranch::<TestBackend>::new(&device, 32, 256);
        assert_eq!(branch.steps.len(), 3);

        let input = Tensor::<TestBackend, 4>::zeros([1, 32, 128, 128], &device);
        let output = branch.forward(input);

        assert_eq!(output.shape().dims::<4>(), [1, 256, 16, 16]);
    }

    #[test]
    fn downscale_step_counts_follow_channel_ratio() {
        let device = device();

        let single = DownscaleFusionBranch::<TestBackend>::new(&device, 64, 128);
        assert_eq!(single.steps.len(), 1);

        let double = DownscaleFusionBranch::<TestBackend>::new(&device, 64, 256);
        assert_eq!(double.steps.len(), 2);
    }

    #[test]
    fn upscale_branch_restores_resolution() {
        let device = device();
        let branch =
            UpscaleFusionBranch::<TestBackend>::new(&device, 256, 32, InterpolationMethod::Burn);

        let input = Tensor::<TestBackend, 4>::zeros([1, 256, 16, 16], &device);
        let output = branch.forward(input);

        assert_eq!(output.shape().dims::<4>(), [1, 32, 128, 128]);
    }

    #[test]
    #[should_panic(expected = "downscale branch expects out_channels > in_channels")]
    fn downscale_branch_rejects_narrowing() {
        DownscaleFusionBranch::<TestBackend>::new(&device(), 64, 64);
    }

    #[test]
    #[should_panic(expected = "upscale branch expects in_channels > out_channels")]
    fn upscale_branch_rejects_widening() {
        UpscaleFusionBranch::<TestBackend>::new(&device(), 32, 64, InterpolationMethod::Burn);
    }

    #[test]
    fn stage_two_fuses_into_three_branches() {
        let device = device();
        let stage = FusionStage::<TestBackend>::new(&device, 1, InterpolationMethod::Burn);

        let inputs = vec![
            Tensor::<TestBackend, 4>::zeros([1, 32, 96, 96], &device),
            Tensor::<TestBackend, 4>::zeros([1, 64, 48, 48], &device),
        ];
        let outputs = stage.forward(inputs);

        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].shape().dims::<4>(), [1, 32, 96, 96]);
        assert_eq!(outputs[1].shape().dims::<4>(), [1, 64, 48, 48]);
        assert_eq!(outputs[2].shape().dims::<4>(), [1, 128, 24, 24]);
    }

    #[test]
    fn first_stage_passes_top_branch_through() {
        let device = device();
        let stage = FusionStage::<TestBackend>::new(&device, 0, InterpolationMethod::Burn);

        let input = ramp(&device, [1, 32, 64, 64]);
        let outputs = stage.forward(vec![input.clone()]);

        assert_eq!(outputs.len(), 2);
        assert!(
            outputs[0].clone().all_close(input, Some(1e-6), Some(1e-6)),
            "the sole input branch has no other contributors and must pass through"
        );
        assert_eq!(outputs[1].shape().dims::<4>(), [1, 64, 32, 32]);
    }

    #[test]
    #[should_panic(expected = "fusion stage wired for 2 input branches, got 1")]
    fn stage_rejects_branch_count_mismatch() {
        let device = device();
        let stage = FusionStage::<TestBackend>::new(&device, 1, InterpolationMethod::Burn);

        stage.forward(vec![Tensor::<TestBackend, 4>::zeros(
            [1, 32, 64, 64],
            &device,
        )]);
    }
}
