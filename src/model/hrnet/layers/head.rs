use burn::prelude::*;

use crate::model::hrnet::InterpolationMethod;

use super::fusion::{BRANCH_CHANNELS, UpscaleFusionBranch};

/// Channel width of the concatenated head output.
pub const FUSED_CHANNELS: usize = BRANCH_CHANNELS[0] * BRANCH_CHANNELS.len();

/// Collapses the four final branches into one top-resolution feature map:
/// the three deeper branches are projected to the top width, upsampled, and
/// concatenated with the top branch.
#[derive(Module, Debug)]
pub struct FusionHead<B: Backend> {
    from_branch4: UpscaleFusionBranch<B>,
    from_branch3: UpscaleFusionBranch<B>,
    from_branch2: UpscaleFusionBranch<B>,
}

impl<B: Backend> FusionHead<B> {
    pub fn new(device: &B::Device, method: InterpolationMethod) -> Self {
        let width = BRANCH_CHANNELS[0];

        Self {
            from_branch4: UpscaleFusionBranch::new(device, BRANCH_CHANNELS[3], width, method),
            from_branch3: UpscaleFusionBranch::new(device, BRANCH_CHANNELS[2], width, method),
            from_branch2: UpscaleFusionBranch::new(device, BRANCH_CHANNELS[1], width, method),
        }
    }

    pub fn forward(&self, branches: Vec<Tensor<B, 4>>) -> Tensor<B, 4> {
        assert!(
            branches.len() == BRANCH_CHANNELS.len(),
            "fusion head expects {} branches, got {}",
            BRANCH_CHANNELS.len(),
            branches.len()
        );

        let mut it = branches.into_iter();
        let b1 = it.next().expect("missing branch 1");
        let b2 = it.next().expect("missing branch 2");
        let b3 = it.next().expect("missing branch 3");
        let b4 = it.next().expect("missing branch 4");

        // Deepest branch first; the classifier depends on this channel order.
        Tensor::cat(
            vec![
                self.from_branch4.forward(b4),
                self.from_branch3.forward(b3),
                self.from_branch2.forward(b2),
                b1,
            ],
            1,
        )
    }
}
