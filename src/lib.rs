#![recursion_limit = "256"]

pub mod inference;
pub mod model;

#[cfg(feature = "backend_cuda")]
pub type InferenceBackend = burn::backend::Cuda<f32, i32>;

#[cfg(all(feature = "backend_wgpu", not(feature = "backend_cuda")))]
pub type InferenceBackend = burn::backend::Wgpu<f32, i32>;

#[cfg(all(
    feature = "backend_ndarray",
    not(any(feature = "backend_cuda", feature = "backend_wgpu"))
))]
pub type InferenceBackend = burn::backend::NdArray<f32>;

#[cfg(feature = "train")]
pub type TrainingBackend = burn::backend::Autodiff<InferenceBackend>;
