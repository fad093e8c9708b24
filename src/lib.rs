//! Bakes skeletal animation clips into vertex animation textures: one texel
//! row per frame, one texel column per vertex, position and normal images per
//! clip, encoded on the GPU relative to the mesh's reference pose.
//!
//! The host owns the scheduler: construct a [`Baker`] over a [`BakeBackend`],
//! call [`Baker::start`] with a [`BakeConfig`], then call [`Baker::update`]
//! once per tick until the job settles. Each update advances the bake by at
//! most one animation frame so the host stays responsive and an abort takes
//! effect between frames.

pub mod animation;
pub mod baker;
pub mod clip;
pub mod config;
pub mod encoder;
pub mod error;
pub mod job;
pub mod mesh;
pub mod sampler;

pub use animation::{AnimationClip, AnimationPlayer};
pub use baker::Baker;
pub use clip::{BakedAsset, BakedClip, BakedTexture, ClipOutput};
pub use config::BakeConfig;
pub use encoder::compute::GpuBackend;
pub use encoder::{BakeBackend, FrameEncoder, FrameSample, TexturePair};
pub use error::BakeError;
pub use job::{BakeJob, JobProgress, JobState};
pub use mesh::{MeshSnapshot, SkinnedMesh};
pub use sampler::{ClipSampler, SampleStep};
