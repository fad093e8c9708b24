use glam::Vec3;
use image::Rgba32FImage;

use crate::error::BakeError;

pub mod compute;

/// One sampled animation frame, consumed immediately by a [`FrameEncoder`]
/// and then discarded.
pub struct FrameSample {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// Root bone translation for this frame, folded into the position texel
    /// so world-space motion can be reconstructed at playback.
    pub root_position: Vec3,
    /// Destination texture row.
    pub index: u32,
}

/// Writes one frame per call into a position/normal texture pair, relative to
/// the reference pose captured at construction.
pub trait FrameEncoder {
    /// Locked vertex count, equal to the destination texture width.
    fn width(&self) -> u32;

    /// Destination texture height, equal to the clip's frame count.
    fn height(&self) -> u32;

    /// Encode one row. Rejects a row index outside the destination height and
    /// a frame whose vertex count differs from the locked width.
    fn encode(&mut self, frame: &FrameSample) -> Result<(), BakeError>;
}

/// CPU-readable result of a finished clip.
pub struct TexturePair {
    pub position: Rgba32FImage,
    pub normal: Rgba32FImage,
}

/// Creates and finalizes per-clip encoders. The GPU implementation is
/// [`compute::GpuBackend`]; tests drive the orchestrator through a scripted
/// implementation instead.
pub trait BakeBackend {
    type Encoder: FrameEncoder;

    /// Allocate the destination texture pair (width = `reference.len()`,
    /// height = `frame_count`) and bind an encoder to it. The reference pose
    /// is uploaded exactly once, here.
    fn create_encoder(
        &self,
        reference: &[Vec3],
        frame_count: u32,
        label: &str,
    ) -> Result<Self::Encoder, BakeError>;

    /// Read the fully written textures back into CPU images, consuming the
    /// encoder. Must only be called after every row of the clip was encoded;
    /// dropping the encoder instead discards the textures.
    fn finish(&self, encoder: Self::Encoder) -> Result<TexturePair, BakeError>;
}
