use image::Rgba32FImage;

/// A finished CPU-side output image, named for the persistence collaborator.
pub struct BakedTexture {
    pub name: String,
    pub image: Rgba32FImage,
}

/// Binds a baked texture pair to its playback framerate. Immutable after
/// creation; the runtime playback collaborator consumes it as-is.
pub struct BakedClip {
    name: String,
    position_tex: Rgba32FImage,
    normal_tex: Rgba32FImage,
    framerate: f32,
}

impl BakedClip {
    pub(crate) fn new(
        name: String,
        position_tex: Rgba32FImage,
        normal_tex: Rgba32FImage,
        framerate: f32,
    ) -> Self {
        debug_assert_eq!(position_tex.dimensions(), normal_tex.dimensions());
        Self {
            name,
            position_tex,
            normal_tex,
            framerate,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position_tex(&self) -> &Rgba32FImage {
        &self.position_tex
    }

    pub fn normal_tex(&self) -> &Rgba32FImage {
        &self.normal_tex
    }

    pub fn framerate(&self) -> f32 {
        self.framerate
    }

    /// One texel column per vertex.
    pub fn vertex_count(&self) -> u32 {
        self.position_tex.width()
    }

    /// One texel row per frame.
    pub fn frame_count(&self) -> u32 {
        self.position_tex.height()
    }

    /// Clip length in seconds.
    pub fn duration(&self) -> f32 {
        self.frame_count() as f32 / self.framerate
    }

    /// Texture row for a normalized playback time. Wrapping and looping are
    /// the player's responsibility; input outside [0, 1] is clamped.
    pub fn row_for(&self, normalized_time: f32) -> u32 {
        let last = self.frame_count().saturating_sub(1);
        (normalized_time.clamp(0.0, 1.0) * last as f32).floor() as u32
    }
}

/// One produced asset inside a [`ClipOutput`] notification.
pub enum BakedAsset {
    Texture(BakedTexture),
    Clip(BakedClip),
}

/// Per-clip completion notification: two textures always, plus a clip asset
/// when configured. Ownership of the assets transfers to the receiver.
pub struct ClipOutput {
    /// Source animation clip name.
    pub clip: String,
    pub assets: Vec<BakedAsset>,
}
