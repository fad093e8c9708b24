use thiserror::Error;

/// Everything that can stop a bake. Cancellation is not in here on purpose:
/// aborting is a state transition, not a failure.
#[derive(Debug, Error)]
pub enum BakeError {
    #[error("no animation player configured")]
    MissingPlayer,
    #[error("no skinned mesh configured")]
    MissingMesh,
    #[error("no animation clips configured")]
    NoClips,
    #[error("framerate must be positive, got {0}")]
    InvalidFramerate(f32),
    #[error("clip `{name}` bakes to zero frames ({duration}s at {framerate} fps)")]
    EmptyClip {
        name: String,
        duration: f32,
        framerate: f32,
    },
    #[error("mesh has no vertices")]
    EmptyMesh,

    #[error("vertex count changed during bake: expected {expected}, got {got}")]
    VertexCountMismatch { expected: u32, got: u32 },
    #[error("frame row {row} out of range for texture height {height}")]
    RowOutOfRange { row: u32, height: u32 },

    #[error("no suitable gpu adapter found")]
    NoAdapter,
    #[error("gpu device request failed: {0}")]
    DeviceRequest(String),
    #[error("gpu error: {0}")]
    Gpu(String),
    #[error("texture readback failed: {0}")]
    Readback(String),
}
