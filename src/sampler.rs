use crate::animation::{AnimationClip, AnimationPlayer};
use crate::encoder::{FrameEncoder, FrameSample};
use crate::error::BakeError;
use crate::mesh::SkinnedMesh;

/// Result of one sampler step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleStep {
    /// A pose was set and advanced; the skeletal evaluator needs one host
    /// tick to propagate it before the mesh can be baked.
    AwaitTick,
    /// The row at this index was encoded.
    FrameBaked(u32),
    /// Every frame of the clip has been encoded.
    Finished,
}

/// Produces the finite ordered sequence of baked frames for one clip as an
/// explicit resumable state machine: the driver calls [`ClipSampler::step`]
/// once per scheduler tick and the sampler picks up where it suspended.
///
/// Not restartable; each run is bound to one encoder whose reference pose was
/// captured before time was first set on the clip.
pub struct ClipSampler {
    clip: AnimationClip,
    framerate: f32,
    frame_count: u32,
    next_frame: u32,
    /// Set between the pose stage and the bake stage of a frame.
    pose_pending: bool,
}

impl ClipSampler {
    /// `frame_count` must be positive; zero frames is a configuration error
    /// the caller surfaces before constructing a sampler.
    pub fn new(clip: AnimationClip, framerate: f32, frame_count: u32) -> Self {
        debug_assert!(frame_count > 0);
        Self {
            clip,
            framerate,
            frame_count,
            next_frame: 0,
            pose_pending: false,
        }
    }

    pub fn finished(&self) -> bool {
        self.next_frame >= self.frame_count && !self.pose_pending
    }

    /// Frame index the next step works on.
    pub fn pending_frame(&self) -> u32 {
        self.next_frame
    }

    /// Normalized clip time of frame `i`: i / (N - 1), or 0 for a
    /// single-frame clip.
    fn normalized_time(&self, frame: u32) -> f32 {
        if self.frame_count > 1 {
            frame as f32 / (self.frame_count - 1) as f32
        } else {
            0.0
        }
    }

    pub fn step(
        &mut self,
        player: &mut dyn AnimationPlayer,
        mesh: &dyn SkinnedMesh,
        encoder: &mut impl FrameEncoder,
    ) -> Result<SampleStep, BakeError> {
        if self.finished() {
            return Ok(SampleStep::Finished);
        }

        if !self.pose_pending {
            // Pose stage: jump to the frame's absolute time and advance one
            // simulated step. Speed is pinned to zero by the orchestrator, so
            // time does not drift between the explicit sets.
            player.play(&self.clip.name, self.normalized_time(self.next_frame));
            player.update(1.0 / self.framerate);
            self.pose_pending = true;
            return Ok(SampleStep::AwaitTick);
        }

        // Bake stage: the evaluator had its tick, sample the deformed mesh.
        let snapshot = mesh.bake();
        let frame = FrameSample {
            positions: snapshot.positions,
            normals: snapshot.normals,
            root_position: player.root_position(),
            index: self.next_frame,
        };
        encoder.encode(&frame)?;
        self.pose_pending = false;
        let row = self.next_frame;
        self.next_frame += 1;
        Ok(SampleStep::FrameBaked(row))
    }
}
