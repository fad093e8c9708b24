use crossbeam::channel::Sender;

use crate::animation::AnimationPlayer;
use crate::clip::{BakedAsset, BakedClip, BakedTexture, ClipOutput};
use crate::config::{BakeConfig, JobSettings};
use crate::encoder::BakeBackend;
use crate::error::BakeError;
use crate::mesh::SkinnedMesh;
use crate::sampler::{ClipSampler, SampleStep};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// What one cooperative step accomplished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobProgress {
    /// A pose was set; resume after the next host tick.
    AwaitingTick { clip: usize, frame: u32 },
    FrameBaked { clip: usize, row: u32 },
    /// A clip was read back and its notification emitted.
    ClipFinished { clip: usize },
    /// The job is no longer running.
    Finished,
}

struct ActiveClip<E> {
    sampler: ClipSampler,
    encoder: E,
}

/// Drives one bake across the configured clips, one cooperative step per
/// [`BakeJob::advance`] call. One instance per job; once it leaves `Running`
/// it never runs again.
pub struct BakeJob<B: BakeBackend> {
    state: JobState,
    settings: JobSettings,
    player: Box<dyn AnimationPlayer>,
    mesh: Box<dyn SkinnedMesh>,
    clip_index: usize,
    current: Option<ActiveClip<B::Encoder>>,
    events: Sender<ClipOutput>,
}

impl<B: BakeBackend> BakeJob<B> {
    /// Validates the configuration; every configuration error surfaces here,
    /// before any GPU resource exists.
    pub fn new(config: BakeConfig, events: Sender<ClipOutput>) -> Result<Self, BakeError> {
        let validated = config.validate()?;
        Ok(Self {
            state: JobState::Idle,
            settings: validated.settings,
            player: validated.player,
            mesh: validated.mesh,
            clip_index: 0,
            current: None,
            events,
        })
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }

    /// `Idle` only; anything else is a spent job.
    pub fn start(&mut self) {
        if self.state != JobState::Idle {
            log::warn!("start ignored: job already {:?}", self.state);
            return;
        }
        self.state = JobState::Running;
        log::info!(
            "baking {} clip(s) of `{}` at {} fps",
            self.settings.clips.len(),
            self.settings.mesh_name,
            self.settings.framerate
        );
    }

    /// Stops between frames: the in-flight clip's encoder and textures are
    /// dropped whole, never mid-dispatch. No-op unless `Running`.
    pub fn abort(&mut self) {
        if self.state != JobState::Running {
            return;
        }
        self.current = None;
        self.state = JobState::Aborted;
        log::info!("bake of `{}` aborted", self.settings.mesh_name);
    }

    /// One cooperative step. Any error transitions the job to `Aborted` and
    /// discards the in-flight textures; nothing partial is ever emitted.
    pub fn advance(&mut self, backend: &B) -> Result<JobProgress, BakeError> {
        if self.state != JobState::Running {
            return Ok(JobProgress::Finished);
        }
        match self.try_advance(backend) {
            Ok(progress) => Ok(progress),
            Err(e) => {
                log::warn!("bake failed on clip {}: {e}", self.clip_index);
                self.current = None;
                self.state = JobState::Aborted;
                Err(e)
            }
        }
    }

    fn try_advance(&mut self, backend: &B) -> Result<JobProgress, BakeError> {
        if self.current.is_none() {
            self.begin_clip(backend)?;
        }

        let clip = self.clip_index;
        let current = self.current.as_mut().expect("active clip");
        let step = current
            .sampler
            .step(self.player.as_mut(), self.mesh.as_ref(), &mut current.encoder)?;
        match step {
            SampleStep::AwaitTick => Ok(JobProgress::AwaitingTick {
                clip,
                frame: current.sampler.pending_frame(),
            }),
            SampleStep::FrameBaked(row) if !current.sampler.finished() => {
                Ok(JobProgress::FrameBaked { clip, row })
            }
            SampleStep::FrameBaked(_) | SampleStep::Finished => self.finish_clip(backend),
        }
    }

    fn begin_clip(&mut self, backend: &B) -> Result<(), BakeError> {
        let (clip, frames) = self.settings.clips[self.clip_index].clone();

        // Absolute time gets set non-monotonically across clips; force a full
        // evaluator reset rather than assume pose continuity.
        self.player.reset();
        self.player.play(&clip.name, 0.0);
        self.player.set_speed(0.0);

        // Captured before any time was set on this clip.
        let reference = self.mesh.reference_positions();
        if reference.len() as u32 != self.settings.vertex_count {
            return Err(BakeError::VertexCountMismatch {
                expected: self.settings.vertex_count,
                got: reference.len() as u32,
            });
        }

        let label = format!("{}_{}", self.settings.mesh_name, clip.name);
        let encoder = backend.create_encoder(&reference, frames, &label)?;
        log::info!(
            "baking `{}`: {} vertices x {} frames",
            label,
            self.settings.vertex_count,
            frames
        );
        self.current = Some(ActiveClip {
            sampler: ClipSampler::new(clip, self.settings.framerate, frames),
            encoder,
        });
        Ok(())
    }

    fn finish_clip(&mut self, backend: &B) -> Result<JobProgress, BakeError> {
        let clip_index = self.clip_index;
        let (clip, _) = self.settings.clips[clip_index].clone();
        let active = self.current.take().expect("active clip");
        let textures = backend.finish(active.encoder)?;

        let base = format!("{}_{}", self.settings.mesh_name, clip.name);
        let mut assets = Vec::with_capacity(3);
        if self.settings.generate_clips {
            assets.push(BakedAsset::Clip(BakedClip::new(
                base.clone(),
                textures.position.clone(),
                textures.normal.clone(),
                self.settings.framerate,
            )));
        }
        assets.insert(
            0,
            BakedAsset::Texture(BakedTexture {
                name: format!("{base}_position"),
                image: textures.position,
            }),
        );
        assets.insert(
            1,
            BakedAsset::Texture(BakedTexture {
                name: format!("{base}_normals"),
                image: textures.normal,
            }),
        );

        if self
            .events
            .send(ClipOutput {
                clip: clip.name.clone(),
                assets,
            })
            .is_err()
        {
            log::warn!("no listener for rendered clip `{}`", clip.name);
        }
        log::info!("rendered clip `{base}`");

        self.clip_index += 1;
        if self.clip_index == self.settings.clips.len() {
            self.state = JobState::Completed;
            log::info!("bake of `{}` completed", self.settings.mesh_name);
            Ok(JobProgress::Finished)
        } else {
            Ok(JobProgress::ClipFinished { clip: clip_index })
        }
    }
}
