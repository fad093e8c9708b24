use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::BakeError;

/// Descriptor of an animation clip known to the player.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    /// Length in seconds.
    pub duration: f32,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }

    /// Number of texture rows this clip produces at the given framerate.
    pub fn frame_count(&self, framerate: f32) -> u32 {
        (self.duration * framerate).ceil() as u32
    }

    pub(crate) fn validate(&self, framerate: f32) -> Result<u32, BakeError> {
        let frames = self.frame_count(framerate);
        if frames == 0 {
            return Err(BakeError::EmptyClip {
                name: self.name.clone(),
                duration: self.duration,
                framerate,
            });
        }
        Ok(frames)
    }
}

/// Handle to the collaborator that plays animations and drives the skeletal
/// evaluator. The bake pins playback speed to zero and sets absolute
/// normalized times itself, so a pose never drifts between explicit sets.
pub trait AnimationPlayer {
    /// Jump playback of `clip` to `normalized_time` in [0, 1].
    fn play(&mut self, clip: &str, normalized_time: f32);

    fn set_speed(&mut self, speed: f32);

    /// Advance the player by one simulated step of `dt` seconds.
    fn update(&mut self, dt: f32);

    /// Root bone translation for the current step.
    fn root_position(&self) -> Vec3;

    /// Full evaluator reset. Called between clips: pose output is not assumed
    /// deterministic when absolute time is set non-monotonically across clips.
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_rounds_up() {
        assert_eq!(AnimationClip::new("walk", 1.0).frame_count(30.0), 30);
        assert_eq!(AnimationClip::new("blink", 0.034).frame_count(30.0), 2);
        assert_eq!(AnimationClip::new("tap", 0.01).frame_count(30.0), 1);
    }

    #[test]
    fn zero_length_clip_is_a_configuration_error() {
        let clip = AnimationClip::new("empty", 0.0);
        assert_eq!(clip.frame_count(30.0), 0);
        assert!(matches!(
            clip.validate(30.0),
            Err(BakeError::EmptyClip { .. })
        ));
    }

    #[test]
    fn one_second_at_thirty_fps_is_thirty_rows() {
        assert_eq!(AnimationClip::new("run", 1.0).validate(30.0).unwrap(), 30);
    }
}
