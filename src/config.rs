use crate::animation::{AnimationClip, AnimationPlayer};
use crate::error::BakeError;
use crate::mesh::SkinnedMesh;

/// Input to a bake, assembled by the editor-side collaborator. Handles are
/// owned so a started job can never alias caller-held state.
pub struct BakeConfig {
    pub player: Option<Box<dyn AnimationPlayer>>,
    pub mesh: Option<Box<dyn SkinnedMesh>>,
    /// Clips to convert, in output order.
    pub clips: Vec<AnimationClip>,
    /// Target framerate of the baked animations.
    pub framerate: f32,
    /// Also synthesize a [`crate::clip::BakedClip`] per animation.
    pub generate_clips: bool,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            player: None,
            mesh: None,
            clips: Vec::new(),
            framerate: 30.0,
            generate_clips: true,
        }
    }
}

/// Immutable job parameters captured from a [`BakeConfig`] at start. Frame
/// counts are precomputed here so every configuration error surfaces before
/// any GPU work.
pub(crate) struct JobSettings {
    pub mesh_name: String,
    pub vertex_count: u32,
    /// Clip plus its derived output texture height.
    pub clips: Vec<(AnimationClip, u32)>,
    pub framerate: f32,
    pub generate_clips: bool,
}

pub(crate) struct ValidatedConfig {
    pub player: Box<dyn AnimationPlayer>,
    pub mesh: Box<dyn SkinnedMesh>,
    pub settings: JobSettings,
}

impl BakeConfig {
    pub(crate) fn validate(self) -> Result<ValidatedConfig, BakeError> {
        let player = self.player.ok_or(BakeError::MissingPlayer)?;
        let mesh = self.mesh.ok_or(BakeError::MissingMesh)?;
        if self.clips.is_empty() {
            return Err(BakeError::NoClips);
        }
        if !(self.framerate > 0.0) || !self.framerate.is_finite() {
            return Err(BakeError::InvalidFramerate(self.framerate));
        }
        let vertex_count = mesh.vertex_count();
        if vertex_count == 0 {
            return Err(BakeError::EmptyMesh);
        }

        let mut clips = Vec::with_capacity(self.clips.len());
        for clip in self.clips {
            let frames = clip.validate(self.framerate)?;
            clips.push((clip, frames));
        }

        Ok(ValidatedConfig {
            settings: JobSettings {
                mesh_name: mesh.name().to_string(),
                vertex_count,
                clips,
                framerate: self.framerate,
                generate_clips: self.generate_clips,
            },
            player,
            mesh,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    use crate::mesh::MeshSnapshot;

    struct NullPlayer;
    impl AnimationPlayer for NullPlayer {
        fn play(&mut self, _clip: &str, _normalized_time: f32) {}
        fn set_speed(&mut self, _speed: f32) {}
        fn update(&mut self, _dt: f32) {}
        fn root_position(&self) -> Vec3 {
            Vec3::ZERO
        }
        fn reset(&mut self) {}
    }

    struct TriMesh;
    impl SkinnedMesh for TriMesh {
        fn name(&self) -> &str {
            "tri"
        }
        fn vertex_count(&self) -> u32 {
            3
        }
        fn reference_positions(&self) -> Vec<Vec3> {
            vec![Vec3::ZERO; 3]
        }
        fn bake(&self) -> MeshSnapshot {
            MeshSnapshot {
                positions: vec![Vec3::ZERO; 3],
                normals: vec![Vec3::Z; 3],
            }
        }
    }

    fn valid() -> BakeConfig {
        BakeConfig {
            player: Some(Box::new(NullPlayer)),
            mesh: Some(Box::new(TriMesh)),
            clips: vec![AnimationClip::new("walk", 1.0)],
            framerate: 30.0,
            generate_clips: true,
        }
    }

    #[test]
    fn accepts_a_complete_config() {
        let v = valid().validate().unwrap();
        assert_eq!(v.settings.mesh_name, "tri");
        assert_eq!(v.settings.vertex_count, 3);
        assert_eq!(v.settings.clips.len(), 1);
        assert_eq!(v.settings.clips[0].1, 30);
    }

    #[test]
    fn rejects_missing_player() {
        let mut cfg = valid();
        cfg.player = None;
        assert!(matches!(cfg.validate(), Err(BakeError::MissingPlayer)));
    }

    #[test]
    fn rejects_missing_mesh() {
        let mut cfg = valid();
        cfg.mesh = None;
        assert!(matches!(cfg.validate(), Err(BakeError::MissingMesh)));
    }

    #[test]
    fn rejects_empty_clip_list() {
        let mut cfg = valid();
        cfg.clips.clear();
        assert!(matches!(cfg.validate(), Err(BakeError::NoClips)));
    }

    #[test]
    fn rejects_non_positive_framerate() {
        for framerate in [0.0, -30.0, f32::NAN] {
            let mut cfg = valid();
            cfg.framerate = framerate;
            assert!(matches!(
                cfg.validate(),
                Err(BakeError::InvalidFramerate(_))
            ));
        }
    }

    #[test]
    fn rejects_zero_frame_clip_before_any_work() {
        let mut cfg = valid();
        cfg.clips.push(AnimationClip::new("empty", 0.0));
        assert!(matches!(cfg.validate(), Err(BakeError::EmptyClip { .. })));
    }
}
