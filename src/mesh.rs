use glam::Vec3;

/// Deformed mesh data captured for one animation frame. Produced by
/// [`SkinnedMesh::bake`] and consumed immediately by the frame encoder.
pub struct MeshSnapshot {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

/// Handle to the skinned mesh collaborator.
///
/// `reference_positions` must return the undeformed shared-mesh vertices and
/// stay constant for the lifetime of the handle; baked frames are stored
/// relative to it. `bake` samples the currently evaluated pose in world space.
pub trait SkinnedMesh {
    fn name(&self) -> &str;

    fn vertex_count(&self) -> u32;

    fn reference_positions(&self) -> Vec<Vec3>;

    fn bake(&self) -> MeshSnapshot;
}
