use crate::BoundingBox;

/// Scene the pipeline renders; implemented by the embedding renderer.
pub trait Scene {
    /// Returns all of the geometry instances, in a stable order.
    fn geometry_instances(&self) -> Vec<GeometryInstance>;

    /// Whether the scene has an environment map (required to build the
    /// environment-importance field).
    fn has_env_map(&self) -> bool;

    fn uses_emissive_lights(&self) -> bool;

    /// Refreshes the scene's collection of emissive lights; called once per
    /// frame, before any kernel gets dispatched.
    fn refresh_emissive_lights(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeometryInstance {
    /// Identifier, unique within the scene.
    pub id: u32,

    pub kind: GeometryKind,
    pub material: Option<MaterialInfo>,

    /// Bounds of the mesh the instance refers to.
    pub bounds: BoundingBox,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryKind {
    TriangleMesh,
    DisplacedTriangleMesh,
    Curve,
    Sdf,
    Procedural,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaterialInfo {
    pub id: u32,

    /// Whether light refracted or reflected by this material forms caustics
    /// (i.e. whether manifolds should be solved through it).
    pub is_caustic_bouncer: bool,

    pub is_uv_space_sampling: bool,
}
