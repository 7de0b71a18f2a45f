use glam::{Mat4, Vec2, Vec3};

use crate::geometry::Ray;
use crate::scene::{NodeKind, Scene};

/// Perspective camera used to turn pointer positions into picking rays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::look_at(Vec3::new(0.0, 2.0, 6.0), Vec3::ZERO)
    }
}

impl Camera {
    pub fn look_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            fov: 60.0,
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
        }
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    /// Builds the camera from the first camera node in `scene`, falling back
    /// to a default view of the origin.
    pub fn from_scene(scene: &Scene, aspect: f32) -> Self {
        let Some(id) = scene.find_by_kind(NodeKind::Camera) else {
            return Self::default().with_aspect(aspect);
        };
        let fov = scene.node(id).map_or(60.0, |node| node.fov);
        let world = scene.world_matrix(id);
        let position = world.transform_point3(Vec3::ZERO);
        let forward = world.transform_vector3(Vec3::NEG_Z);
        let up = world.transform_vector3(Vec3::Y);
        let target = if forward.length_squared() > f32::EPSILON {
            position + forward.normalize()
        } else {
            Vec3::ZERO
        };
        Self {
            position,
            target,
            up: up.try_normalize().unwrap_or(Vec3::Y),
            fov,
            aspect,
            ..Self::default()
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(
            self.fov.to_radians(),
            self.aspect.max(0.01),
            self.near,
            self.far,
        )
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Ray from the near plane through normalized device coordinates
    /// (-1..1 on both axes, +y up).
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let inverse = self.view_proj().inverse();
        let near = inverse.project_point3(ndc.extend(-1.0));
        let far = inverse.project_point3(ndc.extend(1.0));
        Ray::new(near, far - near)
    }
}
