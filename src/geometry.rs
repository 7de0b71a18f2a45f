use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Tolerance shared by window, progress and length comparisons.
pub const EPSILON: f32 = 1e-6;

/// Symmetric cubic ease: slow start, slow finish, exact 0.5 at the midpoint.
pub fn ease_in_out_cubic(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    if x < 0.5 {
        4.0 * x * x * x
    } else {
        1.0 - (-2.0 * x + 2.0).powi(3) / 2.0
    }
}

pub fn ease_out_quad(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    1.0 - (1.0 - x) * (1.0 - x)
}

/// Half-line used for picking.
///
/// The direction is not required to be unit length: rays transformed into a
/// node's local frame keep the world-space parameterisation so hit distances
/// from differently transformed meshes remain comparable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Maps the ray through an affine transform without renormalizing.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self {
            origin: matrix.transform_point3(self.origin),
            direction: matrix.transform_vector3(self.direction),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Self { min, max })
    }

    /// Slab test; returns the entry distance, or the exit distance when the
    /// origin is inside the box.
    pub fn ray_hit_t(&self, ray: &Ray) -> Option<f32> {
        let inv = Vec3::new(
            recip_or_inf(ray.direction.x),
            recip_or_inf(ray.direction.y),
            recip_or_inf(ray.direction.z),
        );

        let mut tmin = f32::NEG_INFINITY;
        let mut tmax = f32::INFINITY;
        for axis in 0..3 {
            let origin = ray.origin[axis];
            if inv[axis].is_infinite() {
                // Parallel to the slab: miss unless the origin lies between the planes.
                if origin < self.min[axis] || origin > self.max[axis] {
                    return None;
                }
                continue;
            }
            let mut t0 = (self.min[axis] - origin) * inv[axis];
            let mut t1 = (self.max[axis] - origin) * inv[axis];
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            tmin = tmin.max(t0);
            tmax = tmax.min(t1);
            if tmin > tmax {
                return None;
            }
        }

        if tmax < 0.0 {
            return None;
        }
        Some(if tmin >= 0.0 { tmin } else { tmax })
    }
}

fn recip_or_inf(value: f32) -> f32 {
    if value != 0.0 {
        1.0 / value
    } else {
        f32::INFINITY
    }
}

/// Möller–Trumbore ray/triangle intersection, double sided.
pub fn ray_triangle_hit_t(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let edge1 = b - a;
    let edge2 = c - a;
    let pvec = ray.direction.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < EPSILON * EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let tvec = ray.origin - a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(edge1);
    let v = ray.direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;
    (t > EPSILON).then_some(t)
}
