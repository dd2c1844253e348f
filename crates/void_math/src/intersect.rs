//! Intersection tests used by sight traces and hitscan:
//! ray vs box (slab method), ray vs sphere, and segment vs sphere.

use crate::bounds::AABB;
use crate::ray::Ray;
use crate::vector::Vec3;

/// Ray-AABB intersection using the slab method
///
/// Returns the distance along the ray to the entry point (or exit point
/// when the origin is inside), or None if the ray misses.
pub fn ray_aabb(ray: &Ray, aabb: &AABB) -> Option<f32> {
    let inv_dir = ray.inverse_direction();

    let t1 = (aabb.min.x - ray.origin.x) * inv_dir.x;
    let t2 = (aabb.max.x - ray.origin.x) * inv_dir.x;
    let t3 = (aabb.min.y - ray.origin.y) * inv_dir.y;
    let t4 = (aabb.max.y - ray.origin.y) * inv_dir.y;
    let t5 = (aabb.min.z - ray.origin.z) * inv_dir.z;
    let t6 = (aabb.max.z - ray.origin.z) * inv_dir.z;

    // NaN from 0 * inf (origin on a slab plane with a parallel ray) is
    // dropped by f32::min/max, which keep the other operand.
    let tmin = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
    let tmax = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

    if tmax < 0.0 || tmin > tmax {
        None
    } else {
        Some(if tmin < 0.0 { tmax } else { tmin })
    }
}

/// Ray-AABB intersection returning the face normal that was hit
pub fn ray_aabb_with_normal(ray: &Ray, aabb: &AABB) -> Option<(f32, Vec3)> {
    let t = ray_aabb(ray, aabb)?;
    let point = ray.at(t);

    let epsilon = 0.0001;
    let normal = if (point.x - aabb.min.x).abs() < epsilon {
        Vec3::NEG_X
    } else if (point.x - aabb.max.x).abs() < epsilon {
        Vec3::X
    } else if (point.y - aabb.min.y).abs() < epsilon {
        Vec3::NEG_Y
    } else if (point.y - aabb.max.y).abs() < epsilon {
        Vec3::Y
    } else if (point.z - aabb.min.z).abs() < epsilon {
        Vec3::NEG_Z
    } else {
        Vec3::Z
    };

    Some((t, normal))
}

/// Ray-Sphere intersection with center and radius
///
/// Returns the nearest positive distance, or None.
pub fn ray_sphere_at(ray: &Ray, center: Vec3, radius: f32) -> Option<f32> {
    let oc = ray.origin - center;
    let a = ray.direction.dot(ray.direction);
    let b = 2.0 * oc.dot(ray.direction);
    let c = oc.dot(oc) - radius * radius;
    let discriminant = b * b - 4.0 * a * c;

    if discriminant < 0.0 || a <= 0.0 {
        return None;
    }
    let sqrt_d = discriminant.sqrt();
    let t1 = (-b - sqrt_d) / (2.0 * a);
    let t2 = (-b + sqrt_d) / (2.0 * a);

    if t1 > 0.0 {
        Some(t1)
    } else if t2 > 0.0 {
        Some(t2)
    } else {
        None
    }
}

/// Does the segment `from -> to` pass within `radius` of `center`?
///
/// Returns the distance from `from` to the first contact.
pub fn segment_sphere(from: Vec3, to: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let length = from.distance(to);
    if length <= f32::EPSILON {
        return (from.distance(center) <= radius).then_some(0.0);
    }
    if from.distance(center) <= radius {
        return Some(0.0);
    }
    let ray = Ray::from_points(from, to);
    ray_sphere_at(&ray, center, radius).filter(|t| *t <= length)
}
