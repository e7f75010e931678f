use crate::geometry::Aabb;
use crate::scene::Side;
use glam::{DMat4, DVec3};

const EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    /// Unit direction
    pub direction: DVec3,
}

impl Ray {
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    #[inline]
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }

    /// Same ray expressed in another space
    pub fn transformed(&self, m: &DMat4) -> Ray {
        Ray::new(m.transform_point3(self.origin), m.transform_vector3(self.direction))
    }

    /// Entry distance into `bounds` (0 when starting inside)
    pub fn intersect_aabb(&self, bounds: &Aabb) -> Option<f64> {
        if bounds.is_empty() {
            return None;
        }
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;
        for axis in 0..3 {
            let origin = self.origin[axis];
            let dir = self.direction[axis];
            let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
            if dir.abs() < EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir;
            let (mut t0, mut t1) = ((lo - origin) * inv, (hi - origin) * inv);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        if t_max < 0.0 {
            return None;
        }
        Some(t_min.max(0.0))
    }

    /// Möller–Trumbore. `side` decides which winding counts as a hit.
    pub fn intersect_triangle(&self, a: DVec3, b: DVec3, c: DVec3, side: Side) -> Option<f64> {
        let edge1 = b - a;
        let edge2 = c - a;
        let normal = edge1.cross(edge2);
        let facing = self.direction.dot(normal);
        let culled = match side {
            Side::Front => facing >= 0.0,
            Side::Back => facing <= 0.0,
            Side::Double => false,
        };
        if culled {
            return None;
        }

        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(q) * inv_det;
        (t >= 0.0).then_some(t)
    }

    /// Squared distance between the ray and segment `v0..v1`, with the
    /// closest points on the ray and on the segment
    pub fn distance_sq_to_segment(&self, v0: DVec3, v1: DVec3) -> (f64, DVec3, DVec3) {
        let seg_center = (v0 + v1) * 0.5;
        let seg_dir = (v1 - v0).normalize_or_zero();
        let seg_extent = v0.distance(v1) * 0.5;
        let diff = self.origin - seg_center;
        let a01 = -self.direction.dot(seg_dir);
        let b0 = diff.dot(self.direction);
        let b1 = -diff.dot(seg_dir);
        let det = (1.0 - a01 * a01).abs();

        let (s0, s1) = if det > EPSILON {
            let mut s0 = a01 * b1 - b0;
            let mut s1 = a01 * b0 - b1;
            let ext_det = seg_extent * det;
            if s0 >= 0.0 {
                if s1 >= -ext_det && s1 <= ext_det {
                    let inv = 1.0 / det;
                    s0 *= inv;
                    s1 *= inv;
                } else {
                    s1 = if s1 > ext_det { seg_extent } else { -seg_extent };
                    s0 = (-(a01 * s1 + b0)).max(0.0);
                }
            } else if s1 >= -ext_det && s1 <= ext_det {
                s0 = 0.0;
                s1 = (-b1).clamp(-seg_extent, seg_extent);
            } else {
                s1 = if s1 > ext_det { seg_extent } else { -seg_extent };
                s0 = (-(a01 * s1 + b0)).max(0.0);
                if s0 == 0.0 {
                    s1 = (-b1).clamp(-seg_extent, seg_extent);
                }
            }
            (s0, s1)
        } else {
            // Parallel
            let s1 = if a01 > 0.0 { -seg_extent } else { seg_extent };
            let s0 = (-(a01 * s1 + b0)).max(0.0);
            (s0, s1)
        };

        let on_ray = self.at(s0);
        let on_segment = seg_center + seg_dir * s1;
        (on_ray.distance_squared(on_segment), on_ray, on_segment)
    }

    /// Distance along the ray to the nearest point of a sphere
    pub fn intersect_sphere(&self, center: DVec3, radius: f64) -> Option<f64> {
        let to_center = center - self.origin;
        let t_closest = to_center.dot(self.direction);
        let d2 = to_center.length_squared() - t_closest * t_closest;
        let r2 = radius * radius;
        if d2 > r2 {
            return None;
        }
        let half = (r2 - d2).sqrt();
        let (t0, t1) = (t_closest - half, t_closest + half);
        if t1 < 0.0 {
            return None;
        }
        Some(if t0 < 0.0 { t1 } else { t0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down_ray(x: f64, y: f64) -> Ray {
        Ray::new(DVec3::new(x, y, 10.0), DVec3::NEG_Z)
    }

    #[test]
    fn test_triangle_front_and_back() {
        let (a, b, c) = (DVec3::ZERO, DVec3::X, DVec3::Y);
        assert_eq!(down_ray(0.2, 0.2).intersect_triangle(a, b, c, Side::Front), Some(10.0));
        assert_eq!(down_ray(0.2, 0.2).intersect_triangle(a, c, b, Side::Front), None);
        assert_eq!(down_ray(0.2, 0.2).intersect_triangle(a, c, b, Side::Double), Some(10.0));
        assert_eq!(down_ray(0.2, 0.2).intersect_triangle(a, c, b, Side::Back), Some(10.0));
        assert_eq!(down_ray(0.8, 0.8).intersect_triangle(a, b, c, Side::Double), None);
    }

    #[test]
    fn test_aabb() {
        let bounds = Aabb {
            min: DVec3::splat(-1.0),
            max: DVec3::splat(1.0),
        };
        assert_eq!(down_ray(0.0, 0.0).intersect_aabb(&bounds), Some(9.0));
        assert_eq!(down_ray(2.0, 0.0).intersect_aabb(&bounds), None);
        let inside = Ray::new(DVec3::ZERO, DVec3::X);
        assert_eq!(inside.intersect_aabb(&bounds), Some(0.0));
        let away = Ray::new(DVec3::new(0.0, 0.0, 5.0), DVec3::Z);
        assert_eq!(away.intersect_aabb(&bounds), None);
    }

    #[test]
    fn test_segment_distance() {
        let ray = down_ray(0.0, 0.5);
        let (d2, on_ray, on_segment) =
            ray.distance_sq_to_segment(DVec3::new(-1.0, 0.0, 0.0), DVec3::new(1.0, 0.0, 0.0));
        assert!((d2 - 0.25).abs() < 1e-9);
        assert!((on_ray - DVec3::new(0.0, 0.5, 0.0)).length() < 1e-9);
        assert!(on_segment.length() < 1e-9);

        // Past the segment end the closest point clamps to the endpoint
        let (d2, _, on_segment) =
            down_ray(3.0, 0.0).distance_sq_to_segment(DVec3::new(-1.0, 0.0, 0.0), DVec3::X);
        assert!((d2 - 4.0).abs() < 1e-9);
        assert!((on_segment - DVec3::X).length() < 1e-9);
    }

    #[test]
    fn test_sphere() {
        assert_eq!(down_ray(0.0, 0.0).intersect_sphere(DVec3::ZERO, 1.0), Some(9.0));
        assert_eq!(down_ray(2.0, 0.0).intersect_sphere(DVec3::ZERO, 1.0), None);
    }

    #[test]
    fn test_transformed_ray() {
        let m = DMat4::from_translation(DVec3::new(0.0, 0.0, -4.0));
        let ray = down_ray(0.0, 0.0).transformed(&m);
        assert_eq!(ray.origin, DVec3::new(0.0, 0.0, 6.0));
        assert_eq!(ray.direction, DVec3::NEG_Z);
    }
}
