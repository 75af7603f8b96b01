//! Narrowphase shape-pair contact generation
//!
//! Each broadphase candidate pair is tested shape by shape. Dynamic
//! bodies in this game are circles, so the supported combinations are
//! circle against circle, segment and plane; any other combination is
//! reported as no contact.

use glam::Vec2;

use super::body::{Body, ShapeKind};
use crate::math::Vec2Ext;

/// One contact point between two shapes. Normal points from shape A
/// toward shape B.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub point: Vec2,
    pub normal: Vec2,
    pub penetration: f32,
}

/// Test one shape of `a` against one shape of `b`.
pub fn collide(a: &Body, shape_a: usize, b: &Body, shape_b: usize) -> Option<Contact> {
    let sa = &a.shapes[shape_a];
    let sb = &b.shapes[shape_b];
    let pa = a.shape_world_position(sa);
    let pb = b.shape_world_position(sb);

    match (sa.kind, sb.kind) {
        (ShapeKind::Circle { radius: ra }, ShapeKind::Circle { radius: rb }) => {
            circle_circle(pa, ra, pb, rb)
        }
        (ShapeKind::Circle { radius }, ShapeKind::Segment { a: s0, b: s1 }) => {
            let w0 = b.position + s0.rotated(b.angle) + sb.offset.rotated(b.angle);
            let w1 = b.position + s1.rotated(b.angle) + sb.offset.rotated(b.angle);
            circle_segment(pa, radius, w0, w1).map(flip)
        }
        (ShapeKind::Segment { a: s0, b: s1 }, ShapeKind::Circle { radius }) => {
            let w0 = a.position + s0.rotated(a.angle) + sa.offset.rotated(a.angle);
            let w1 = a.position + s1.rotated(a.angle) + sa.offset.rotated(a.angle);
            circle_segment(pb, radius, w0, w1)
        }
        (ShapeKind::Circle { radius }, ShapeKind::Plane) => {
            circle_plane(pa, radius, pb, plane_normal(b.angle)).map(flip)
        }
        (ShapeKind::Plane, ShapeKind::Circle { radius }) => {
            circle_plane(pb, radius, pa, plane_normal(a.angle))
        }
        // Static-vs-static geometry never reaches narrowphase; remaining
        // combinations are not meaningful for this body population.
        _ => None,
    }
}

/// World normal of a plane shape on a body with the given angle
fn plane_normal(angle: f32) -> Vec2 {
    Vec2::Y.rotated(angle)
}

fn flip(mut contact: Contact) -> Contact {
    contact.normal = -contact.normal;
    contact
}

/// Circle A vs circle B; normal from A to B
fn circle_circle(ca: Vec2, ra: f32, cb: Vec2, rb: f32) -> Option<Contact> {
    let delta = cb - ca;
    let dist_sq = delta.length_squared();
    let sum = ra + rb;
    if dist_sq >= sum * sum {
        return None;
    }
    let dist = dist_sq.sqrt();
    // Coincident centers: pick an arbitrary separation axis
    let normal = if dist > 1e-9 { delta / dist } else { Vec2::X };
    let penetration = sum - dist;
    Some(Contact {
        point: ca + normal * (ra - penetration * 0.5),
        normal,
        penetration,
    })
}

/// Plane vs circle; normal from the plane to the circle
fn circle_plane(center: Vec2, radius: f32, plane_point: Vec2, normal: Vec2) -> Option<Contact> {
    let signed = (center - plane_point).dot(normal);
    if signed >= radius {
        return None;
    }
    Some(Contact {
        point: center - normal * signed,
        normal,
        penetration: radius - signed,
    })
}

/// Segment vs circle; normal from the segment to the circle
fn circle_segment(center: Vec2, radius: f32, s0: Vec2, s1: Vec2) -> Option<Contact> {
    let seg = s1 - s0;
    let len_sq = seg.length_squared();
    let t = if len_sq > 1e-12 {
        ((center - s0).dot(seg) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = s0 + seg * t;
    let delta = center - closest;
    let dist_sq = delta.length_squared();
    if dist_sq >= radius * radius {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist > 1e-9 {
        delta / dist
    } else {
        // Center exactly on the segment: push out perpendicular
        Vec2::new(-seg.y, seg.x).normalize_or_zero()
    };
    Some(Contact {
        point: closest,
        normal,
        penetration: radius - dist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::Shape;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_circle_circle_overlap_and_normal() {
        let a = Body::dynamic(Vec2::ZERO, 1.0).with_shape(Shape::circle(1.0));
        let b = Body::dynamic(Vec2::new(1.5, 0.0), 1.0).with_shape(Shape::circle(1.0));
        let contact = collide(&a, 0, &b, 0).expect("should overlap");
        assert_eq!(contact.normal, Vec2::X);
        assert!((contact.penetration - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_circle_circle_miss() {
        let a = Body::dynamic(Vec2::ZERO, 1.0).with_shape(Shape::circle(1.0));
        let b = Body::dynamic(Vec2::new(3.0, 0.0), 1.0).with_shape(Shape::circle(1.0));
        assert!(collide(&a, 0, &b, 0).is_none());
    }

    #[test]
    fn test_ball_on_floor_plane() {
        // Plane at origin with +Y normal; ball resting slightly inside
        let floor = Body::static_at(Vec2::ZERO).with_shape(Shape::plane());
        let ball = Body::dynamic(Vec2::new(0.0, 0.4), 1.0).with_shape(Shape::circle(0.5));
        let contact = collide(&ball, 0, &floor, 0).expect("should touch");
        // Normal points from ball toward plane
        assert_eq!(contact.normal, -Vec2::Y);
        assert!((contact.penetration - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_rotated_plane_normal() {
        // Plane rotated a quarter turn: normal becomes -X
        let mut wall = Body::static_at(Vec2::ZERO).with_shape(Shape::plane());
        wall.angle = FRAC_PI_2;
        let ball = Body::dynamic(Vec2::new(-0.3, 0.0), 1.0).with_shape(Shape::circle(0.5));
        let contact = collide(&wall, 0, &ball, 0).expect("should touch");
        assert!((contact.normal - Vec2::new(-1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_circle_segment_side_hit() {
        let wall = Body::static_at(Vec2::ZERO)
            .with_shape(Shape::segment(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0)));
        let ball = Body::dynamic(Vec2::new(0.5, 0.3), 1.0).with_shape(Shape::circle(0.5));
        let contact = collide(&wall, 0, &ball, 0).expect("should touch");
        assert_eq!(contact.normal, Vec2::Y);
        assert!((contact.penetration - 0.2).abs() < 1e-6);
        assert_eq!(contact.point, Vec2::new(0.5, 0.0));
    }

    #[test]
    fn test_circle_segment_endpoint_cap() {
        let wall = Body::static_at(Vec2::ZERO)
            .with_shape(Shape::segment(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0)));
        let ball = Body::dynamic(Vec2::new(2.3, 0.0), 1.0).with_shape(Shape::circle(0.5));
        let contact = collide(&wall, 0, &ball, 0).expect("cap should touch");
        assert_eq!(contact.normal, Vec2::X);
        assert!((contact.penetration - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_segment_pair_unsupported() {
        let a = Body::static_at(Vec2::ZERO)
            .with_shape(Shape::segment(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)));
        let b = Body::static_at(Vec2::ZERO)
            .with_shape(Shape::segment(Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0)));
        assert!(collide(&a, 0, &b, 0).is_none());
    }
}
