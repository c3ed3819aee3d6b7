//! Black-box coverage of the light-encoding contract (§3.4): degenerate
//! rejection, radius clamping, and the color-normalization rules the
//! shader-side decoders rely on. Complements the in-module unit tests with
//! scenarios spanning more than one light kind at once.

use rtcore::config::MIN_SPHERE_RADIUS;
use rtcore::light::{encoder::*, LightKind};
use rtcore::math::Vec3;

const WHITE: Vec3 = Vec3 { x: 1.0, y: 1.0, z: 1.0 };

#[test]
fn directional_direction_is_normalized_regardless_of_input_length() {
    let short = encode_directional(Vec3::new(0.0, -0.1, 0.0), 0.5, WHITE).unwrap();
    let long = encode_directional(Vec3::new(0.0, -100.0, 0.0), 0.5, WHITE).unwrap();
    assert!((short.data0.x - long.data0.x).abs() < 1e-5);
    assert!((short.data0.y - long.data0.y).abs() < 1e-5);
    assert!((short.data0.z - long.data0.z).abs() < 1e-5);
    let dir = Vec3::new(short.data0.x, short.data0.y, short.data0.z);
    assert!((dir.length() - 1.0).abs() < 1e-5);
}

/// A radius already at or above the floor passes through unclamped; only
/// radii strictly below it get lifted.
#[test]
fn sphere_radius_at_floor_is_left_alone() {
    let l = encode_sphere(Vec3::ZERO, MIN_SPHERE_RADIUS, WHITE).unwrap();
    assert_eq!(l.data0.w, MIN_SPHERE_RADIUS);

    let l = encode_sphere(Vec3::ZERO, MIN_SPHERE_RADIUS * 10.0, WHITE).unwrap();
    assert_eq!(l.data0.w, MIN_SPHERE_RADIUS * 10.0);
}

/// Doubling a sphere light's radius quarters its stored exitance (inverse
/// square in the disk-exitance conversion), at a radius large enough that
/// neither call hits the clamp floor.
#[test]
fn sphere_exitance_falls_off_with_radius_squared() {
    let r = encode_sphere(Vec3::ZERO, 1.0, WHITE).unwrap();
    let r2 = encode_sphere(Vec3::ZERO, 2.0, WHITE).unwrap();
    assert!((r.color.x / r2.color.x - 4.0).abs() < 1e-4);
}

/// A triangle's stored color divides out its own area; halving every edge
/// quarters the area, so the stored color quadruples for the same input
/// radiant power.
#[test]
fn triangle_color_is_normalized_by_area() {
    let full = encode_triangle(
        [Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0)],
        WHITE,
    )
    .unwrap();
    let half = encode_triangle(
        [Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
        WHITE,
    )
    .unwrap();
    assert!((half.color.x / full.color.x - 4.0).abs() < 1e-4);
}

/// Every encoded kind discriminant round-trips into the record it produced.
#[test]
fn encoded_kind_matches_constructor() {
    let d = encode_directional(Vec3::new(0.0, -1.0, 0.0), 0.1, WHITE).unwrap();
    assert_eq!(d.kind, LightKind::Directional);
    let s = encode_sphere(Vec3::ZERO, 1.0, WHITE).unwrap();
    assert_eq!(s.kind, LightKind::Sphere);
    let t = encode_triangle([Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)], WHITE)
        .unwrap();
    assert_eq!(t.kind, LightKind::Triangle);
    let sp = encode_spot(Vec3::ZERO, 1.0, Vec3::new(0.0, -1.0, 0.0), 0.9, 0.5, WHITE).unwrap();
    assert_eq!(sp.kind, LightKind::Spot);
}

/// Spot cone angles at the boundary (`cos_inner == cos_outer`, a
/// zero-width falloff) are legal; only an inverted cone is rejected.
#[test]
fn spot_accepts_zero_width_falloff_but_rejects_inverted_cone() {
    assert!(encode_spot(Vec3::ZERO, 1.0, Vec3::new(0.0, -1.0, 0.0), 0.7, 0.7, WHITE).is_some());
    assert!(encode_spot(Vec3::ZERO, 1.0, Vec3::new(0.0, -1.0, 0.0), 0.5, 0.9, WHITE).is_none());
}

/// Every light kind is rejected uniformly once the color sum drops below
/// the threshold, regardless of otherwise-valid geometry.
#[test]
fn every_kind_rejects_dim_color() {
    let dim = Vec3::new(0.00001, 0.00001, 0.00001);
    assert!(encode_directional(Vec3::new(0.0, -1.0, 0.0), 0.1, dim).is_none());
    assert!(encode_sphere(Vec3::ZERO, 1.0, dim).is_none());
    assert!(encode_triangle([Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)], dim)
        .is_none());
    assert!(encode_spot(Vec3::ZERO, 1.0, Vec3::new(0.0, -1.0, 0.0), 0.9, 0.5, dim).is_none());
}
