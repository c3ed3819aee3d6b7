//! Light encoding (§3.4): packs the four light kinds into the uniform
//! [`LightEncoded`] record stored in the light array, and rejects
//! degenerate/invisible lights before they ever reach the array.

use crate::config::{MIN_COLOR_SUM, MIN_SPHERE_RADIUS};
use crate::math::{Vec3, Vec4, PI};

/// Discriminant stored alongside a [`LightEncoded`] record; mirrors the
/// shader-side `kind` field decoded by `decodeAsDirectionalLight` & co.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LightKind {
	Directional = 0,
	Sphere = 1,
	Triangle = 2,
	Spot = 3,
}

/// Uniform light record (§3.4): `color` plus three `vec4` data lanes whose
/// meaning depends on `kind`.
#[derive(Debug, Clone, Copy)]
pub struct LightEncoded {
	pub color: Vec3,
	pub kind: LightKind,
	pub data0: Vec4,
	pub data1: Vec4,
	pub data2: Vec4,
}

fn color_sum(color: Vec3) -> f32 {
	color.x + color.y + color.z
}

/// `color / (pi * r^2)`, turning radiant power into radiant exitance.
fn disk_exitance(color: Vec3, radius: f32) -> Vec3 {
	color / (PI * radius * radius)
}

/// Encodes a directional light (§3.4). `direction` need not be normalized.
/// Rejected if the color sum is below [`MIN_COLOR_SUM`] or `angular_radius`
/// is non-positive.
pub fn encode_directional(direction: Vec3, angular_radius: f32, color: Vec3) -> Option<LightEncoded> {
	if color_sum(color) < MIN_COLOR_SUM || angular_radius <= 0.0 {
		return None;
	}
	let dir = *direction.normalize();
	Some(LightEncoded {
		color,
		kind: LightKind::Directional,
		data0: dir.extend(angular_radius),
		data1: Vec4::ZERO,
		data2: Vec4::ZERO,
	})
}

/// Encodes a sphere light (§3.4). `radius` is clamped up to
/// [`MIN_SPHERE_RADIUS`] rather than rejected. Rejected if the color sum is
/// below [`MIN_COLOR_SUM`].
pub fn encode_sphere(center: Vec3, radius: f32, color: Vec3) -> Option<LightEncoded> {
	if color_sum(color) < MIN_COLOR_SUM {
		return None;
	}
	let radius = radius.max(MIN_SPHERE_RADIUS);
	Some(LightEncoded {
		color: disk_exitance(color, radius),
		kind: LightKind::Sphere,
		data0: center.extend(radius),
		data1: Vec4::ZERO,
		data2: Vec4::ZERO,
	})
}

/// Encodes a triangle (polygonal) light (§3.4). The three positions are
/// stored in `data0..2.xyz`; each `w` lane holds one component of the
/// unnormalized normal, whose length is `2 * area`. Rejected if the
/// triangle is degenerate (zero area) or the color sum is below
/// [`MIN_COLOR_SUM`].
pub fn encode_triangle(positions: [Vec3; 3], color: Vec3) -> Option<LightEncoded> {
	if color_sum(color) < MIN_COLOR_SUM {
		return None;
	}
	let normal = (positions[1] - positions[0]).cross(positions[2] - positions[0]);
	let len = normal.length();
	if len <= 0.0 {
		return None;
	}
	let area = len * 0.5;
	Some(LightEncoded {
		color: color / area,
		kind: LightKind::Triangle,
		data0: positions[0].extend(normal.x),
		data1: positions[1].extend(normal.y),
		data2: positions[2].extend(normal.z),
	})
}

/// Encodes a spot light (§3.4). `cos_inner` is the cosine of the inner
/// (full-brightness) cone angle, `cos_outer` the cosine of the outer
/// (falloff) cone angle; `cos_inner` must be `>= cos_outer`. Rejected if the
/// color sum is below [`MIN_COLOR_SUM`] or the cone angles are degenerate.
pub fn encode_spot(
	center: Vec3,
	radius: f32,
	direction: Vec3,
	cos_inner: f32,
	cos_outer: f32,
	color: Vec3,
) -> Option<LightEncoded> {
	if color_sum(color) < MIN_COLOR_SUM || cos_inner < cos_outer || cos_outer >= 1.0 {
		return None;
	}
	let radius = radius.max(MIN_SPHERE_RADIUS);
	let dir = *direction.normalize();
	Some(LightEncoded {
		color: disk_exitance(color, radius),
		kind: LightKind::Spot,
		data0: center.extend(radius),
		data1: dir.extend(0.0),
		data2: Vec4::new(cos_inner, cos_outer, 0.0, 0.0),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn directional_rejects_zero_angle() {
		assert!(encode_directional(Vec3::new(0.0, -1.0, 0.0), 0.0, Vec3::new(1.0, 1.0, 1.0)).is_none());
	}

	#[test]
	fn directional_rejects_dim_color() {
		assert!(encode_directional(Vec3::new(0.0, -1.0, 0.0), 0.01, Vec3::ZERO).is_none());
	}

	#[test]
	fn sphere_clamps_small_radius() {
		let l = encode_sphere(Vec3::ZERO, 0.0001, Vec3::new(1.0, 1.0, 1.0)).unwrap();
		assert_eq!(l.data0.w, MIN_SPHERE_RADIUS);
	}

	#[test]
	fn triangle_rejects_degenerate() {
		let p = Vec3::new(1.0, 2.0, 3.0);
		assert!(encode_triangle([p, p, p], Vec3::new(1.0, 1.0, 1.0)).is_none());
	}

	#[test]
	fn triangle_area_matches_cross_product() {
		let a = Vec3::new(0.0, 0.0, 0.0);
		let b = Vec3::new(1.0, 0.0, 0.0);
		let c = Vec3::new(0.0, 1.0, 0.0);
		let l = encode_triangle([a, b, c], Vec3::new(1.0, 1.0, 1.0)).unwrap();
		let normal = Vec3::new(l.data0.w, l.data1.w, l.data2.w);
		assert!((normal.length() - 1.0).abs() < 1e-5);
	}

	#[test]
	fn spot_rejects_inverted_cone() {
		assert!(encode_spot(Vec3::ZERO, 1.0, Vec3::new(0.0, -1.0, 0.0), 0.5, 0.9, Vec3::new(1.0, 1.0, 1.0)).is_none());
	}
}
