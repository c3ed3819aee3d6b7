//! Small linear-algebra library: const-generic matrices/vectors, unit
//! wrappers, quaternions, and rigid transforms. Lifted from the engine's
//! own `math` crate rather than `glam`/`nalgebra` — this crate never had a
//! third-party math dependency and none of the spec's numerics need one.
#![allow(dead_code)]

pub mod isometry;
pub mod matrix;
pub mod num;
pub mod transform;

mod complex;
mod dual;
mod quaternion;
mod unit;

pub use complex::{Complex, UnitComplex};
pub use dual::Dual;
pub use matrix::{Matrix, Matrix2, Matrix3, Matrix4, Vector, Vector2, Vector3, Vector4};
pub use quaternion::{Quaternion, UnitQuaternion};
pub use unit::Unit;

pub type Vec2 = Vector2<f32>;
pub type Vec3 = Vector3<f32>;
pub type Vec4 = Vector4<f32>;

pub type Mat3 = Matrix3<f32>;
pub type Mat4 = Matrix4<f32>;
pub type Mat3x4 = Matrix<f32, 3, 4>;

pub const PI: f32 = std::f32::consts::PI;

/// Clamps x to be in the range [min, max].
pub fn clamp(x: f32, min: f32, max: f32) -> f32 {
	x.max(min).min(max)
}
