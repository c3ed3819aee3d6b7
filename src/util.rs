//! Small utilities (§2.16): hashing, bit packing, and normal encoding shared
//! across the collector, light encoder, and AS manager.

use crate::math::Vec3;

/// Flat hash map used for the stable identity maps of §3.5 and the
/// sector-visibility adjacency of §3.7. `rustc_hash::FxHashMap` is the
/// "any flat hash map" the design notes (§9) ask for; it is already the
/// choice of several renderers in this corpus for small integer-keyed
/// hot-path maps.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub use rustc_hash::FxHashSet;

/// Aligns `value` up to `align`, which must be a power of two.
pub fn align_pow2(value: u64, align: u64) -> u64 {
	(value + (align - 1)) & !(align - 1)
}

/// Packs three material-layer indices (10 bits each) plus a flags nibble
/// into a single `u32`, as stored per-triangle in the geometry-instance
/// table (§3.3).
pub fn pack_layer_materials(layers: [u16; 3], flags: u8) -> u32 {
	debug_assert!(layers.iter().all(|&l| l < 1 << 10));
	debug_assert!(flags < 1 << 2);
	(layers[0] as u32) | (layers[1] as u32) << 10 | (layers[2] as u32) << 20 | (flags as u32) << 30
}

pub fn unpack_layer_materials(packed: u32) -> ([u16; 3], u8) {
	let mask = (1u32 << 10) - 1;
	(
		[
			(packed & mask) as u16,
			((packed >> 10) & mask) as u16,
			((packed >> 20) & mask) as u16,
		],
		((packed >> 30) & 0b11) as u8,
	)
}

/// Octahedral-encodes a unit normal into two `i16` lanes, packed as a `u32`.
/// Standard compact GPU normal encoding; used for the geometry-instance and
/// light-grid payloads.
pub fn encode_normal_oct(n: Vec3) -> u32 {
	let inv_l1 = 1.0 / (n.x.abs() + n.y.abs() + n.z.abs()).max(1e-20);
	let (mut x, mut y) = (n.x * inv_l1, n.y * inv_l1);

	if n.z < 0.0 {
		let (ox, oy) = (x, y);
		x = (1.0 - oy.abs()) * signum_nonzero(ox);
		y = (1.0 - ox.abs()) * signum_nonzero(oy);
	}

	let xi = (x.clamp(-1.0, 1.0) * 32767.0).round() as i16;
	let yi = (y.clamp(-1.0, 1.0) * 32767.0).round() as i16;

	(xi as u16 as u32) | (yi as u16 as u32) << 16
}

pub fn decode_normal_oct(packed: u32) -> Vec3 {
	let xi = (packed & 0xFFFF) as u16 as i16;
	let yi = (packed >> 16) as u16 as i16;

	let mut x = xi as f32 / 32767.0;
	let mut y = yi as f32 / 32767.0;
	let z = 1.0 - x.abs() - y.abs();

	if z < 0.0 {
		let (ox, oy) = (x, y);
		x = (1.0 - oy.abs()) * signum_nonzero(ox);
		y = (1.0 - ox.abs()) * signum_nonzero(oy);
	}

	*Vec3::new(x, y, z).normalize()
}

fn signum_nonzero(v: f32) -> f32 {
	if v >= 0.0 {
		1.0
	} else {
		-1.0
	}
}

/// FNV-1a over raw bytes; used where a stable non-cryptographic content
/// hash is needed (e.g. dedup keys), distinct from the `FxHashMap` identity
/// maps which are keyed by the host-supplied `unique_id`.
pub fn fnv1a(bytes: &[u8]) -> u64 {
	const OFFSET: u64 = 0xcbf29ce484222325;
	const PRIME: u64 = 0x100000001b3;
	let mut hash = OFFSET;
	for &b in bytes {
		hash ^= b as u64;
		hash = hash.wrapping_mul(PRIME);
	}
	hash
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn align_pow2_rounds_up() {
		assert_eq!(align_pow2(0, 256), 0);
		assert_eq!(align_pow2(1, 256), 256);
		assert_eq!(align_pow2(256, 256), 256);
		assert_eq!(align_pow2(257, 256), 512);
	}

	#[test]
	fn layer_materials_round_trip() {
		let (layers, flags) = ([3, 700, 1023], 0b10);
		let packed = pack_layer_materials(layers, flags);
		assert_eq!(unpack_layer_materials(packed), (layers, flags));
	}

	#[test]
	fn oct_normal_round_trips_axis_aligned() {
		for n in [Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0)] {
			let decoded = decode_normal_oct(encode_normal_oct(n));
			assert!((decoded - n).length() < 1e-3, "{n:?} -> {decoded:?}");
		}
	}
}
