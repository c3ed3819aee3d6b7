//! Filter-flag taxonomy (§3.1): lifetime class × pass-through × primary
//! visibility. The cross-product is precomputed once into [`Filter::ALL`];
//! any code that needs to iterate filters iterates that list, never bit
//! math, per the invariant in §3.1.

use bitflags::bitflags;

/// Lifetime class (CF). Exactly one bit per geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
	StaticNonMovable,
	StaticMovable,
	Dynamic,
}

impl Lifetime {
	pub const ALL: [Lifetime; 3] = [Lifetime::StaticNonMovable, Lifetime::StaticMovable, Lifetime::Dynamic];

	pub fn is_static(self) -> bool {
		matches!(self, Lifetime::StaticNonMovable | Lifetime::StaticMovable)
	}
}

/// Pass-through class (PT), mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassThrough {
	Opaque,
	AlphaTested,
	ReflectRefract,
}

impl PassThrough {
	pub const ALL: [PassThrough; 3] = [PassThrough::Opaque, PassThrough::AlphaTested, PassThrough::ReflectRefract];
}

/// Primary-visibility class (PV), mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
	World0,
	World1,
	World2,
	FirstPerson,
	FirstPersonViewer,
	Skybox,
}

impl Visibility {
	pub const ALL: [Visibility; 6] = [
		Visibility::World0,
		Visibility::World1,
		Visibility::World2,
		Visibility::FirstPerson,
		Visibility::FirstPersonViewer,
		Visibility::Skybox,
	];

	/// The `WORLD_k` index this visibility class represents, if any.
	pub fn world_index(self) -> Option<u32> {
		match self {
			Visibility::World0 => Some(0),
			Visibility::World1 => Some(1),
			Visibility::World2 => Some(2),
			_ => None,
		}
	}
}

bitflags! {
	/// Raw TLAS instance mask bits (§4.5.1).
	#[derive(Clone, Copy, PartialEq, Eq)]
	pub struct InstanceMask: u8 {
		const WORLD_0             = 1 << 0;
		const WORLD_1             = 1 << 1;
		const WORLD_2             = 1 << 2;
		const FIRST_PERSON        = 1 << 3;
		const FIRST_PERSON_VIEWER = 1 << 4;
		const REFLECT_REFRACT     = 1 << 5;
	}

	/// Raw per-instance custom-index bits, distinct from [`InstanceMask`]
	/// (§4.5.1). Packed alongside the geometry-instance table offset by the
	/// intersection shaders.
	#[derive(Clone, Copy, PartialEq, Eq)]
	pub struct CustomIndexFlags: u32 {
		const DYNAMIC             = 1 << 0;
		const FIRST_PERSON        = 1 << 1;
		const FIRST_PERSON_VIEWER = 1 << 2;
		const REFLECT             = 1 << 3;
	}

	/// Frame-level ray-cull mask for `WORLD_k` instances (§4.5.1, §8.4#3).
	#[derive(Clone, Copy, PartialEq, Eq)]
	pub struct CullMask: u8 {
		const WORLD_0 = 1 << 0;
		const WORLD_1 = 1 << 1;
		const WORLD_2 = 1 << 2;
	}
}

impl CullMask {
	pub const ALL_WORLDS: CullMask = CullMask::WORLD_0.union(CullMask::WORLD_1).union(CullMask::WORLD_2);

	pub fn allows(self, world_index: u32) -> bool {
		match world_index {
			0 => self.contains(CullMask::WORLD_0),
			1 => self.contains(CullMask::WORLD_1),
			2 => self.contains(CullMask::WORLD_2),
			_ => false,
		}
	}
}

/// A filter is the union of one bit from each of CF, PT, PV (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Filter {
	pub lifetime: Lifetime,
	pub pass_through: PassThrough,
	pub visibility: Visibility,
}

impl Filter {
	pub const fn new(lifetime: Lifetime, pass_through: PassThrough, visibility: Visibility) -> Self {
		Self { lifetime, pass_through, visibility }
	}

	/// Number of legal filters: `3 * 3 * 6 = 54` (SPEC_FULL §3).
	pub const COUNT: usize = 3 * 3 * 6;

	/// Dense index in `[0, Filter::COUNT)`, stable for the process lifetime.
	/// Used as the offset key into per-filter buffer layouts (§3.1).
	pub fn index(self) -> usize {
		let cf = match self.lifetime {
			Lifetime::StaticNonMovable => 0,
			Lifetime::StaticMovable => 1,
			Lifetime::Dynamic => 2,
		};
		let pt = match self.pass_through {
			PassThrough::Opaque => 0,
			PassThrough::AlphaTested => 1,
			PassThrough::ReflectRefract => 2,
		};
		let pv = match self.visibility {
			Visibility::World0 => 0,
			Visibility::World1 => 1,
			Visibility::World2 => 2,
			Visibility::FirstPerson => 3,
			Visibility::FirstPersonViewer => 4,
			Visibility::Skybox => 5,
		};
		(cf * 3 + pt) * 6 + pv
	}

	/// The full cross-product, precomputed once (§3.1 invariant).
	pub fn all() -> &'static [Filter; Filter::COUNT] {
		use std::sync::OnceLock;
		static ALL: OnceLock<[Filter; Filter::COUNT]> = OnceLock::new();
		ALL.get_or_init(|| {
			let mut out = [Filter::new(Lifetime::Dynamic, PassThrough::Opaque, Visibility::World0); Filter::COUNT];
			let mut i = 0;
			for &cf in &Lifetime::ALL {
				for &pt in &PassThrough::ALL {
					for &pv in &Visibility::ALL {
						out[Filter::new(cf, pt, pv).index()] = Filter::new(cf, pt, pv);
						i += 1;
					}
				}
			}
			debug_assert_eq!(i, Filter::COUNT);
			out
		})
	}

	/// Iterator over filters sharing `lifetime`.
	pub fn for_lifetime(lifetime: Lifetime) -> impl Iterator<Item = Filter> {
		Filter::all().iter().copied().filter(move |f| f.lifetime == lifetime)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn all_filters_are_distinct_and_dense() {
		let all = Filter::all();
		assert_eq!(all.len(), Filter::COUNT);
		let mut seen = [false; Filter::COUNT];
		for f in all {
			let idx = f.index();
			assert!(!seen[idx], "duplicate index {idx}");
			seen[idx] = true;
		}
		assert!(seen.iter().all(|&b| b));
	}

	#[test]
	fn cull_mask_allows_matches_world_index() {
		let mask = CullMask::WORLD_0;
		assert!(mask.allows(0));
		assert!(!mask.allows(1));
		assert!(!mask.allows(2));
	}
}
