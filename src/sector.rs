//! Sector visibility (§3.7): an optional host-declared partition of space
//! into opaque integer ids, plus a symmetric potentially-visible relation
//! used by [`crate::light::lists`] to decide which sectors' light lists a
//! given light is appended to.

use crate::error::{RtError, RtResult};
use crate::util::FxHashMap;

use std::collections::HashSet;

/// Opaque sector id, as declared by the host.
pub type SectorId = u32;

/// Sector `0` always exists, trivially visible to itself, even when the
/// host never calls [`SectorTable::declare`] (§3.7).
pub const IMPLICIT_SECTOR: SectorId = 0;

/// Symmetric potentially-visible-sector relation. Reset alongside the
/// static scene (§4.5's `start_new_scene`).
pub struct SectorTable {
	capacity: usize,
	sectors: HashSet<SectorId>,
	visible: FxHashMap<SectorId, HashSet<SectorId>>,
}

impl SectorTable {
	pub fn new(capacity: usize) -> Self {
		let mut sectors = HashSet::new();
		sectors.insert(IMPLICIT_SECTOR);
		Self { capacity, sectors, visible: FxHashMap::default() }
	}

	/// Clears every declared sector and visibility edge back to just the
	/// implicit sector `0` (§4.5 `start_new_scene`).
	pub fn reset(&mut self) {
		self.sectors.clear();
		self.sectors.insert(IMPLICIT_SECTOR);
		self.visible.clear();
	}

	/// Registers `sector` if not already known.
	pub fn declare(&mut self, sector: SectorId) -> RtResult<()> {
		if self.sectors.contains(&sector) {
			return Ok(());
		}
		if self.sectors.len() >= self.capacity {
			return Err(RtError::TooManySectors { requested: self.sectors.len() + 1, capacity: self.capacity });
		}
		self.sectors.insert(sector);
		Ok(())
	}

	/// Declares `vis(a, b)`; the relation is symmetric, so `vis(b, a)` holds
	/// too (§3.7).
	pub fn set_visible(&mut self, a: SectorId, b: SectorId) -> RtResult<()> {
		self.declare(a)?;
		self.declare(b)?;
		self.visible.entry(a).or_default().insert(b);
		self.visible.entry(b).or_default().insert(a);
		Ok(())
	}

	/// Every sector a light placed in `sector` must be added to: `sector`
	/// itself plus every sector visible from it (§3.7, §4.6.1).
	pub fn affected_sectors(&self, sector: SectorId) -> impl Iterator<Item = SectorId> + '_ {
		std::iter::once(sector).chain(self.visible.get(&sector).into_iter().flatten().copied())
	}

	pub fn sector_count(&self) -> usize {
		self.sectors.len()
	}

	/// All declared sectors, in ascending id order — the stable iteration
	/// order [`crate::light::lists::LightLists`] uses to assign each sector
	/// a region index.
	pub fn sectors(&self) -> impl Iterator<Item = SectorId> + '_ {
		let mut ids: Vec<SectorId> = self.sectors.iter().copied().collect();
		ids.sort_unstable();
		ids.into_iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn implicit_sector_is_visible_to_itself() {
		let table = SectorTable::new(8);
		let affected: Vec<_> = table.affected_sectors(IMPLICIT_SECTOR).collect();
		assert_eq!(affected, vec![IMPLICIT_SECTOR]);
	}

	#[test]
	fn visibility_relation_is_symmetric() {
		let mut table = SectorTable::new(8);
		table.set_visible(1, 2).unwrap();
		let mut from_1: Vec<_> = table.affected_sectors(1).collect();
		let mut from_2: Vec<_> = table.affected_sectors(2).collect();
		from_1.sort();
		from_2.sort();
		assert_eq!(from_1, vec![1, 2]);
		assert_eq!(from_2, vec![1, 2]);
	}

	#[test]
	fn reset_drops_declared_sectors() {
		let mut table = SectorTable::new(8);
		table.set_visible(1, 2).unwrap();
		table.reset();
		assert_eq!(table.sector_count(), 1);
		assert_eq!(table.affected_sectors(1).collect::<Vec<_>>(), vec![1]);
	}

	#[test]
	fn declare_past_capacity_errors() {
		let mut table = SectorTable::new(1);
		assert!(matches!(table.declare(5), Err(RtError::TooManySectors { .. })));
	}
}
