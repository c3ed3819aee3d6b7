//! Light manager (§2.7, §4.6): owns the stable per-light identity map, the
//! previous↔current index match table, and the current-frame light array,
//! delegating spatial bucketing to [`crate::light::lists`]. Grounded on
//! `original_source/Source/LightManager.h`/`.cpp` (RTGL1's `LightManager`).

use crate::auto_buffer::AutoBuffer;
use crate::buffer::TypedBuffer;
use crate::config::Config;
use crate::error::{RtError, RtResult};
use crate::gpu::{BufferCopy, BufferUsage, CmdList, Device, GpuPtr, Memory};
use crate::light::encoder::{self, LightEncoded, LightKind};
use crate::light::lists::LightLists;
use crate::math::Vec3;
use crate::sector::{SectorId, SectorTable};
use crate::util::FxHashMap;
use crate::MAX_FRAMES_IN_FLIGHT;

/// Upper bound on live lights in one frame (§4.6), mirroring the original
/// engine's `MAX_LIGHT_COUNT`.
const MAX_LIGHT_COUNT: usize = 4096;

/// Sentinel written into `match_prev` for previous-frame lights that found
/// no counterpart this frame.
const NO_MATCH: u32 = u32::MAX;

pub struct LightManager {
	lights: AutoBuffer<LightEncoded>,
	lights_prev: TypedBuffer<LightEncoded>,
	match_prev: AutoBuffer<u32>,
	lists: LightLists,
	sectors: SectorTable,

	current_map: FxHashMap<u64, u32>,
	prev_map: FxHashMap<u64, u32>,

	count: u32,
	count_prev: u32,
	dir_count: u32,
}

impl LightManager {
	pub fn new(device: &mut Device, config: &Config) -> RtResult<Self> {
		Ok(Self {
			lights: AutoBuffer::new(device, MAX_LIGHT_COUNT, BufferUsage::SHADER_RESOURCE)?,
			lights_prev: TypedBuffer::new(device, MAX_LIGHT_COUNT, BufferUsage::SHADER_RESOURCE | BufferUsage::TRANSFER, Memory::GpuOnly)?,
			match_prev: AutoBuffer::new(device, MAX_LIGHT_COUNT, BufferUsage::SHADER_RESOURCE)?,
			lists: LightLists::new(device, config)?,
			sectors: SectorTable::new(config.max_sector_count),
			current_map: FxHashMap::default(),
			prev_map: FxHashMap::default(),
			count: 0,
			count_prev: 0,
			dir_count: 0,
		})
	}

	/// Declares a sector and/or a potentially-visible-sector edge ahead of
	/// `add_*` calls this frame (§3.7). Forwarded from the scene root.
	pub fn declare_sector(&mut self, sector: SectorId) -> RtResult<()> {
		self.sectors.declare(sector)
	}

	pub fn set_sector_visible(&mut self, a: SectorId, b: SectorId) -> RtResult<()> {
		self.sectors.set_visible(a, b)
	}

	/// §4.6 `prepare_for_frame`: swaps in the previous frame's identity map,
	/// snapshots its live-light count, records the device-side copy of this
	/// frame's light array into the previous-frame buffer, and primes
	/// `match_prev` with the not-yet-matched sentinel.
	pub fn prepare_for_frame(&mut self, device: &Device, cmd: &CmdList, frame: usize) {
		self.count_prev = self.count;
		self.prev_map = std::mem::take(&mut self.current_map);
		self.count = 0;
		self.dir_count = 0;

		if self.count_prev > 0 {
			let region = BufferCopy {
				src_offset: 0,
				dst_offset: 0,
				size: self.count_prev as u64 * std::mem::size_of::<LightEncoded>() as u64,
			};
			cmd.copy_buffer(device, self.lights.device_local().raw(), self.lights_prev.raw(), &[region]);

			let sentinel = self.match_prev.map(frame, self.count_prev as usize);
			sentinel.fill(NO_MATCH);
		}

		self.lists.prepare_for_frame();
	}

	/// Pure identity bookkeeping for one insert (§3.5, §4.6): rejects a
	/// duplicate id or a second directional light, assigns this light's
	/// array index, and reports the previous-frame index it matches, if
	/// any. Split out from [`Self::insert`] so it is testable without a
	/// live GPU device.
	fn resolve_identity(
		current_map: &FxHashMap<u64, u32>,
		prev_map: &FxHashMap<u64, u32>,
		dir_count: u32,
		count: u32,
		unique_id: u64,
		kind: LightKind,
	) -> RtResult<(u32, Option<u32>)> {
		if current_map.contains_key(&unique_id) {
			return Err(RtError::IdNotUnique(unique_id));
		}
		if kind == LightKind::Directional && dir_count >= 1 {
			return Err(RtError::WrongArgument("at most one directional light is allowed per frame".into()));
		}
		Ok((count, prev_map.get(&unique_id).copied()))
	}

	fn insert(&mut self, unique_id: u64, sector: SectorId, frame: usize, encoded: LightEncoded) -> RtResult<()> {
		let (index, prev_index) =
			Self::resolve_identity(&self.current_map, &self.prev_map, self.dir_count, self.count, unique_id, encoded.kind)?;

		self.lights.map(frame, index as usize + 1)[index as usize] = encoded;
		self.count += 1;
		if encoded.kind == LightKind::Directional {
			self.dir_count += 1;
		}

		if let Some(prev_index) = prev_index {
			self.match_prev.map(frame, self.count_prev as usize)[prev_index as usize] = index;
		}

		self.current_map.insert(unique_id, index);
		self.lists.insert(index, sector, &self.sectors)?;
		Ok(())
	}

	/// Rejects silently (returns `Ok(())`) if the light fails its encoder's
	/// validity checks (§3.4); reports `IdNotUnique` if `unique_id` already
	/// exists this frame.
	pub fn add_directional(&mut self, frame: usize, unique_id: u64, sector: SectorId, direction: Vec3, angular_radius: f32, color: Vec3) -> RtResult<()> {
		match encoder::encode_directional(direction, angular_radius, color) {
			Some(encoded) => self.insert(unique_id, sector, frame, encoded),
			None => Ok(()),
		}
	}

	pub fn add_spherical(&mut self, frame: usize, unique_id: u64, sector: SectorId, center: Vec3, radius: f32, color: Vec3) -> RtResult<()> {
		match encoder::encode_sphere(center, radius, color) {
			Some(encoded) => self.insert(unique_id, sector, frame, encoded),
			None => Ok(()),
		}
	}

	pub fn add_polygonal(&mut self, frame: usize, unique_id: u64, sector: SectorId, positions: [Vec3; 3], color: Vec3) -> RtResult<()> {
		match encoder::encode_triangle(positions, color) {
			Some(encoded) => self.insert(unique_id, sector, frame, encoded),
			None => Ok(()),
		}
	}

	#[allow(clippy::too_many_arguments)]
	pub fn add_spot(
		&mut self,
		frame: usize,
		unique_id: u64,
		sector: SectorId,
		center: Vec3,
		radius: f32,
		direction: Vec3,
		cos_inner: f32,
		cos_outer: f32,
		color: Vec3,
	) -> RtResult<()> {
		match encoder::encode_spot(center, radius, direction, cos_inner, cos_outer, color) {
			Some(encoded) => self.insert(unique_id, sector, frame, encoded),
			None => Ok(()),
		}
	}

	pub fn does_directional_light_exist(&self) -> bool {
		self.dir_count > 0
	}

	pub fn light_count(&self) -> u32 {
		self.count
	}

	pub fn light_count_prev(&self) -> u32 {
		self.count_prev
	}

	/// §4.6 `copy_from_staging`: uploads this frame's live light records and
	/// the previous-frame match table, then flattens and uploads the light
	/// lists.
	pub fn copy_from_staging(&mut self, device: &Device, cmd: &CmdList, frame: usize) -> RtResult<()> {
		if self.count > 0 {
			self.lights.copy_from_staging(device, cmd, frame, &[0..self.count as usize]);
		}
		if self.count_prev > 0 {
			self.match_prev.copy_from_staging(device, cmd, frame, &[0..self.count_prev as usize]);
		}
		self.lists.build_and_copy(device, cmd, frame, &self.sectors)
	}

	/// §4.5's `start_new_scene` equivalent for lights: drops every declared
	/// sector/visibility edge and both identity maps.
	pub fn reset(&mut self) {
		self.current_map.clear();
		self.prev_map.clear();
		self.count = 0;
		self.count_prev = 0;
		self.dir_count = 0;
		self.sectors.reset();
		self.lists.reset();
	}

	pub fn lights_address(&self) -> GpuPtr {
		self.lights.device_local().device_address()
	}

	pub fn lights_prev_address(&self) -> GpuPtr {
		self.lights_prev.device_address()
	}

	pub fn match_prev_address(&self) -> GpuPtr {
		self.match_prev.device_local().device_address()
	}

	pub fn light_lists(&self) -> &LightLists {
		&self.lists
	}

	pub fn destroy(self, device: &mut Device) {
		self.lights.destroy(device);
		self.lights_prev.destroy(device);
		self.match_prev.destroy(device);
		self.lists.destroy(device);
	}
}

const _: () = assert!(MAX_FRAMES_IN_FLIGHT >= 1);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn duplicate_id_is_rejected() {
		let mut current = FxHashMap::default();
		current.insert(7, 0);
		let err = LightManager::resolve_identity(&current, &FxHashMap::default(), 0, 1, 7, LightKind::Sphere).unwrap_err();
		assert_eq!(err, RtError::IdNotUnique(7));
	}

	#[test]
	fn second_directional_light_is_rejected() {
		let err =
			LightManager::resolve_identity(&FxHashMap::default(), &FxHashMap::default(), 1, 0, 42, LightKind::Directional)
				.unwrap_err();
		assert!(matches!(err, RtError::WrongArgument(_)));
	}

	#[test]
	fn previous_frame_match_is_reported() {
		let mut prev = FxHashMap::default();
		prev.insert(7, 3);
		let (index, matched) = LightManager::resolve_identity(&FxHashMap::default(), &prev, 0, 5, 7, LightKind::Sphere).unwrap();
		assert_eq!(index, 5);
		assert_eq!(matched, Some(3));
	}

	#[test]
	fn unmatched_light_reports_no_previous_index() {
		let (_, matched) = LightManager::resolve_identity(&FxHashMap::default(), &FxHashMap::default(), 0, 0, 9, LightKind::Sphere).unwrap();
		assert_eq!(matched, None);
	}
}
