//! Light lists (§2.8, §4.6.1): a list-per-sector accumulator that the light
//! manager feeds every time a light is added, flattened into one
//! device-local index list plus a per-sector `(begin, end)` region table.
//! Grounded on `original_source/Source/LightLists.h`'s shape (RTGL1's
//! `LightLists`).

use crate::auto_buffer::AutoBuffer;
use crate::config::{Config, MAX_LIGHT_LIST_SIZE, MAX_SECTOR_COUNT};
use crate::error::{RtError, RtResult};
use crate::gpu::{BufferUsage, CmdList, Device, GpuPtr};
use crate::sector::{SectorId, SectorTable};
use crate::util::FxHashMap;
use crate::MAX_FRAMES_IN_FLIGHT;

/// `(begin, end)` slice into [`LightLists::plain_light_list`]'s device
/// buffer, one per declared sector (§4.6.1).
#[derive(Clone, Copy, Default)]
#[repr(C)]
pub struct SectorRegion {
	pub begin: u32,
	pub end: u32,
}

pub struct LightLists {
	per_sector: FxHashMap<SectorId, Vec<u32>>,
	plain_light_list: AutoBuffer<u32>,
	sector_to_region: AutoBuffer<SectorRegion>,
	staged_len: usize,
	staged_sector_count: usize,
}

impl LightLists {
	pub fn new(device: &mut Device, _config: &Config) -> RtResult<Self> {
		Ok(Self {
			per_sector: FxHashMap::default(),
			plain_light_list: AutoBuffer::new(
				device,
				MAX_SECTOR_COUNT * MAX_LIGHT_LIST_SIZE,
				BufferUsage::SHADER_RESOURCE,
			)?,
			sector_to_region: AutoBuffer::new(device, MAX_SECTOR_COUNT, BufferUsage::SHADER_RESOURCE)?,
			staged_len: 0,
			staged_sector_count: 0,
		})
	}

	/// Clears every sector's accumulated list (§4.6 `prepare_for_frame`).
	pub fn prepare_for_frame(&mut self) {
		for list in self.per_sector.values_mut() {
			list.clear();
		}
	}

	/// Appends `light_index` to `light_sector`'s list and to the list of
	/// every sector visible from it (§4.6.1).
	pub fn insert(&mut self, light_index: u32, light_sector: SectorId, sectors: &SectorTable) -> RtResult<()> {
		for sector in sectors.affected_sectors(light_sector) {
			let list = self.per_sector.entry(sector).or_default();
			if list.len() >= MAX_LIGHT_LIST_SIZE {
				return Err(RtError::TooManyLightsInSector { sector, capacity: MAX_LIGHT_LIST_SIZE });
			}
			list.push(light_index);
		}
		Ok(())
	}

	/// Flattens the per-sector lists into `plain_light_list` and
	/// `sector_to_region`, in `sectors`' ascending-id order, then copies both
	/// to device-local memory (§4.6.1).
	pub fn build_and_copy(&mut self, device: &Device, cmd: &CmdList, frame: usize, sectors: &SectorTable) -> RtResult<()> {
		let declared: Vec<SectorId> = sectors.sectors().collect();
		if declared.len() > MAX_SECTOR_COUNT {
			return Err(RtError::TooManySectors { requested: declared.len(), capacity: MAX_SECTOR_COUNT });
		}

		let mut cursor = 0u32;
		let plain = self.plain_light_list.map(frame, MAX_SECTOR_COUNT * MAX_LIGHT_LIST_SIZE);
		let regions = self.sector_to_region.map(frame, MAX_SECTOR_COUNT);

		for (array_index, sector) in declared.iter().enumerate() {
			let list = self.per_sector.get(sector).map(Vec::as_slice).unwrap_or(&[]);
			let begin = cursor;
			for &light_index in list {
				plain[cursor as usize] = light_index;
				cursor += 1;
			}
			regions[array_index] = SectorRegion { begin, end: cursor };
		}

		self.staged_len = cursor as usize;
		self.staged_sector_count = declared.len();

		if self.staged_len > 0 {
			self.plain_light_list.copy_from_staging(device, cmd, frame, &[0..self.staged_len]);
		}
		if self.staged_sector_count > 0 {
			self.sector_to_region.copy_from_staging(device, cmd, frame, &[0..self.staged_sector_count]);
		}
		Ok(())
	}

	pub fn plain_light_list_address(&self) -> GpuPtr {
		self.plain_light_list.device_local().device_address()
	}

	pub fn sector_to_region_address(&self) -> GpuPtr {
		self.sector_to_region.device_local().device_address()
	}

	pub fn reset(&mut self) {
		self.per_sector.clear();
		self.staged_len = 0;
		self.staged_sector_count = 0;
	}

	pub fn destroy(self, device: &mut Device) {
		self.plain_light_list.destroy(device);
		self.sector_to_region.destroy(device);
	}
}

const _: () = assert!(MAX_FRAMES_IN_FLIGHT >= 1);
