//! Light grid (§2.9, §3.6, §4.6.2): a uniform 3-D grid of reservoirs,
//! camera-centered, rebuilt every frame by a compute dispatch over the
//! current light array. Grounded on
//! `original_source/Source/LightGrid.h`/`.cpp` (RTGL1's `LightGrid`).

use crate::buffer::TypedBuffer;
use crate::config::{Config, LIGHT_GRID_CELL_SIZE, LIGHT_GRID_SIZE_X, LIGHT_GRID_SIZE_Y, LIGHT_GRID_SIZE_Z};
use crate::error::RtResult;
use crate::gpu::{BufferUsage, CmdList, Device, GpuPtr, Memory};
use crate::math::Vec3;
use crate::MAX_FRAMES_IN_FLIGHT;

/// One cell's reservoir slot count, `LIGHT_GRID_CELL_SIZE` reservoirs per
/// cell packed contiguously (§3.6).
#[derive(Clone, Copy, Default)]
#[repr(C)]
pub struct GridReservoir {
	pub light_index: u32,
	pub weight_sum: f32,
	pub sample_count: u32,
	pub _pad: u32,
}

const CELL_COUNT: usize = (LIGHT_GRID_SIZE_X * LIGHT_GRID_SIZE_Y * LIGHT_GRID_SIZE_Z) as usize;
const RESERVOIR_COUNT: usize = CELL_COUNT * LIGHT_GRID_CELL_SIZE as usize;

fn snap_to_grid(position: Vec3, cell_world_size: f32) -> Vec3 {
	let snap = |v: f32| (v / cell_world_size).round() * cell_world_size;
	Vec3::new(snap(position.x), snap(position.y), snap(position.z))
}

/// Camera-centered uniform grid of light reservoirs (§3.6). Ping-ponged
/// across `MAX_FRAMES_IN_FLIGHT` so the previous frame's grid stays
/// readable for temporal reuse while the current one is rebuilt.
pub struct LightGrid {
	current: [TypedBuffer<GridReservoir>; MAX_FRAMES_IN_FLIGHT],
	cell_world_size: f32,
	center: Vec3,
}

impl LightGrid {
	pub fn new(device: &mut Device, config: &Config) -> RtResult<Self> {
		let current = {
			let mut buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
			for _ in 0..MAX_FRAMES_IN_FLIGHT {
				buffers.push(TypedBuffer::new(
					device,
					RESERVOIR_COUNT,
					BufferUsage::SHADER_RESOURCE | BufferUsage::UNORDERED_ACCESS,
					Memory::GpuOnly,
				)?);
			}
			buffers.try_into().unwrap_or_else(|_| unreachable!())
		};

		Ok(Self { current, cell_world_size: config.cell_world_size, center: Vec3::ZERO })
	}

	/// Recenters the grid so `camera_position` lies at the cell center of
	/// index `(N/2, N/2, N/2)` (§4.6.2), snapped to the cell size.
	pub fn recenter(&mut self, camera_position: Vec3) {
		self.center = snap_to_grid(camera_position, self.cell_world_size);
	}

	pub fn cell_radius(&self) -> f32 {
		self.cell_world_size * 0.5
	}

	pub fn center(&self) -> Vec3 {
		self.center
	}

	/// Dispatches the grid-rebuild compute shader: one thread group per
	/// cell, `LIGHT_GRID_CELL_SIZE` reservoirs each performing weighted
	/// reservoir sampling over the current light array (§4.6.2). The
	/// pipeline and descriptor bindings are established by
	/// [`crate::descriptors`]; this only issues the dispatch once they are
	/// bound.
	pub fn dispatch_rebuild(&self, device: &Device, cmd: &CmdList) {
		cmd.dispatch(device, LIGHT_GRID_SIZE_X, LIGHT_GRID_SIZE_Y, LIGHT_GRID_SIZE_Z);
	}

	pub fn address(&self, frame: usize) -> GpuPtr {
		self.current[frame].device_address()
	}

	/// The other frame slot's grid, read by shaders for temporal reuse
	/// while `frame`'s slot is being rebuilt (§3.6).
	pub fn prev_address(&self, frame: usize) -> GpuPtr {
		self.current[(frame + MAX_FRAMES_IN_FLIGHT - 1) % MAX_FRAMES_IN_FLIGHT].device_address()
	}

	pub fn destroy(self, device: &mut Device) {
		for buffer in self.current {
			buffer.destroy(device);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn recenter_snaps_to_cell_size() {
		assert_eq!(snap_to_grid(Vec3::new(11.0, -3.0, 4.1), 8.0), Vec3::new(8.0, 0.0, 8.0));
	}
}
