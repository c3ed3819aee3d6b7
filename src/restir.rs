//! ReSTIR indirect-illumination buffers (§2.15): one initial-samples
//! buffer and a ping-ponged pair of reservoir buffers, all sized to render
//! resolution and recreated together with the framebuffer set.
//!
//! Grounded on `original_source/Source/RestirBuffers.cpp` (RTGL1's
//! `RestirBuffers`), restated with this crate's bindless addressing
//! (§2.14's consolidation note in `src/descriptors.rs`) instead of its own
//! descriptor set.

use crate::buffer::TypedBuffer;
use crate::error::RtResult;
use crate::gpu::{BufferUsage, Device, GpuPtr, Memory};
use crate::MAX_FRAMES_IN_FLIGHT;

/// Packed words per pixel for one initial indirect sample.
const PACKED_INDIRECT_SAMPLE_SIZE_IN_WORDS: usize = 4;
/// Packed words per pixel for one indirect reservoir.
const PACKED_INDIRECT_RESERVOIR_SIZE_IN_WORDS: usize = 4;

/// The two buffer families `RGenIndirect`/`RInitialReservoirs` read and
/// write across the frame (§4.7 step 4).
pub struct RestirBuffers {
	initial_samples: TypedBuffer<u32>,
	reservoirs: [TypedBuffer<u32>; MAX_FRAMES_IN_FLIGHT],
	width: u32,
	height: u32,
}

fn word_count(words_per_pixel: usize, width: u32, height: u32) -> usize {
	words_per_pixel * width as usize * height as usize
}

fn buffer_for(device: &mut Device, words_per_pixel: usize, width: u32, height: u32) -> RtResult<TypedBuffer<u32>> {
	TypedBuffer::<u32>::new(
		device,
		word_count(words_per_pixel, width, height),
		BufferUsage::SHADER_RESOURCE | BufferUsage::UNORDERED_ACCESS,
		Memory::GpuOnly,
	)
}

impl RestirBuffers {
	pub fn new(device: &mut Device, width: u32, height: u32) -> RtResult<Self> {
		let initial_samples = buffer_for(device, PACKED_INDIRECT_SAMPLE_SIZE_IN_WORDS, width, height)?;
		let reservoirs = {
			let mut buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
			for _ in 0..MAX_FRAMES_IN_FLIGHT {
				buffers.push(buffer_for(device, PACKED_INDIRECT_RESERVOIR_SIZE_IN_WORDS, width, height)?);
			}
			buffers.try_into().unwrap_or_else(|_| unreachable!())
		};

		Ok(Self { initial_samples, reservoirs, width, height })
	}

	pub fn initial_samples_address(&self) -> GpuPtr {
		self.initial_samples.device_address()
	}

	/// This frame's reservoir slot, written by `RInitialReservoirs`/
	/// `RGenIndirect` (§4.7 step 4).
	pub fn reservoirs_current_address(&self, frame: usize) -> GpuPtr {
		self.reservoirs[frame % MAX_FRAMES_IN_FLIGHT].device_address()
	}

	/// Last frame's reservoir slot, read for temporal reuse.
	pub fn reservoirs_prev_address(&self, frame: usize) -> GpuPtr {
		self.reservoirs[(frame + MAX_FRAMES_IN_FLIGHT - 1) % MAX_FRAMES_IN_FLIGHT].device_address()
	}

	/// Recreates every buffer at the new render resolution, matching
	/// `OnFramebuffersSizeChange` (§7's transient resize path). A no-op if
	/// the resolution is unchanged.
	pub fn resize(&mut self, device: &mut Device, width: u32, height: u32) -> RtResult<()> {
		if width == self.width && height == self.height {
			return Ok(());
		}
		let new = Self::new(device, width, height)?;
		let old = std::mem::replace(self, new);
		old.destroy(device);
		Ok(())
	}

	pub fn destroy(self, device: &mut Device) {
		self.initial_samples.destroy(device);
		for reservoir in self.reservoirs {
			reservoir.destroy(device);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reservoir_word_count_scales_with_resolution() {
		assert_eq!(word_count(PACKED_INDIRECT_RESERVOIR_SIZE_IN_WORDS, 1920, 1080), 4 * 1920 * 1080);
		assert_eq!(word_count(PACKED_INDIRECT_RESERVOIR_SIZE_IN_WORDS, 0, 1080), 0);
	}
}
