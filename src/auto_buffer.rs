//! Auto-buffer (§2.2, §4.1): `MAX_FRAMES_IN_FLIGHT` host-mapped staging
//! buffers plus one device-local buffer, and the copy+barrier operation that
//! bridges them. Grounded on `original_source/Source/AutoBuffer.h`
//! (RTGL1's `AutoBuffer`), restated with the teacher's typed-buffer style.

use crate::buffer::TypedBuffer;
use crate::error::RtResult;
use crate::gpu::{BufferCopy, BufferUsage, CmdList, Device, Memory};
use crate::MAX_FRAMES_IN_FLIGHT;

use std::ops::Range;

/// Bridges host writes (into per-frame staging) and device reads (from one
/// device-local buffer), per §4.1.
pub struct AutoBuffer<T> {
	staging: [TypedBuffer<T>; MAX_FRAMES_IN_FLIGHT],
	device_local: TypedBuffer<T>,
	capacity: usize,
}

impl<T: Copy> AutoBuffer<T> {
	pub fn new(device: &mut Device, capacity: usize, usage: BufferUsage) -> RtResult<Self> {
		let staging = std::array::from_fn(|_| {
			TypedBuffer::<T>::new(device, capacity, BufferUsage::TRANSFER, Memory::CpuToGpu)
				.expect("failed to allocate auto-buffer staging")
		});

		let device_local = TypedBuffer::<T>::new(device, capacity, usage | BufferUsage::TRANSFER, Memory::GpuOnly)?;

		Ok(Self { staging, device_local, capacity })
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn device_local(&self) -> &TypedBuffer<T> {
		&self.device_local
	}

	/// Persistently-mapped staging slice for `frame`. Mapping lives for the
	/// object's whole lifetime (§4.1).
	pub fn map(&self, frame: usize, count: usize) -> &mut [T] {
		self.staging[frame].mapped(count)
	}

	/// Records one `cmdCopyBuffer` per range from `staging[frame]` to the
	/// device-local buffer, followed by a single buffer-memory barrier
	/// `TRANSFER_WRITE -> ALL_COMMANDS::MEMORY_READ` spanning exactly the
	/// copied byte ranges. Ranges are element indices, not bytes; overlap
	/// within one call is a programmer error.
	pub fn copy_from_staging(&self, device: &Device, cmd: &CmdList, frame: usize, ranges: &[Range<usize>]) {
		debug_assert!(
			ranges.iter().enumerate().all(|(i, a)| ranges[i + 1..].iter().all(|b| a.start >= b.end || a.end <= b.start)),
			"copy_from_staging ranges must not overlap"
		);

		let elem_size = std::mem::size_of::<T>() as u64;
		let byte_regions: Vec<BufferCopy> = ranges
			.iter()
			.map(|r| BufferCopy {
				src_offset: r.start as u64 * elem_size,
				dst_offset: r.start as u64 * elem_size,
				size: (r.end - r.start) as u64 * elem_size,
			})
			.collect();

		cmd.copy_buffer(device, self.staging[frame].raw(), self.device_local.raw(), &byte_regions);

		let byte_ranges: Vec<Range<u64>> =
			ranges.iter().map(|r| r.start as u64 * elem_size..r.end as u64 * elem_size).collect();
		cmd.copy_barrier(device, self.device_local.raw(), &byte_ranges);
	}

	/// Convenience for copying the whole buffer.
	pub fn copy_all_from_staging(&self, device: &Device, cmd: &CmdList, frame: usize) {
		self.copy_from_staging(device, cmd, frame, &[0..self.capacity]);
	}

	pub fn destroy(self, device: &mut Device) {
		for staging in self.staging {
			staging.destroy(device);
		}
		self.device_local.destroy(device);
	}
}
