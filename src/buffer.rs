//! Typed GPU buffer wrapper (§2.1): an owning [`crate::gpu::Buffer`] plus an
//! element type, with optional persistent host mapping.

use crate::error::RtResult;
use crate::gpu::{Buffer, BufferDesc, BufferUsage, Device, GpuPtr, Memory};

use std::marker::PhantomData;

/// An owning GPU buffer typed by element `T`. Mirrors the teacher's
/// `gpu::Buffer` handle, narrowed to the one backend this crate supports and
/// given element typing so collector/AS-manager code never juggles raw byte
/// offsets.
pub struct TypedBuffer<T> {
	inner: Buffer,
	capacity: usize,
	_marker: PhantomData<T>,
}

impl<T: Copy> TypedBuffer<T> {
	pub fn new(device: &mut Device, capacity: usize, usage: BufferUsage, memory: Memory) -> RtResult<Self> {
		let size = (capacity * std::mem::size_of::<T>()) as u64;
		let inner = device.create_buffer(&BufferDesc { size, usage, memory })?;
		Ok(Self { inner, capacity, _marker: PhantomData })
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn byte_size(&self) -> u64 {
		self.inner.size()
	}

	pub fn raw(&self) -> &Buffer {
		&self.inner
	}

	pub fn device_address(&self) -> GpuPtr {
		self.inner.device_address()
	}

	/// Host-visible slice of the first `count` elements. Panics (via the
	/// debug assert in [`Buffer::mapped_slice`]) if this buffer is not
	/// host-mapped — a programmer error, per §4.1.
	pub fn mapped(&self, count: usize) -> &mut [T] {
		debug_assert!(count <= self.capacity);
		unsafe { self.inner.mapped_slice(count) }
	}

	pub fn destroy(self, device: &mut Device) {
		device.destroy_buffer(self.inner);
	}
}
