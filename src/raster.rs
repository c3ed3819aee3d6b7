//! Rasterized-overlay vertex upload (§6.1 `upload_rasterized_geometry`):
//! this crate owns the GPU-visible buffer the host's rasterizer reads
//! bindlessly. Drawing the overlay itself — the rasterize pass, blending,
//! blit to swapchain — is out of scope (§1); the crate fixes only the
//! upload contract, the same way it fixes only the shader-compilation
//! contract in `src/pipeline.rs`.
//!
//! Grounded on `original_source/Include/RTGL1/RTGL1.h`'s
//! `RgRasterizedGeometryUploadInfo`/`rgUploadRasterizedGeometry` (RTGL1's
//! one rasterized-overlay upload call per frame), narrowed to the vertex
//! data this crate stores — transform, blend state, and viewport belong to
//! the host's rasterizer, not this buffer.

use crate::buffer::TypedBuffer;
use crate::error::{RtError, RtResult};
use crate::gpu::{BufferUsage, Device, GpuPtr, Memory};
use crate::math::Vec3;

/// One rasterized-overlay vertex: position plus a packed RGBA8 color.
#[derive(Debug, Clone, Copy)]
pub struct RasterVertex {
	pub position: Vec3,
	pub color: u32,
}

/// Discarded and rewritten every frame, mirroring the dynamic ray-traced
/// collector's per-frame lifetime (§4.2).
pub struct RasterCollector {
	vertices: TypedBuffer<RasterVertex>,
	indices: TypedBuffer<u32>,
	vertex_cap: usize,
	index_cap: usize,
	vertex_count: usize,
	index_count: usize,
}

impl RasterCollector {
	pub fn new(device: &mut Device, vertex_cap: usize, index_cap: usize) -> RtResult<Self> {
		let vertices =
			TypedBuffer::<RasterVertex>::new(device, vertex_cap, BufferUsage::SHADER_RESOURCE | BufferUsage::TRANSFER, Memory::CpuToGpu)?;
		let indices =
			TypedBuffer::<u32>::new(device, index_cap, BufferUsage::SHADER_RESOURCE | BufferUsage::TRANSFER, Memory::CpuToGpu)?;

		Ok(Self { vertices, indices, vertex_cap, index_cap, vertex_count: 0, index_count: 0 })
	}

	/// Overwrites the buffer with one draw's vertices/indices. Later calls
	/// within the same frame simply overwrite from the start again — there
	/// is no append semantics here, since the host's rasterizer is expected
	/// to read back before issuing the next upload.
	pub fn upload(&mut self, vertices: &[RasterVertex], indices: &[u32]) -> RtResult<()> {
		if exceeds_capacity(vertices.len(), self.vertex_cap) || exceeds_capacity(indices.len(), self.index_cap) {
			return Err(RtError::WrongArgument("rasterized geometry exceeds configured vertex/index capacity".into()));
		}

		self.vertices.mapped(vertices.len()).copy_from_slice(vertices);
		self.indices.mapped(indices.len()).copy_from_slice(indices);
		self.vertex_count = vertices.len();
		self.index_count = indices.len();
		Ok(())
	}

	pub fn vertices_address(&self) -> GpuPtr {
		self.vertices.device_address()
	}

	pub fn indices_address(&self) -> GpuPtr {
		self.indices.device_address()
	}

	pub fn vertex_count(&self) -> usize {
		self.vertex_count
	}

	pub fn index_count(&self) -> usize {
		self.index_count
	}

	pub fn destroy(self, device: &mut Device) {
		self.vertices.destroy(device);
		self.indices.destroy(device);
	}
}

fn exceeds_capacity(len: usize, cap: usize) -> bool {
	len > cap
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exceeds_capacity_allows_exact_fit() {
		assert!(!exceeds_capacity(4, 4));
		assert!(exceeds_capacity(5, 4));
	}
}
