//! Thin Vulkan ray-tracing layer.
//!
//! Everything the higher-level components (collector, AS manager, light
//! manager, scheduler) need from "the GPU ray-tracing API" (§1, treated as
//! an external collaborator) is fixed here as a small set of owning
//! wrappers around `ash` handles plus `gpu-allocator` allocations. This
//! narrows the teacher crate's multi-backend `DeviceImpl`/`CmdListImpl`
//! trait split down to one concrete Vulkan backend: this crate never needs
//! D3D12, so the generic backend trait and the `windows` dependency it
//! dragged in are dropped (see `DESIGN.md`).

mod device;
mod swapchain;

pub use device::{Device, DeviceCreateInfo};
pub use swapchain::{AcquireResult, Swapchain};

use ash::vk;
use std::ops::Range;

/// Opaque device-visible pointer, as returned by `vkGetBufferDeviceAddress`
/// or an acceleration structure's device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpuPtr(pub u64);

impl GpuPtr {
	pub const NULL: Self = Self(0);

	pub fn offset(self, offset: u64) -> Self {
		Self(self.0 + offset)
	}
}

bitflags::bitflags! {
	#[derive(Clone, Copy, PartialEq, Eq)]
	pub struct BufferUsage: u32 {
		const TRANSFER = 1 << 0;
		const INDEX = 1 << 1;
		const SHADER_RESOURCE = 1 << 2;
		const UNORDERED_ACCESS = 1 << 3;
		const ACCELERATION_STRUCTURE = 1 << 4;
		const SHADER_BINDING_TABLE = 1 << 5;
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memory {
	/// Device-local, not host-visible.
	GpuOnly,
	/// Host-visible and host-coherent, persistently mapped on creation.
	CpuToGpu,
}

#[derive(Clone, Copy)]
pub struct BufferDesc {
	pub size: u64,
	pub usage: BufferUsage,
	pub memory: Memory,
}

/// Owning GPU buffer: a `VkBuffer` plus its `gpu-allocator` allocation.
/// §2.1's typed GPU buffer wrapper ([`crate::buffer::TypedBuffer`]) wraps
/// this with element typing; this type is the untyped base.
pub struct Buffer {
	pub(crate) raw: vk::Buffer,
	pub(crate) allocation: gpu_allocator::vulkan::Allocation,
	pub(crate) size: u64,
	pub(crate) device_address: GpuPtr,
	pub(crate) mapped_ptr: *mut u8,
}

unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl Buffer {
	pub fn raw(&self) -> vk::Buffer {
		self.raw
	}

	pub fn size(&self) -> u64 {
		self.size
	}

	pub fn device_address(&self) -> GpuPtr {
		self.device_address
	}

	/// Persistently-mapped host pointer. Null for [`Memory::GpuOnly`] buffers.
	pub fn mapped_ptr(&self) -> *mut u8 {
		self.mapped_ptr
	}

	/// # Safety
	/// `T` must match the buffer's contents, and no other writer may be
	/// concurrently mutating the same bytes.
	pub unsafe fn mapped_slice<T>(&self, count: usize) -> &mut [T] {
		debug_assert!(!self.mapped_ptr.is_null(), "buffer is not host-mapped");
		unsafe { std::slice::from_raw_parts_mut(self.mapped_ptr as *mut T, count) }
	}
}

/// Pixel formats the framebuffer set (§2.12) is built from. Narrowed from
/// the teacher's much larger `Format` enum to the handful this crate
/// actually allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
	Rgba32Float,
	Rgba16Float,
	Rg16Float,
	R32Float,
	Rgba8UNorm,
}

impl Format {
	pub(crate) fn to_vk(self) -> vk::Format {
		match self {
			Format::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
			Format::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
			Format::Rg16Float => vk::Format::R16G16_SFLOAT,
			Format::R32Float => vk::Format::R32_SFLOAT,
			Format::Rgba8UNorm => vk::Format::R8G8B8A8_UNORM,
		}
	}
}

bitflags::bitflags! {
	#[derive(Clone, Copy, PartialEq, Eq)]
	pub struct ImageUsage: u32 {
		const SHADER_RESOURCE = 1 << 0;
		const UNORDERED_ACCESS = 1 << 1;
		const TRANSFER = 1 << 2;
	}
}

#[derive(Clone, Copy)]
pub struct ImageDesc {
	pub width: u32,
	pub height: u32,
	pub format: Format,
	pub usage: ImageUsage,
}

/// Owning 2-D image: a `VkImage`, its `gpu-allocator` allocation, and a
/// full-resource `VkImageView` (§2.12 — the framebuffer set's storage
/// images never need mip or array slicing).
pub struct Image {
	pub(crate) raw: vk::Image,
	pub(crate) view: vk::ImageView,
	pub(crate) allocation: gpu_allocator::vulkan::Allocation,
	pub(crate) format: Format,
	pub(crate) width: u32,
	pub(crate) height: u32,
}

unsafe impl Send for Image {}
unsafe impl Sync for Image {}

impl Image {
	pub fn raw(&self) -> vk::Image {
		self.raw
	}

	pub fn view(&self) -> vk::ImageView {
		self.view
	}

	pub fn format(&self) -> Format {
		self.format
	}

	pub fn width(&self) -> u32 {
		self.width
	}

	pub fn height(&self) -> u32 {
		self.height
	}
}

/// A single buffer copy region, as recorded by [`CmdList::copy_buffer`].
#[derive(Clone, Copy)]
pub struct BufferCopy {
	pub src_offset: u64,
	pub dst_offset: u64,
	pub size: u64,
}

/// Command buffer recording handle for one frame-in-flight slot. Cheap to
/// copy, like the `vk::CommandBuffer` it wraps — ownership of the
/// underlying command buffer stays with whichever ring slot allocated it.
#[derive(Clone, Copy)]
pub struct CmdList {
	pub(crate) raw: vk::CommandBuffer,
}

impl CmdList {
	pub fn raw(&self) -> vk::CommandBuffer {
		self.raw
	}

	pub fn copy_buffer(&self, device: &Device, src: &Buffer, dst: &Buffer, regions: &[BufferCopy]) {
		let vk_regions: Vec<vk::BufferCopy> =
			regions.iter().map(|r| vk::BufferCopy { src_offset: r.src_offset, dst_offset: r.dst_offset, size: r.size }).collect();

		unsafe { device.raw().cmd_copy_buffer(self.raw, src.raw, dst.raw, &vk_regions) };
	}

	/// Buffer-memory barrier transitioning `TRANSFER_WRITE` to
	/// `ALL_COMMANDS`/`MEMORY_READ` over the given ranges only (§4.1).
	pub fn copy_barrier(&self, device: &Device, buffer: &Buffer, ranges: &[Range<u64>]) {
		let barriers: Vec<vk::BufferMemoryBarrier> = ranges
			.iter()
			.map(|r| {
				vk::BufferMemoryBarrier::builder()
					.src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
					.dst_access_mask(vk::AccessFlags::MEMORY_READ)
					.buffer(buffer.raw)
					.offset(r.start)
					.size(r.end - r.start)
					.build()
			})
			.collect();

		unsafe {
			device.raw().cmd_pipeline_barrier(
				self.raw,
				vk::PipelineStageFlags::TRANSFER,
				vk::PipelineStageFlags::ALL_COMMANDS,
				vk::DependencyFlags::empty(),
				&[],
				&barriers,
				&[],
			)
		};
	}

	/// Global memory barrier transitioning AS writes to AS reads (§4.3),
	/// issued once per frame between bottom- and top-level builds, and again
	/// before any raygen dispatch that reads the TLAS (§5).
	pub fn build_memory_barrier(&self, device: &Device) {
		let barrier = vk::MemoryBarrier::builder()
			.src_access_mask(vk::AccessFlags::ACCELERATION_STRUCTURE_WRITE_KHR)
			.dst_access_mask(vk::AccessFlags::ACCELERATION_STRUCTURE_READ_KHR | vk::AccessFlags::SHADER_READ)
			.build();

		unsafe {
			device.raw().cmd_pipeline_barrier(
				self.raw,
				vk::PipelineStageFlags::ACCELERATION_STRUCTURE_BUILD_KHR,
				vk::PipelineStageFlags::ACCELERATION_STRUCTURE_BUILD_KHR | vk::PipelineStageFlags::RAY_TRACING_SHADER_KHR,
				vk::DependencyFlags::empty(),
				&[barrier],
				&[],
				&[],
			)
		};
	}

	/// Full-resource layout transition for one image, used when the
	/// framebuffer set (§2.12) hands an image between shader-write and
	/// shader-read use across the frame's raygen stages.
	pub fn image_barrier(&self, device: &Device, image: &Image, from: vk::ImageLayout, to: vk::ImageLayout) {
		let barrier = vk::ImageMemoryBarrier::builder()
			.old_layout(from)
			.new_layout(to)
			.src_access_mask(vk::AccessFlags::SHADER_WRITE)
			.dst_access_mask(vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE)
			.image(image.raw)
			.subresource_range(vk::ImageSubresourceRange {
				aspect_mask: vk::ImageAspectFlags::COLOR,
				base_mip_level: 0,
				level_count: 1,
				base_array_layer: 0,
				layer_count: 1,
			})
			.build();

		unsafe {
			device.raw().cmd_pipeline_barrier(
				self.raw,
				vk::PipelineStageFlags::ALL_COMMANDS,
				vk::PipelineStageFlags::ALL_COMMANDS,
				vk::DependencyFlags::empty(),
				&[],
				&[],
				&[barrier],
			)
		};
	}

	pub fn dispatch(&self, device: &Device, x: u32, y: u32, z: u32) {
		unsafe { device.raw().cmd_dispatch(self.raw, x, y, z) };
	}

	pub fn dispatch_rays(
		&self,
		device: &Device,
		raygen: &vk::StridedDeviceAddressRegionKHR,
		miss: &vk::StridedDeviceAddressRegionKHR,
		hit: &vk::StridedDeviceAddressRegionKHR,
		callable: &vk::StridedDeviceAddressRegionKHR,
		width: u32,
		height: u32,
		depth: u32,
	) {
		unsafe {
			device.rt_pipeline_fns().cmd_trace_rays(self.raw, raygen, miss, hit, callable, width, height, depth)
		};
	}

	/// Records one acceleration-structure build. `update` re-uses `dst`'s
	/// existing backing memory instead of building from scratch (§4.3).
	pub fn build_acceleration_structure(&self, device: &Device, build: &AsBuild) {
		let mut geometries: Vec<vk::AccelerationStructureGeometryKHR> = Vec::new();
		let mut range_infos: Vec<vk::AccelerationStructureBuildRangeInfoKHR> = Vec::new();

		match &build.inputs {
			AsBuildInputs::Triangles(triangles) => {
				for t in triangles {
					let triangles_data = vk::AccelerationStructureGeometryTrianglesDataKHR::builder()
						.vertex_format(vk::Format::R32G32B32_SFLOAT)
						.vertex_data(vk::DeviceOrHostAddressConstKHR { device_address: t.vertex_buffer.0 })
						.vertex_stride(t.vertex_stride)
						.max_vertex(t.max_vertex)
						.index_type(vk::IndexType::UINT32)
						.index_data(vk::DeviceOrHostAddressConstKHR { device_address: t.index_buffer.0 });

					geometries.push(
						vk::AccelerationStructureGeometryKHR::builder()
							.geometry_type(vk::GeometryTypeKHR::TRIANGLES)
							.geometry(vk::AccelerationStructureGeometryDataKHR { triangles: triangles_data.build() })
							.flags(t.flags)
							.build(),
					);

					range_infos.push(
						vk::AccelerationStructureBuildRangeInfoKHR::builder()
							.primitive_count(t.primitive_count)
							.primitive_offset(t.primitive_offset)
							.first_vertex(t.first_vertex)
							.build(),
					);
				}
			}
			AsBuildInputs::Instances { data, count } => {
				let instances_data = vk::AccelerationStructureGeometryInstancesDataKHR::builder()
					.array_of_pointers(false)
					.data(vk::DeviceOrHostAddressConstKHR { device_address: data.0 });

				geometries.push(
					vk::AccelerationStructureGeometryKHR::builder()
						.geometry_type(vk::GeometryTypeKHR::INSTANCES)
						.geometry(vk::AccelerationStructureGeometryDataKHR { instances: instances_data.build() })
						.build(),
				);

				range_infos.push(vk::AccelerationStructureBuildRangeInfoKHR::builder().primitive_count(*count).build());
			}
		}

		let mut geometry_info = vk::AccelerationStructureBuildGeometryInfoKHR::builder()
			.ty(build.kind)
			.flags(build.flags)
			.mode(if build.update { vk::BuildAccelerationStructureModeKHR::UPDATE } else { vk::BuildAccelerationStructureModeKHR::BUILD })
			.dst_acceleration_structure(build.dst)
			.scratch_data(vk::DeviceOrHostAddressKHR { device_address: build.scratch.0 })
			.geometries(&geometries);

		if build.update {
			geometry_info = geometry_info.src_acceleration_structure(build.dst);
		}

		let range_info_ptrs: Vec<*const vk::AccelerationStructureBuildRangeInfoKHR> = range_infos.iter().map(|r| r as *const _).collect();

		unsafe {
			device.as_fns().cmd_build_acceleration_structures(self.raw, &[geometry_info.build()], &[&range_info_ptrs[..]])
		};
	}
}

/// One triangle-geometry input to a bottom-level build.
#[derive(Clone, Copy)]
pub struct AsTriangleGeometry {
	pub vertex_buffer: GpuPtr,
	pub vertex_stride: u64,
	pub max_vertex: u32,
	pub index_buffer: GpuPtr,
	pub primitive_count: u32,
	pub primitive_offset: u32,
	pub first_vertex: u32,
	pub flags: vk::GeometryFlagsKHR,
}

pub enum AsBuildInputs {
	Triangles(Vec<AsTriangleGeometry>),
	Instances { data: GpuPtr, count: u32 },
}

/// A queued build, as enqueued by [`crate::as_builder::AsBuilder`] and
/// flushed in one call to [`CmdList::build_acceleration_structure`]. `dst`
/// is the raw handle rather than a borrow of the owning
/// [`AccelerationStructure`], since the builder's queue must outlive any
/// one borrow of the AS manager's BLAS/TLAS collections.
pub struct AsBuild {
	pub kind: vk::AccelerationStructureTypeKHR,
	pub flags: vk::BuildAccelerationStructureFlagsKHR,
	pub update: bool,
	pub dst: vk::AccelerationStructureKHR,
	pub scratch: GpuPtr,
	pub inputs: AsBuildInputs,
}

#[derive(Debug, Clone, Copy)]
pub struct AsBuildSizes {
	pub acceleration_structure_size: u64,
	pub build_scratch_size: u64,
	pub update_scratch_size: u64,
}

/// An owning acceleration structure: a `VkAccelerationStructureKHR` plus its
/// backing buffer and device address (§4.4).
pub struct AccelerationStructure {
	pub(crate) raw: vk::AccelerationStructureKHR,
	pub(crate) buffer: Buffer,
	pub(crate) device_address: GpuPtr,
}

impl AccelerationStructure {
	pub fn raw(&self) -> vk::AccelerationStructureKHR {
		self.raw
	}

	pub fn device_address(&self) -> GpuPtr {
		self.device_address
	}

	pub fn buffer(&self) -> &Buffer {
		&self.buffer
	}
}
