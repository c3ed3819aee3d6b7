//! Descriptor management (§2.14): the stable descriptor-set layouts bound
//! once at pipeline-creation time, and the per-frame sets allocated against
//! them.
//!
//! Every buffer resource in this crate (§2.1's typed buffers, the AS
//! manager's instance table, the light manager's buffers) is already
//! addressed bindlessly — everything exposes a `GpuPtr` device address
//! rather than a raw `VkBuffer` handle (see [`crate::buffer`],
//! [`crate::as_manager`], [`crate::light`]). The only resources that
//! genuinely need descriptor bindings are ones Vulkan has no
//! buffer-device-address equivalent for: the top-level acceleration
//! structure (§2.4/§2.6) and the framebuffer set's storage images
//! (§2.12). Every other address is gathered into one small per-frame
//! uniform buffer (§2.1) instead of one descriptor binding per resource —
//! a consolidation of the teacher's original per-manager descriptor sets
//! (`ASManager`/`GlobalUniform`/`LightManager`/`Framebuffers` each exposing
//! their own `GetDescSetLayout()`), recorded in `DESIGN.md`.

use crate::buffer::TypedBuffer;
use crate::error::RtResult;
use crate::framebuffer::FramebufferSet;
use crate::gpu::{BufferUsage, Device, GpuPtr, Memory};
use crate::MAX_FRAMES_IN_FLIGHT;

use ash::vk;

pub const TLAS_SET_INDEX: u32 = 0;
pub const UNIFORM_SET_INDEX: u32 = 1;
pub const FRAMEBUFFER_SET_INDEX: u32 = 2;

const FRAMEBUFFER_IMAGE_COUNT: u32 = 7;

/// Every bindless address and per-frame scalar the raygen stages need,
/// gathered into one uniform buffer (§2.14).
#[derive(Clone, Copy, Default)]
#[repr(C)]
pub struct FrameUniform {
	pub instance_table: GpuPtr,
	pub lights: GpuPtr,
	pub lights_prev: GpuPtr,
	pub match_prev: GpuPtr,
	pub plain_light_list: GpuPtr,
	pub sector_to_region: GpuPtr,
	pub light_grid: GpuPtr,
	pub light_grid_prev: GpuPtr,
	pub frame_index: u32,
	pub light_count: u32,
	pub light_count_prev: u32,
	pub _pad: u32,
}

/// Owns the pipeline's three stable descriptor-set layouts and the
/// per-frame sets allocated from them (§2.14).
pub struct DescriptorManager {
	pool: vk::DescriptorPool,
	tlas_layout: vk::DescriptorSetLayout,
	uniform_layout: vk::DescriptorSetLayout,
	framebuffer_layout: vk::DescriptorSetLayout,
	tlas_sets: [vk::DescriptorSet; MAX_FRAMES_IN_FLIGHT],
	uniform_sets: [vk::DescriptorSet; MAX_FRAMES_IN_FLIGHT],
	framebuffer_sets: [vk::DescriptorSet; MAX_FRAMES_IN_FLIGHT],
	uniform: TypedBuffer<FrameUniform>,
}

impl DescriptorManager {
	pub fn new(device: &mut Device) -> RtResult<Self> {
		let tlas_layout = device.create_descriptor_set_layout(&[vk::DescriptorSetLayoutBinding::builder()
			.binding(0)
			.descriptor_type(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR)
			.descriptor_count(1)
			.stage_flags(vk::ShaderStageFlags::RAYGEN_KHR | vk::ShaderStageFlags::CLOSEST_HIT_KHR)
			.build()])?;

		let uniform_layout = device.create_descriptor_set_layout(&[vk::DescriptorSetLayoutBinding::builder()
			.binding(0)
			.descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
			.descriptor_count(1)
			.stage_flags(vk::ShaderStageFlags::RAYGEN_KHR | vk::ShaderStageFlags::CLOSEST_HIT_KHR | vk::ShaderStageFlags::COMPUTE)
			.build()])?;

		let framebuffer_bindings: Vec<vk::DescriptorSetLayoutBinding> = (0..FRAMEBUFFER_IMAGE_COUNT)
			.map(|binding| {
				vk::DescriptorSetLayoutBinding::builder()
					.binding(binding)
					.descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
					.descriptor_count(1)
					.stage_flags(vk::ShaderStageFlags::RAYGEN_KHR | vk::ShaderStageFlags::COMPUTE)
					.build()
			})
			.collect();
		let framebuffer_layout = device.create_descriptor_set_layout(&framebuffer_bindings)?;

		let pool_sizes = [
			vk::DescriptorPoolSize {
				ty: vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
				descriptor_count: MAX_FRAMES_IN_FLIGHT as u32,
			},
			vk::DescriptorPoolSize { ty: vk::DescriptorType::UNIFORM_BUFFER, descriptor_count: MAX_FRAMES_IN_FLIGHT as u32 },
			vk::DescriptorPoolSize {
				ty: vk::DescriptorType::STORAGE_IMAGE,
				descriptor_count: MAX_FRAMES_IN_FLIGHT as u32 * FRAMEBUFFER_IMAGE_COUNT,
			},
		];
		let pool = device.create_descriptor_pool(&pool_sizes, 3 * MAX_FRAMES_IN_FLIGHT as u32)?;

		let tlas_sets = device.allocate_descriptor_sets(pool, &[tlas_layout; MAX_FRAMES_IN_FLIGHT])?;
		let uniform_sets = device.allocate_descriptor_sets(pool, &[uniform_layout; MAX_FRAMES_IN_FLIGHT])?;
		let framebuffer_sets = device.allocate_descriptor_sets(pool, &[framebuffer_layout; MAX_FRAMES_IN_FLIGHT])?;

		let uniform =
			TypedBuffer::<FrameUniform>::new(device, MAX_FRAMES_IN_FLIGHT, BufferUsage::TRANSFER, Memory::CpuToGpu)?;

		Ok(Self {
			pool,
			tlas_layout,
			uniform_layout,
			framebuffer_layout,
			tlas_sets: tlas_sets.try_into().unwrap_or_else(|_| unreachable!()),
			uniform_sets: uniform_sets.try_into().unwrap_or_else(|_| unreachable!()),
			framebuffer_sets: framebuffer_sets.try_into().unwrap_or_else(|_| unreachable!()),
			uniform,
		})
	}

	pub fn set_layouts(&self) -> [vk::DescriptorSetLayout; 3] {
		[self.tlas_layout, self.uniform_layout, self.framebuffer_layout]
	}

	pub fn sets(&self, frame: usize) -> [vk::DescriptorSet; 3] {
		[self.tlas_sets[frame], self.uniform_sets[frame], self.framebuffer_sets[frame]]
	}

	/// Writes this frame's uniform buffer and rebinds the TLAS descriptor
	/// (§4.5 step 7 — only valid once a TLAS has actually been built this
	/// frame, per §4.4).
	pub fn update_frame(&mut self, device: &Device, frame: usize, tlas: vk::AccelerationStructureKHR, values: FrameUniform) {
		self.uniform.mapped(MAX_FRAMES_IN_FLIGHT)[frame] = values;

		let mut accel_write = vk::WriteDescriptorSetAccelerationStructureKHR::builder()
			.acceleration_structures(std::slice::from_ref(&tlas));
		let accel_set_write = vk::WriteDescriptorSet::builder()
			.push_next(&mut accel_write)
			.dst_set(self.tlas_sets[frame])
			.dst_binding(0)
			.descriptor_type(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR)
			.descriptor_count(1)
			.build();

		let buffer_info = vk::DescriptorBufferInfo {
			buffer: self.uniform.raw().raw(),
			offset: (frame * std::mem::size_of::<FrameUniform>()) as u64,
			range: std::mem::size_of::<FrameUniform>() as u64,
		};
		let uniform_write = vk::WriteDescriptorSet::builder()
			.dst_set(self.uniform_sets[frame])
			.dst_binding(0)
			.descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
			.buffer_info(std::slice::from_ref(&buffer_info))
			.build();

		device.update_descriptor_sets(&[accel_set_write, uniform_write]);
	}

	/// Rebinds the framebuffer image set; called once after
	/// [`FramebufferSet::new`]/`resize` (§2.12, §7's transient resize path).
	pub fn update_framebuffer(&mut self, device: &Device, frame: usize, fb: &FramebufferSet) {
		let images = [
			fb.gbuffer().albedo.view(),
			fb.gbuffer().normal.view(),
			fb.gbuffer().depth.view(),
			fb.gbuffer().motion_vectors.view(),
			fb.history_current(frame).view(),
			fb.history_prev(frame).view(),
			fb.output().view(),
		];

		let image_infos: Vec<vk::DescriptorImageInfo> = images
			.iter()
			.map(|&view| vk::DescriptorImageInfo { sampler: vk::Sampler::null(), image_view: view, image_layout: vk::ImageLayout::GENERAL })
			.collect();

		let writes: Vec<vk::WriteDescriptorSet> = image_infos
			.iter()
			.enumerate()
			.map(|(binding, info)| {
				vk::WriteDescriptorSet::builder()
					.dst_set(self.framebuffer_sets[frame])
					.dst_binding(binding as u32)
					.descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
					.image_info(std::slice::from_ref(info))
					.build()
			})
			.collect();

		device.update_descriptor_sets(&writes);
	}

	pub fn destroy(self, device: &mut Device) {
		self.uniform.destroy(device);
		device.destroy_descriptor_set_layout(self.tlas_layout);
		device.destroy_descriptor_set_layout(self.uniform_layout);
		device.destroy_descriptor_set_layout(self.framebuffer_layout);
		device.destroy_descriptor_pool(self.pool);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn framebuffer_image_count_matches_binding_list() {
		assert_eq!(FRAMEBUFFER_IMAGE_COUNT, 7);
	}
}
