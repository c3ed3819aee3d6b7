//! Ray-tracing pipeline and shader binding table (§2.11). Shader
//! compilation itself is an external collaborator's job (§1); this module
//! only wires already-compiled SPIR-V into a `VkPipeline` and lays out the
//! handles it returns into one buffer with the addressing `dispatch_rays`
//! expects.
//!
//! Grounded on `original_source/Source/RayTracingPipeline.h`/`.cpp`
//! (RTGL1's `RayTracingPipeline`), restated without its material/texture
//! descriptor wiring (owned by [`crate::descriptors`] here) and extended
//! with the two extra raygen stages (§4.7 step 4) this engine's fixed
//! sequence adds beyond the original's six.

use crate::buffer::TypedBuffer;
use crate::error::RtResult;
use crate::gpu::{BufferUsage, CmdList, Device, GpuPtr, Memory};
use crate::util::align_pow2;

use ash::vk;

/// One compiled SPIR-V module per entry point the pipeline binds (§AMBIENT
/// shader-compilation note). The host compiles shaders however it likes;
/// this is the only interface `src/pipeline.rs` needs from it.
pub trait ShaderSource {
	fn spirv(&self, stage: ShaderStage) -> &[u8];
}

/// Every shader stage the pipeline's shader groups reference, in the exact
/// order `RayTracingPipeline::new` assembles its shader-stage array — the
/// index of each variant here is its `VkPipelineShaderStageCreateInfo`
/// index, which the group-creation calls below reference directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ShaderStage {
	RaygenPrimary = 0,
	RaygenReflRefr = 1,
	RaygenDirect = 2,
	RaygenIndirectInit = 3,
	RaygenGradients = 4,
	RaygenInitialReservoirs = 5,
	RaygenIndirectFinal = 6,
	RaygenVolumetric = 7,
	MissDefault = 8,
	MissShadow = 9,
	ClosestHitOpaque = 10,
	AnyHitAlphaTest = 11,
}

const STAGE_ORDER: [ShaderStage; 12] = [
	ShaderStage::RaygenPrimary,
	ShaderStage::RaygenReflRefr,
	ShaderStage::RaygenDirect,
	ShaderStage::RaygenIndirectInit,
	ShaderStage::RaygenGradients,
	ShaderStage::RaygenInitialReservoirs,
	ShaderStage::RaygenIndirectFinal,
	ShaderStage::RaygenVolumetric,
	ShaderStage::MissDefault,
	ShaderStage::MissShadow,
	ShaderStage::ClosestHitOpaque,
	ShaderStage::AnyHitAlphaTest,
];

/// Index of each raygen stage in the shader binding table's raygen region
/// (§4.7 step 4's fixed order), i.e. the `sbtRayGenIndex` `dispatch_rays`
/// is called with for that stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RaygenStage {
	Primary = 0,
	ReflRefr = 1,
	Direct = 2,
	IndirectInit = 3,
	Gradients = 4,
	InitialReservoirs = 5,
	IndirectFinal = 6,
	Volumetric = 7,
}

const RAYGEN_COUNT: u32 = 8;
const MISS_COUNT: u32 = 2;

/// Hit-group index for a fully opaque surface (§2.5, §4.5.1) — closest-hit
/// only, matching [`crate::as_manager`]'s `SBT_INDEX_HITGROUP_FULLY_OPAQUE`.
pub const SBT_INDEX_HITGROUP_FULLY_OPAQUE: u32 = 0;
/// Hit-group index for an alpha-tested surface — any-hit then closest-hit,
/// matching `SBT_INDEX_HITGROUP_ALPHA_TESTED`.
pub const SBT_INDEX_HITGROUP_ALPHA_TESTED: u32 = 1;
const HIT_GROUP_COUNT: u32 = 2;

const TOTAL_GROUP_COUNT: u32 = RAYGEN_COUNT + MISS_COUNT + HIT_GROUP_COUNT;

/// The ray-tracing pipeline and its shader binding table (§2.11).
pub struct Pipeline {
	layout: vk::PipelineLayout,
	raw: vk::Pipeline,
	sbt: TypedBuffer<u8>,
	aligned_handle_size: u32,
}

impl Pipeline {
	/// Builds the pipeline from `set_layouts` (owned by
	/// [`crate::descriptors`]) and `shaders`, then immediately queries and
	/// packs the shader group handles into the binding table (§2.11).
	pub fn new(
		device: &mut Device,
		set_layouts: &[vk::DescriptorSetLayout],
		shaders: &dyn ShaderSource,
		max_recursion_depth: u32,
	) -> RtResult<Self> {
		let layout = device.create_pipeline_layout(set_layouts, &[])?;

		let modules: Vec<vk::ShaderModule> =
			STAGE_ORDER.iter().map(|&stage| device.create_shader_module(shaders.spirv(stage))).collect::<RtResult<_>>()?;

		let entry_point = std::ffi::CStr::from_bytes_with_nul(b"main\0").unwrap();
		let stage_infos: Vec<vk::PipelineShaderStageCreateInfo> = STAGE_ORDER
			.iter()
			.zip(&modules)
			.map(|(&stage, &module)| {
				vk::PipelineShaderStageCreateInfo::builder()
					.stage(stage_flags(stage))
					.module(module)
					.name(entry_point)
					.build()
			})
			.collect();

		let mut groups = Vec::with_capacity(TOTAL_GROUP_COUNT as usize);
		for i in 0..RAYGEN_COUNT + MISS_COUNT {
			groups.push(general_group(i));
		}
		groups.push(hit_group(ShaderStage::ClosestHitOpaque as u32, vk::SHADER_UNUSED_KHR));
		groups.push(hit_group(ShaderStage::ClosestHitOpaque as u32, ShaderStage::AnyHitAlphaTest as u32));

		let raw = device.create_ray_tracing_pipeline(layout, &stage_infos, &groups, max_recursion_depth);

		for module in modules {
			device.destroy_shader_module(module);
		}
		let raw = raw?;

		let handle_size = device.rt_pipeline_properties().shader_group_handle_size;
		let base_alignment = device.rt_pipeline_properties().shader_group_base_alignment;
		let aligned_handle_size = align_pow2(handle_size as u64, base_alignment as u64) as u32;

		let handles = device.ray_tracing_shader_group_handles(raw, 0, TOTAL_GROUP_COUNT)?;

		let sbt_size = aligned_handle_size as usize * TOTAL_GROUP_COUNT as usize;
		let sbt = TypedBuffer::<u8>::new(
			device,
			sbt_size,
			BufferUsage::SHADER_BINDING_TABLE | BufferUsage::TRANSFER,
			Memory::CpuToGpu,
		)?;
		{
			let mapped = sbt.mapped(sbt_size);
			for i in 0..TOTAL_GROUP_COUNT as usize {
				let src = &handles[i * handle_size as usize..(i + 1) * handle_size as usize];
				let dst_offset = i * aligned_handle_size as usize;
				mapped[dst_offset..dst_offset + handle_size as usize].copy_from_slice(src);
			}
		}

		Ok(Self { layout, raw, sbt, aligned_handle_size })
	}

	pub fn layout(&self) -> vk::PipelineLayout {
		self.layout
	}

	pub fn bind(&self, device: &Device, cmd: &CmdList) {
		unsafe { device.raw().cmd_bind_pipeline(cmd.raw(), vk::PipelineBindPoint::RAY_TRACING_KHR, self.raw) };
	}

	/// The four strided address regions `dispatch_rays` needs for `stage`
	/// (§2.11). Callable shaders are out of scope (§1), so that region is
	/// always empty, matching the original's behavior.
	pub fn entries(
		&self,
		stage: RaygenStage,
	) -> (
		vk::StridedDeviceAddressRegionKHR,
		vk::StridedDeviceAddressRegionKHR,
		vk::StridedDeviceAddressRegionKHR,
		vk::StridedDeviceAddressRegionKHR,
	) {
		let base: GpuPtr = self.sbt.device_address();
		let stride = self.aligned_handle_size as u64;

		let raygen = vk::StridedDeviceAddressRegionKHR {
			device_address: base.0 + stage as u64 * stride,
			stride,
			size: stride,
		};

		let mut offset = RAYGEN_COUNT as u64 * stride;
		let miss = vk::StridedDeviceAddressRegionKHR {
			device_address: base.0 + offset,
			stride,
			size: MISS_COUNT as u64 * stride,
		};
		offset += MISS_COUNT as u64 * stride;

		let hit = vk::StridedDeviceAddressRegionKHR {
			device_address: base.0 + offset,
			stride,
			size: HIT_GROUP_COUNT as u64 * stride,
		};

		(raygen, miss, hit, vk::StridedDeviceAddressRegionKHR::default())
	}

	pub fn destroy(self, device: &mut Device) {
		self.sbt.destroy(device);
		device.destroy_pipeline(self.raw);
		device.destroy_pipeline_layout(self.layout);
	}
}

fn stage_flags(stage: ShaderStage) -> vk::ShaderStageFlags {
	match stage {
		ShaderStage::RaygenPrimary
		| ShaderStage::RaygenReflRefr
		| ShaderStage::RaygenDirect
		| ShaderStage::RaygenIndirectInit
		| ShaderStage::RaygenGradients
		| ShaderStage::RaygenInitialReservoirs
		| ShaderStage::RaygenIndirectFinal
		| ShaderStage::RaygenVolumetric => vk::ShaderStageFlags::RAYGEN_KHR,
		ShaderStage::MissDefault | ShaderStage::MissShadow => vk::ShaderStageFlags::MISS_KHR,
		ShaderStage::ClosestHitOpaque => vk::ShaderStageFlags::CLOSEST_HIT_KHR,
		ShaderStage::AnyHitAlphaTest => vk::ShaderStageFlags::ANY_HIT_KHR,
	}
}

fn general_group(stage_index: u32) -> vk::RayTracingShaderGroupCreateInfoKHR {
	vk::RayTracingShaderGroupCreateInfoKHR::builder()
		.ty(vk::RayTracingShaderGroupTypeKHR::GENERAL)
		.general_shader(stage_index)
		.closest_hit_shader(vk::SHADER_UNUSED_KHR)
		.any_hit_shader(vk::SHADER_UNUSED_KHR)
		.intersection_shader(vk::SHADER_UNUSED_KHR)
		.build()
}

fn hit_group(closest_hit: u32, any_hit: u32) -> vk::RayTracingShaderGroupCreateInfoKHR {
	vk::RayTracingShaderGroupCreateInfoKHR::builder()
		.ty(vk::RayTracingShaderGroupTypeKHR::TRIANGLES_HIT_GROUP)
		.general_shader(vk::SHADER_UNUSED_KHR)
		.closest_hit_shader(closest_hit)
		.any_hit_shader(any_hit)
		.intersection_shader(vk::SHADER_UNUSED_KHR)
		.build()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hit_group_indices_match_as_manager_constants() {
		assert_eq!(SBT_INDEX_HITGROUP_FULLY_OPAQUE, 0);
		assert_eq!(SBT_INDEX_HITGROUP_ALPHA_TESTED, 1);
	}

	#[test]
	fn raygen_stage_order_matches_fixed_sequence() {
		let ordered =
			[RaygenStage::Primary, RaygenStage::ReflRefr, RaygenStage::Direct, RaygenStage::IndirectInit,
				RaygenStage::Gradients, RaygenStage::InitialReservoirs, RaygenStage::IndirectFinal, RaygenStage::Volumetric];
		for (i, stage) in ordered.iter().enumerate() {
			assert_eq!(*stage as u32, i as u32);
		}
	}
}
