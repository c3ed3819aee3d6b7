//! Vulkan instance/device bootstrap: physical device selection, the
//! acceleration-structure and ray-tracing-pipeline feature chain, and the
//! `gpu-allocator` suballocator. Grounded on the teacher's `Device::new`
//! (`crates/gpu/src/vulkan/mod.rs`), adjusted to the `ash` 0.37 builder API
//! this crate actually depends on (the teacher's `crates/gpu` targets a
//! newer `ash` than its root crate; this crate follows the root crate's
//! pin).

use crate::error::{RtError, RtResult};
use crate::gpu::{
	AccelerationStructure, AsBuildInputs, AsBuildSizes, Buffer, BufferDesc, BufferUsage, CmdList, GpuPtr, Image,
	ImageDesc, ImageUsage, Memory,
};

use ash::vk;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;

/// Host-supplied parameters for [`Device::new`]. Window and surface
/// *creation* are the host's job (§1, §9's callback-style surface-creation
/// note): the host creates the native window and hands this crate a raw
/// `VkSurfaceKHR` separately, to [`crate::gpu::Swapchain::new`]. This
/// struct only covers the instance/device bring-up that has no host
/// counterpart.
pub struct DeviceCreateInfo<'a> {
	pub application_name: &'a str,
	pub enable_validation: bool,
	/// Platform surface instance extensions the host's window system needs
	/// (e.g. `VK_KHR_win32_surface`), forwarded from
	/// [`crate::config::Config::window_surface_extensions`]. `VK_KHR_surface`
	/// itself is always enabled.
	pub window_surface_extensions: &'a [String],
}

impl Default for DeviceCreateInfo<'_> {
	fn default() -> Self {
		Self { application_name: "rtcore", enable_validation: cfg!(debug_assertions), window_surface_extensions: &[] }
	}
}

pub struct Device {
	entry: ash::Entry,
	instance: ash::Instance,
	device: ash::Device,
	physical_device: vk::PhysicalDevice,
	graphics_queue: vk::Queue,
	graphics_queue_family: u32,
	command_pool: vk::CommandPool,
	allocator: std::mem::ManuallyDrop<gpu_allocator::vulkan::Allocator>,
	acceleration_structure_ext: ash::extensions::khr::AccelerationStructure,
	ray_tracing_pipeline_ext: ash::extensions::khr::RayTracingPipeline,
	rt_pipeline_properties: vk::PhysicalDeviceRayTracingPipelinePropertiesKHR,
	debug_utils_ext: Option<ash::extensions::ext::DebugUtils>,
	debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

unsafe extern "system" fn debug_callback(
	message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
	_message_type: vk::DebugUtilsMessageTypeFlagsEXT,
	callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
	_user_data: *mut c_void,
) -> vk::Bool32 {
	let level = match message_severity {
		vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => log::Level::Debug,
		vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::Level::Info,
		vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::Level::Warn,
		_ => log::Level::Error,
	};

	let message = unsafe { CStr::from_ptr((*callback_data).p_message) };
	log::log!(target: "rtcore::gpu", level, "{}", message.to_string_lossy());

	vk::FALSE
}

fn pick_physical_device_and_queue_family(
	instance: &ash::Instance,
	required_extensions: &[&CStr],
) -> RtResult<(vk::PhysicalDevice, u32)> {
	let physical_devices =
		unsafe { instance.enumerate_physical_devices() }.map_err(|e| RtError::DeviceLost(e.to_string()))?;

	for physical_device in physical_devices {
		let supported = unsafe { instance.enumerate_device_extension_properties(physical_device) };
		let Ok(supported) = supported else { continue };

		let supported: std::collections::HashSet<&CStr> =
			supported.iter().map(|e| unsafe { CStr::from_ptr(e.extension_name.as_ptr() as *const c_char) }).collect();

		if !required_extensions.iter().all(|ext| supported.contains(ext)) {
			continue;
		}

		let queue_families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
		let graphics_family = queue_families
			.iter()
			.enumerate()
			.find(|(_, family)| family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS));

		if let Some((index, _)) = graphics_family {
			return Ok((physical_device, index as u32));
		}
	}

	Err(RtError::DeviceLost("no suitable ray-tracing-capable Vulkan device found".into()))
}

impl Device {
	pub fn new(desc: &DeviceCreateInfo) -> RtResult<Self> {
		let entry = unsafe { ash::Entry::load() }.map_err(|e| RtError::DeviceLost(e.to_string()))?;

		const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
		let mut layers: Vec<&CStr> = Vec::new();
		if desc.enable_validation {
			layers.push(VALIDATION_LAYER);
		}

		let mut instance_extensions: Vec<&CStr> = vec![ash::extensions::khr::Surface::name()];
		if desc.enable_validation {
			instance_extensions.push(ash::extensions::ext::DebugUtils::name());
		}
		let platform_extensions: Vec<CString> =
			desc.window_surface_extensions.iter().map(|s| CString::new(s.as_str()).unwrap_or_default()).collect();
		instance_extensions.extend(platform_extensions.iter().map(|s| s.as_c_str()));

		let application_name = CString::new(desc.application_name).unwrap_or_default();
		let engine_name = c"rtcore";

		let application_info = vk::ApplicationInfo::builder()
			.application_name(&application_name)
			.application_version(vk::make_api_version(0, 0, 1, 0))
			.engine_name(engine_name)
			.engine_version(vk::make_api_version(0, 0, 1, 0))
			.api_version(vk::API_VERSION_1_3);

		let layer_ptrs: Vec<*const c_char> = layers.iter().map(|s| s.as_ptr()).collect();
		let instance_extension_ptrs: Vec<*const c_char> = instance_extensions.iter().map(|s| s.as_ptr()).collect();

		let instance_create_info = vk::InstanceCreateInfo::builder()
			.application_info(&application_info)
			.enabled_layer_names(&layer_ptrs)
			.enabled_extension_names(&instance_extension_ptrs);

		let instance =
			unsafe { entry.create_instance(&instance_create_info, None) }.map_err(|e| RtError::DeviceLost(e.to_string()))?;

		let (debug_utils_ext, debug_messenger) = if desc.enable_validation {
			let ext = ash::extensions::ext::DebugUtils::new(&entry, &instance);

			let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
				.message_severity(
					vk::DebugUtilsMessageSeverityFlagsEXT::INFO
						| vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
						| vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
				)
				.message_type(
					vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
						| vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
						| vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
				)
				.pfn_user_callback(Some(debug_callback));

			let messenger = unsafe { ext.create_debug_utils_messenger(&create_info, None) }.ok();
			(Some(ext), messenger)
		} else {
			(None, None)
		};

		let device_extensions: [&CStr; 5] = [
			ash::extensions::khr::DeferredHostOperations::name(),
			ash::extensions::khr::AccelerationStructure::name(),
			ash::extensions::khr::RayTracingPipeline::name(),
			ash::extensions::khr::BufferDeviceAddress::name(),
			ash::extensions::khr::Swapchain::name(),
		];

		let (physical_device, graphics_queue_family) = pick_physical_device_and_queue_family(&instance, &device_extensions)?;

		let queue_priorities = [1.0f32];
		let queue_create_info =
			vk::DeviceQueueCreateInfo::builder().queue_family_index(graphics_queue_family).queue_priorities(&queue_priorities);
		let queue_create_infos = [queue_create_info.build()];

		let mut vulkan12_features = vk::PhysicalDeviceVulkan12Features::builder()
			.buffer_device_address(true)
			.descriptor_indexing(true)
			.runtime_descriptor_array(true)
			.shader_sampled_image_array_non_uniform_indexing(true)
			.shader_storage_buffer_array_non_uniform_indexing(true);

		let mut vulkan13_features =
			vk::PhysicalDeviceVulkan13Features::builder().dynamic_rendering(true).synchronization2(true);

		let mut as_features = vk::PhysicalDeviceAccelerationStructureFeaturesKHR::builder().acceleration_structure(true);

		let mut rt_pipeline_features =
			vk::PhysicalDeviceRayTracingPipelineFeaturesKHR::builder().ray_tracing_pipeline(true);

		let device_extension_ptrs: Vec<*const c_char> = device_extensions.iter().map(|s| s.as_ptr()).collect();

		let device_create_info = vk::DeviceCreateInfo::builder()
			.queue_create_infos(&queue_create_infos)
			.enabled_extension_names(&device_extension_ptrs)
			.push_next(&mut vulkan12_features)
			.push_next(&mut vulkan13_features)
			.push_next(&mut as_features)
			.push_next(&mut rt_pipeline_features);

		let device = unsafe { instance.create_device(physical_device, &device_create_info, None) }
			.map_err(|e| RtError::DeviceLost(e.to_string()))?;

		let mut rt_pipeline_properties = vk::PhysicalDeviceRayTracingPipelinePropertiesKHR::default();
		{
			let mut properties2 = vk::PhysicalDeviceProperties2::builder().push_next(&mut rt_pipeline_properties);
			unsafe { instance.get_physical_device_properties2(physical_device, &mut properties2) };
		}

		let allocator = gpu_allocator::vulkan::Allocator::new(&gpu_allocator::vulkan::AllocatorCreateDesc {
			instance: instance.clone(),
			device: device.clone(),
			physical_device,
			debug_settings: Default::default(),
			buffer_device_address: true,
			allocation_sizes: Default::default(),
		})
		.map_err(|e| RtError::DeviceLost(e.to_string()))?;

		let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };

		let command_pool = {
			let create_info = vk::CommandPoolCreateInfo::builder()
				.queue_family_index(graphics_queue_family)
				.flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

			unsafe { device.create_command_pool(&create_info, None) }.map_err(|e| RtError::DeviceLost(e.to_string()))?
		};

		let acceleration_structure_ext = ash::extensions::khr::AccelerationStructure::new(&instance, &device);
		let ray_tracing_pipeline_ext = ash::extensions::khr::RayTracingPipeline::new(&instance, &device);

		Ok(Self {
			entry,
			instance,
			device,
			physical_device,
			graphics_queue,
			graphics_queue_family,
			command_pool,
			allocator: std::mem::ManuallyDrop::new(allocator),
			acceleration_structure_ext,
			ray_tracing_pipeline_ext,
			rt_pipeline_properties,
			debug_utils_ext,
			debug_messenger,
		})
	}

	pub fn raw(&self) -> &ash::Device {
		&self.device
	}

	/// Needed to load extension function pointers (e.g. [`crate::gpu::Swapchain::new`]) outside this module.
	pub fn entry(&self) -> &ash::Entry {
		&self.entry
	}

	pub fn instance(&self) -> &ash::Instance {
		&self.instance
	}

	pub fn physical_device(&self) -> vk::PhysicalDevice {
		self.physical_device
	}

	pub fn graphics_queue(&self) -> vk::Queue {
		self.graphics_queue
	}

	pub fn graphics_queue_family(&self) -> u32 {
		self.graphics_queue_family
	}

	pub fn as_fns(&self) -> &ash::extensions::khr::AccelerationStructure {
		&self.acceleration_structure_ext
	}

	pub fn rt_pipeline_fns(&self) -> &ash::extensions::khr::RayTracingPipeline {
		&self.ray_tracing_pipeline_ext
	}

	/// The `shaderGroupHandleSize`/`shaderGroupBaseAlignment`/etc. queried
	/// once at device creation, consumed by the SBT layout (§2.11).
	pub fn rt_pipeline_properties(&self) -> &vk::PhysicalDeviceRayTracingPipelinePropertiesKHR {
		&self.rt_pipeline_properties
	}

	pub fn allocate_cmd_lists(&self, count: u32) -> RtResult<Vec<CmdList>> {
		let alloc_info = vk::CommandBufferAllocateInfo::builder()
			.command_pool(self.command_pool)
			.level(vk::CommandBufferLevel::PRIMARY)
			.command_buffer_count(count);

		let buffers =
			unsafe { self.device.allocate_command_buffers(&alloc_info) }.map_err(|e| RtError::DeviceLost(e.to_string()))?;

		Ok(buffers.into_iter().map(|raw| CmdList { raw }).collect())
	}

	pub fn begin_cmd_list(&self, cmd: &CmdList) -> RtResult<()> {
		unsafe { self.device.reset_command_buffer(cmd.raw, vk::CommandBufferResetFlags::empty()) }
			.map_err(|e| RtError::DeviceLost(e.to_string()))?;

		let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
		unsafe { self.device.begin_command_buffer(cmd.raw, &begin_info) }.map_err(|e| RtError::DeviceLost(e.to_string()))
	}

	pub fn end_cmd_list(&self, cmd: &CmdList) -> RtResult<()> {
		unsafe { self.device.end_command_buffer(cmd.raw) }.map_err(|e| RtError::DeviceLost(e.to_string()))
	}

	pub fn submit(&self, cmd: &CmdList, signal: Option<vk::Fence>) -> RtResult<()> {
		let buffers = [cmd.raw];
		let submit_info = vk::SubmitInfo::builder().command_buffers(&buffers);

		unsafe { self.device.queue_submit(self.graphics_queue, &[submit_info.build()], signal.unwrap_or(vk::Fence::null())) }
			.map_err(|e| RtError::DeviceLost(e.to_string()))
	}

	pub fn wait_idle(&self) -> RtResult<()> {
		unsafe { self.device.device_wait_idle() }.map_err(|e| RtError::DeviceLost(e.to_string()))
	}

	pub fn create_semaphore(&self) -> RtResult<vk::Semaphore> {
		unsafe { self.device.create_semaphore(&vk::SemaphoreCreateInfo::builder(), None) }
			.map_err(|e| RtError::DeviceLost(e.to_string()))
	}

	pub fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
		unsafe { self.device.destroy_semaphore(semaphore, None) };
	}

	/// Created signaled so the first `wait_for_fence` on a fresh frame slot
	/// (§4.7 step 1) does not block forever.
	pub fn create_fence_signaled(&self) -> RtResult<vk::Fence> {
		let create_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);
		unsafe { self.device.create_fence(&create_info, None) }.map_err(|e| RtError::DeviceLost(e.to_string()))
	}

	pub fn destroy_fence(&self, fence: vk::Fence) {
		unsafe { self.device.destroy_fence(fence, None) };
	}

	/// Unbounded wait, per §4.7's cancellation note — frames are expected
	/// to complete within one display interval.
	pub fn wait_for_fence(&self, fence: vk::Fence) -> RtResult<()> {
		unsafe { self.device.wait_for_fences(&[fence], true, u64::MAX) }.map_err(|e| RtError::DeviceLost(e.to_string()))
	}

	pub fn reset_fence(&self, fence: vk::Fence) -> RtResult<()> {
		unsafe { self.device.reset_fences(&[fence]) }.map_err(|e| RtError::DeviceLost(e.to_string()))
	}

	/// Submits `cmd`, waiting on `wait` at `COLOR_ATTACHMENT_OUTPUT` and
	/// signaling `signal_sem`/`signal_fence` on completion (§4.7 step 6).
	pub fn submit_frame(&self, cmd: &CmdList, wait: vk::Semaphore, signal_sem: vk::Semaphore, signal_fence: vk::Fence) -> RtResult<()> {
		let buffers = [cmd.raw];
		let waits = [wait];
		let stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
		let signals = [signal_sem];

		let submit_info = vk::SubmitInfo::builder()
			.wait_semaphores(&waits)
			.wait_dst_stage_mask(&stages)
			.command_buffers(&buffers)
			.signal_semaphores(&signals);

		unsafe { self.device.queue_submit(self.graphics_queue, &[submit_info.build()], signal_fence) }
			.map_err(|e| RtError::DeviceLost(e.to_string()))
	}

	/// Creates a buffer with `SHADER_DEVICE_ADDRESS` always set, as every
	/// acceleration-structure and geometry buffer in this crate needs its
	/// device address (§2.1, §4.1, §4.3).
	pub fn create_buffer(&mut self, desc: &BufferDesc) -> RtResult<Buffer> {
		let mut usage = vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
		if desc.usage.contains(BufferUsage::TRANSFER) {
			usage |= vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST;
		}
		if desc.usage.contains(BufferUsage::INDEX) {
			usage |= vk::BufferUsageFlags::INDEX_BUFFER;
		}
		if desc.usage.contains(BufferUsage::SHADER_RESOURCE) || desc.usage.contains(BufferUsage::UNORDERED_ACCESS) {
			usage |= vk::BufferUsageFlags::STORAGE_BUFFER;
		}
		if desc.usage.contains(BufferUsage::ACCELERATION_STRUCTURE) {
			usage |= vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR
				| vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR;
		}
		if desc.usage.contains(BufferUsage::SHADER_BINDING_TABLE) {
			usage |= vk::BufferUsageFlags::SHADER_BINDING_TABLE_KHR;
		}

		let create_info = vk::BufferCreateInfo::builder().size(desc.size).usage(usage).sharing_mode(vk::SharingMode::EXCLUSIVE);

		let raw = unsafe { self.device.create_buffer(&create_info, None) }.map_err(|e| RtError::DeviceLost(e.to_string()))?;
		let requirements = unsafe { self.device.get_buffer_memory_requirements(raw) };

		let location = match desc.memory {
			Memory::GpuOnly => gpu_allocator::MemoryLocation::GpuOnly,
			Memory::CpuToGpu => gpu_allocator::MemoryLocation::CpuToGpu,
		};

		let allocation = self
			.allocator
			.allocate(&gpu_allocator::vulkan::AllocationCreateDesc {
				name: "rtcore buffer",
				requirements,
				location,
				linear: true,
				allocation_scheme: gpu_allocator::vulkan::AllocationScheme::GpuAllocatorManaged,
			})
			.map_err(|e| RtError::OutOfMemory(e.to_string()))?;

		unsafe { self.device.bind_buffer_memory(raw, allocation.memory(), allocation.offset()) }
			.map_err(|e| RtError::DeviceLost(e.to_string()))?;

		let device_address =
			unsafe { self.device.get_buffer_device_address(&vk::BufferDeviceAddressInfo::builder().buffer(raw)) };

		let mapped_ptr = allocation.mapped_ptr().map(|p| p.as_ptr() as *mut u8).unwrap_or(std::ptr::null_mut());

		Ok(Buffer { raw, allocation, size: desc.size, device_address: GpuPtr(device_address), mapped_ptr })
	}

	pub fn destroy_buffer(&mut self, buffer: Buffer) {
		let Buffer { raw, allocation, .. } = buffer;
		if let Err(err) = self.allocator.free(allocation) {
			log::warn!(target: "rtcore::gpu", "failed to free buffer allocation: {err}");
		}
		unsafe { self.device.destroy_buffer(raw, None) };
	}

	/// Queries `VkAccelerationStructureBuildSizesKHR` for the given build
	/// inputs (§4.3's `bottom_build_sizes`/`top_build_sizes`).
	pub fn acceleration_structure_sizes(
		&self,
		kind: vk::AccelerationStructureTypeKHR,
		flags: vk::BuildAccelerationStructureFlagsKHR,
		inputs: &AsBuildInputs,
		primitive_counts: &[u32],
	) -> AsBuildSizes {
		let (geometries, max_primitive_counts): (Vec<vk::AccelerationStructureGeometryKHR>, Vec<u32>) = match inputs {
			AsBuildInputs::Triangles(triangles) => (
				triangles
					.iter()
					.map(|t| {
						let triangles_data = vk::AccelerationStructureGeometryTrianglesDataKHR::builder()
							.vertex_format(vk::Format::R32G32B32_SFLOAT)
							.vertex_stride(t.vertex_stride)
							.max_vertex(t.max_vertex)
							.index_type(vk::IndexType::UINT32);

						vk::AccelerationStructureGeometryKHR::builder()
							.geometry_type(vk::GeometryTypeKHR::TRIANGLES)
							.geometry(vk::AccelerationStructureGeometryDataKHR { triangles: triangles_data.build() })
							.flags(t.flags)
							.build()
					})
					.collect(),
				primitive_counts.to_vec(),
			),
			AsBuildInputs::Instances { count, .. } => (
				vec![vk::AccelerationStructureGeometryKHR::builder()
					.geometry_type(vk::GeometryTypeKHR::INSTANCES)
					.geometry(vk::AccelerationStructureGeometryDataKHR {
						instances: vk::AccelerationStructureGeometryInstancesDataKHR::default().build(),
					})
					.build()],
				vec![*count],
			),
		};

		let geometry_info = vk::AccelerationStructureBuildGeometryInfoKHR::builder()
			.ty(kind)
			.flags(flags)
			.mode(vk::BuildAccelerationStructureModeKHR::BUILD)
			.geometries(&geometries);

		let mut sizes = vk::AccelerationStructureBuildSizesInfoKHR::default();
		unsafe {
			self.acceleration_structure_ext.get_acceleration_structure_build_sizes(
				vk::AccelerationStructureBuildTypeKHR::DEVICE,
				&geometry_info,
				&max_primitive_counts,
				&mut sizes,
			)
		};

		AsBuildSizes {
			acceleration_structure_size: sizes.acceleration_structure_size,
			build_scratch_size: sizes.build_scratch_size,
			update_scratch_size: sizes.update_scratch_size,
		}
	}

	/// Creates the backing buffer (256-byte aligned, per Vulkan's AS
	/// alignment requirement) and the acceleration structure object itself.
	pub fn create_acceleration_structure(
		&mut self,
		kind: vk::AccelerationStructureTypeKHR,
		size: u64,
	) -> RtResult<AccelerationStructure> {
		let aligned_size = crate::util::align_pow2(size, 256);

		let buffer = self.create_buffer(&BufferDesc {
			size: aligned_size,
			usage: BufferUsage::ACCELERATION_STRUCTURE,
			memory: Memory::GpuOnly,
		})?;

		let create_info =
			vk::AccelerationStructureCreateInfoKHR::builder().buffer(buffer.raw()).size(aligned_size).ty(kind);

		let raw = unsafe { self.acceleration_structure_ext.create_acceleration_structure(&create_info, None) }
			.map_err(|e| RtError::DeviceLost(e.to_string()))?;

		let device_address = unsafe {
			self.acceleration_structure_ext
				.get_acceleration_structure_device_address(&vk::AccelerationStructureDeviceAddressInfoKHR::builder().acceleration_structure(raw))
		};

		Ok(AccelerationStructure { raw, buffer, device_address: GpuPtr(device_address) })
	}

	pub fn destroy_acceleration_structure(&mut self, accel: AccelerationStructure) {
		unsafe { self.acceleration_structure_ext.destroy_acceleration_structure(accel.raw, None) };
		self.destroy_buffer(accel.buffer);
	}

	/// Allocates a 2-D storage image plus a full-resource view (§2.12).
	pub fn create_image(&mut self, desc: &ImageDesc) -> RtResult<Image> {
		let mut usage = vk::ImageUsageFlags::empty();
		if desc.usage.contains(ImageUsage::SHADER_RESOURCE) {
			usage |= vk::ImageUsageFlags::SAMPLED;
		}
		if desc.usage.contains(ImageUsage::UNORDERED_ACCESS) {
			usage |= vk::ImageUsageFlags::STORAGE;
		}
		if desc.usage.contains(ImageUsage::TRANSFER) {
			usage |= vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
		}

		let format = desc.format.to_vk();
		let create_info = vk::ImageCreateInfo::builder()
			.image_type(vk::ImageType::TYPE_2D)
			.format(format)
			.extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
			.mip_levels(1)
			.array_layers(1)
			.samples(vk::SampleCountFlags::TYPE_1)
			.tiling(vk::ImageTiling::OPTIMAL)
			.usage(usage)
			.sharing_mode(vk::SharingMode::EXCLUSIVE)
			.initial_layout(vk::ImageLayout::UNDEFINED);

		let raw = unsafe { self.device.create_image(&create_info, None) }.map_err(|e| RtError::DeviceLost(e.to_string()))?;
		let requirements = unsafe { self.device.get_image_memory_requirements(raw) };

		let allocation = self
			.allocator
			.allocate(&gpu_allocator::vulkan::AllocationCreateDesc {
				name: "rtcore image",
				requirements,
				location: gpu_allocator::MemoryLocation::GpuOnly,
				linear: false,
				allocation_scheme: gpu_allocator::vulkan::AllocationScheme::GpuAllocatorManaged,
			})
			.map_err(|e| RtError::OutOfMemory(e.to_string()))?;

		unsafe { self.device.bind_image_memory(raw, allocation.memory(), allocation.offset()) }
			.map_err(|e| RtError::DeviceLost(e.to_string()))?;

		let view_create_info = vk::ImageViewCreateInfo::builder()
			.image(raw)
			.view_type(vk::ImageViewType::TYPE_2D)
			.format(format)
			.subresource_range(vk::ImageSubresourceRange {
				aspect_mask: vk::ImageAspectFlags::COLOR,
				base_mip_level: 0,
				level_count: 1,
				base_array_layer: 0,
				layer_count: 1,
			});

		let view = unsafe { self.device.create_image_view(&view_create_info, None) }.map_err(|e| RtError::DeviceLost(e.to_string()))?;

		Ok(Image { raw, view, allocation, format: desc.format, width: desc.width, height: desc.height })
	}

	pub fn destroy_image(&mut self, image: Image) {
		let Image { raw, view, allocation, .. } = image;
		if let Err(err) = self.allocator.free(allocation) {
			log::warn!(target: "rtcore::gpu", "failed to free image allocation: {err}");
		}
		unsafe {
			self.device.destroy_image_view(view, None);
			self.device.destroy_image(raw, None);
		}
	}

	/// Compiles a `VkShaderModule` from the SPIR-V a [`crate::pipeline::ShaderSource`]
	/// host implementation returns (§1: shader compilation is out of scope,
	/// only the module wrapping it is ours).
	pub fn create_shader_module(&self, spirv: &[u8]) -> RtResult<vk::ShaderModule> {
		debug_assert_eq!(spirv.len() % 4, 0, "SPIR-V bytecode must be a multiple of 4 bytes");
		let words: Vec<u32> = spirv.chunks_exact(4).map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]])).collect();
		let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);
		unsafe { self.device.create_shader_module(&create_info, None) }.map_err(|e| RtError::DeviceLost(e.to_string()))
	}

	pub fn destroy_shader_module(&self, module: vk::ShaderModule) {
		unsafe { self.device.destroy_shader_module(module, None) };
	}

	pub fn create_descriptor_set_layout(&self, bindings: &[vk::DescriptorSetLayoutBinding]) -> RtResult<vk::DescriptorSetLayout> {
		let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(bindings);
		unsafe { self.device.create_descriptor_set_layout(&create_info, None) }
			.map_err(|e| RtError::DeviceLost(e.to_string()))
	}

	pub fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
		unsafe { self.device.destroy_descriptor_set_layout(layout, None) };
	}

	pub fn create_descriptor_pool(&self, pool_sizes: &[vk::DescriptorPoolSize], max_sets: u32) -> RtResult<vk::DescriptorPool> {
		let create_info = vk::DescriptorPoolCreateInfo::builder()
			.pool_sizes(pool_sizes)
			.max_sets(max_sets)
			.flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET);
		unsafe { self.device.create_descriptor_pool(&create_info, None) }.map_err(|e| RtError::DeviceLost(e.to_string()))
	}

	pub fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
		unsafe { self.device.destroy_descriptor_pool(pool, None) };
	}

	pub fn allocate_descriptor_sets(
		&self,
		pool: vk::DescriptorPool,
		layouts: &[vk::DescriptorSetLayout],
	) -> RtResult<Vec<vk::DescriptorSet>> {
		let alloc_info = vk::DescriptorSetAllocateInfo::builder().descriptor_pool(pool).set_layouts(layouts);
		unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(|e| RtError::DeviceLost(e.to_string()))
	}

	pub fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]) {
		unsafe { self.device.update_descriptor_sets(writes, &[]) };
	}

	pub fn create_pipeline_layout(
		&self,
		set_layouts: &[vk::DescriptorSetLayout],
		push_constant_ranges: &[vk::PushConstantRange],
	) -> RtResult<vk::PipelineLayout> {
		let create_info =
			vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts).push_constant_ranges(push_constant_ranges);
		unsafe { self.device.create_pipeline_layout(&create_info, None) }.map_err(|e| RtError::DeviceLost(e.to_string()))
	}

	pub fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
		unsafe { self.device.destroy_pipeline_layout(layout, None) };
	}

	/// Builds the ray-tracing pipeline from its shader stages and groups
	/// (§2.11, §4.7 step 4's fixed raygen-stage order feeds `stages`'
	/// ordering via [`crate::pipeline`]).
	pub fn create_ray_tracing_pipeline(
		&self,
		layout: vk::PipelineLayout,
		stages: &[vk::PipelineShaderStageCreateInfo],
		groups: &[vk::RayTracingShaderGroupCreateInfoKHR],
		max_recursion_depth: u32,
	) -> RtResult<vk::Pipeline> {
		let create_info = vk::RayTracingPipelineCreateInfoKHR::builder()
			.stages(stages)
			.groups(groups)
			.max_pipeline_ray_recursion_depth(max_recursion_depth)
			.layout(layout);

		let pipelines = unsafe {
			self.ray_tracing_pipeline_ext.create_ray_tracing_pipelines(
				vk::DeferredOperationKHR::null(),
				vk::PipelineCache::null(),
				std::slice::from_ref(&create_info),
				None,
			)
		}
		.map_err(|(_, e)| RtError::DeviceLost(e.to_string()))?;

		Ok(pipelines[0])
	}

	pub fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
		unsafe { self.device.destroy_pipeline(pipeline, None) };
	}

	/// Raw shader group handles for `[first_group, first_group + group_count)`,
	/// `handleSize` bytes apiece, copied verbatim into the shader binding
	/// table (§2.11).
	pub fn ray_tracing_shader_group_handles(
		&self,
		pipeline: vk::Pipeline,
		first_group: u32,
		group_count: u32,
	) -> RtResult<Vec<u8>> {
		let handle_size = self.rt_pipeline_properties.shader_group_handle_size as usize;
		unsafe {
			self.ray_tracing_pipeline_ext.get_ray_tracing_shader_group_handles(
				pipeline,
				first_group,
				group_count,
				group_count as usize * handle_size,
			)
		}
		.map_err(|e| RtError::DeviceLost(e.to_string()))
	}
}

impl Drop for Device {
	fn drop(&mut self) {
		unsafe {
			let _ = self.device.device_wait_idle();
			std::mem::ManuallyDrop::drop(&mut self.allocator);
			self.device.destroy_command_pool(self.command_pool, None);
			self.device.destroy_device(None);
			if let (Some(ext), Some(messenger)) = (&self.debug_utils_ext, self.debug_messenger) {
				ext.destroy_debug_utils_messenger(messenger, None);
			}
			self.instance.destroy_instance(None);
		}
	}
}
