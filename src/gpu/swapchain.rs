//! Swapchain drive (§2.13): acquire/present against a host-provided
//! `VkSurfaceKHR`. Surface *creation* is the host's job (§1, §9's
//! callback-style surface creation note) — the host hands this crate a
//! raw surface handle; everything from there (swapchain creation,
//! recreation on `OUT_OF_DATE`/`SUBOPTIMAL`, acquire, present) is owned
//! here.

use crate::error::{RtError, RtResult};
use crate::gpu::Device;

use ash::vk;

/// Result of one acquire attempt (§4.7 step 1).
pub enum AcquireResult {
	Image { index: u32, suboptimal: bool },
	/// The caller must recreate the swapchain and retry (§4.7's transient
	/// recovery path, §7).
	OutOfDate,
}

/// Owns the swapchain built from a host-provided surface. The surface
/// itself is *not* owned here — §9 treats its creation as a one-shot
/// construction step the host performs once via
/// [`crate::config::SurfaceCreationCallback`], independent of how many
/// times the swapchain built on top of it is recreated; the caller is
/// responsible for destroying the surface separately, after this drops.
pub struct Swapchain {
	surface_ext: ash::extensions::khr::Surface,
	swapchain_ext: ash::extensions::khr::Swapchain,
	surface: vk::SurfaceKHR,
	raw: vk::SwapchainKHR,
	images: Vec<vk::Image>,
	format: vk::Format,
	extent: vk::Extent2D,
}

impl Swapchain {
	/// Builds a swapchain for `surface` at `width`x`height`. `vsync`
	/// selects `FIFO` (on) vs `MAILBOX`/`IMMEDIATE` (off, falling back to
	/// `FIFO` if unsupported).
	pub fn new(device: &Device, entry: &ash::Entry, surface: vk::SurfaceKHR, width: u32, height: u32, vsync: bool) -> RtResult<Self> {
		let surface_ext = ash::extensions::khr::Surface::new(entry, device.instance());
		let swapchain_ext = ash::extensions::khr::Swapchain::new(device.instance(), device.raw());

		let (raw, images, format, extent) =
			build_swapchain(device, &surface_ext, &swapchain_ext, surface, width, height, vsync, None)?;

		Ok(Self { surface_ext, swapchain_ext, surface, raw, images, format, extent })
	}

	/// Rebuilds the swapchain against the same surface at a new size (§7's
	/// transient resize/`OUT_OF_DATE` recovery path), passing the old
	/// swapchain as Vulkan's `old_swapchain` hint before destroying it.
	pub fn recreate(&mut self, device: &Device, width: u32, height: u32, vsync: bool) -> RtResult<()> {
		let (raw, images, format, extent) = build_swapchain(
			device,
			&self.surface_ext,
			&self.swapchain_ext,
			self.surface,
			width,
			height,
			vsync,
			Some(self.raw),
		)?;

		unsafe { self.swapchain_ext.destroy_swapchain(self.raw, None) };
		self.raw = raw;
		self.images = images;
		self.format = format;
		self.extent = extent;
		Ok(())
	}

	pub fn width(&self) -> u32 {
		self.extent.width
	}

	pub fn height(&self) -> u32 {
		self.extent.height
	}

	pub fn format(&self) -> vk::Format {
		self.format
	}

	pub fn image(&self, index: u32) -> vk::Image {
		self.images[index as usize]
	}

	/// Acquires the next presentable image, signaling `semaphore` (§4.7
	/// step 1). An infinite timeout, per §4's cancellation note — the
	/// caller is expected to complete within one display interval.
	pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> RtResult<AcquireResult> {
		match unsafe { self.swapchain_ext.acquire_next_image(self.raw, u64::MAX, semaphore, vk::Fence::null()) } {
			Ok((index, suboptimal)) => Ok(AcquireResult::Image { index, suboptimal }),
			Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireResult::OutOfDate),
			Err(e) => Err(RtError::DeviceLost(e.to_string())),
		}
	}

	/// Presents `image_index` after waiting on `wait_semaphore` (§4.7 step
	/// 6). Returns `true` if the swapchain is still optimal.
	pub fn present(&self, queue: vk::Queue, image_index: u32, wait_semaphore: vk::Semaphore) -> RtResult<bool> {
		let swapchains = [self.raw];
		let indices = [image_index];
		let waits = [wait_semaphore];
		let present_info =
			vk::PresentInfoKHR::builder().wait_semaphores(&waits).swapchains(&swapchains).image_indices(&indices);

		match unsafe { self.swapchain_ext.queue_present(queue, &present_info) } {
			Ok(suboptimal) => Ok(!suboptimal),
			Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(false),
			Err(e) => Err(RtError::DeviceLost(e.to_string())),
		}
	}

	/// Destroys the swapchain only; the surface outlives it (see the struct
	/// doc).
	pub fn destroy(self) {
		unsafe { self.swapchain_ext.destroy_swapchain(self.raw, None) };
	}
}

#[allow(clippy::too_many_arguments)]
fn build_swapchain(
	device: &Device,
	surface_ext: &ash::extensions::khr::Surface,
	swapchain_ext: &ash::extensions::khr::Swapchain,
	surface: vk::SurfaceKHR,
	width: u32,
	height: u32,
	vsync: bool,
	old_swapchain: Option<vk::SwapchainKHR>,
) -> RtResult<(vk::SwapchainKHR, Vec<vk::Image>, vk::Format, vk::Extent2D)> {
	let capabilities = unsafe { surface_ext.get_physical_device_surface_capabilities(device.physical_device(), surface) }
		.map_err(|e| RtError::DeviceLost(e.to_string()))?;
	let formats = unsafe { surface_ext.get_physical_device_surface_formats(device.physical_device(), surface) }
		.map_err(|e| RtError::DeviceLost(e.to_string()))?;
	let present_modes = unsafe { surface_ext.get_physical_device_surface_present_modes(device.physical_device(), surface) }
		.map_err(|e| RtError::DeviceLost(e.to_string()))?;

	let surface_format = formats.iter().find(|f| f.format == vk::Format::B8G8R8A8_UNORM).copied().unwrap_or(formats[0]);

	let present_mode = if vsync {
		vk::PresentModeKHR::FIFO
	} else if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
		vk::PresentModeKHR::MAILBOX
	} else {
		vk::PresentModeKHR::FIFO
	};

	let extent = vk::Extent2D {
		width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
		height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
	};

	let image_count = if capabilities.max_image_count == 0 {
		capabilities.min_image_count + 1
	} else {
		(capabilities.min_image_count + 1).min(capabilities.max_image_count)
	};

	let mut create_info = vk::SwapchainCreateInfoKHR::builder()
		.surface(surface)
		.min_image_count(image_count)
		.image_format(surface_format.format)
		.image_color_space(surface_format.color_space)
		.image_extent(extent)
		.image_array_layers(1)
		.image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
		.pre_transform(capabilities.current_transform)
		.composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
		.present_mode(present_mode)
		.clipped(true);
	if let Some(old) = old_swapchain {
		create_info = create_info.old_swapchain(old);
	}

	let raw = unsafe { swapchain_ext.create_swapchain(&create_info, None) }.map_err(|e| RtError::DeviceLost(e.to_string()))?;
	let images = unsafe { swapchain_ext.get_swapchain_images(raw) }.map_err(|e| RtError::DeviceLost(e.to_string()))?;

	Ok((raw, images, surface_format.format, extent))
}
