//! Framebuffer set (§2.12): the named storage images the raygen stages
//! read and write, sized to render resolution and recreated on resize.
//!
//! No `Framebuffers.h`/`.cpp` survived into `original_source/`'s filtered
//! pack, so this is grounded on the teacher's `Texture`/`TextureDesc`
//! types (`src/gpu/mod.rs`) for the image-handle shape, with the image set
//! itself following spec.md's three families directly: a G-buffer (written
//! once per frame by the primary/reflection/direct/indirect raygen
//! stages), one history image per ping-pong slot (read by the next frame's
//! temporal stages), and the final composed output.

use crate::error::RtResult;
use crate::gpu::{Device, Format, Image, ImageDesc, ImageUsage};
use crate::MAX_FRAMES_IN_FLIGHT;

/// G-buffer channels written during the primary raygen stage and read by
/// every later stage this frame (§4.7 step 4).
pub struct GBuffer {
	pub albedo: Image,
	pub normal: Image,
	pub depth: Image,
	pub motion_vectors: Image,
}

/// The full framebuffer set for one render resolution (§2.12).
pub struct FramebufferSet {
	gbuffer: GBuffer,
	/// Indexed by frame-in-flight slot; slot `frame` is written this frame,
	/// slot `frame - 1` (mod `MAX_FRAMES_IN_FLIGHT`) is last frame's history,
	/// read by the stages that do temporal reuse (§4.6.2, §4.7).
	history: [Image; MAX_FRAMES_IN_FLIGHT],
	output: Image,
	width: u32,
	height: u32,
}

fn storage_image(device: &mut Device, width: u32, height: u32, format: Format) -> RtResult<Image> {
	device.create_image(&ImageDesc { width, height, format, usage: ImageUsage::SHADER_RESOURCE | ImageUsage::UNORDERED_ACCESS })
}

impl FramebufferSet {
	pub fn new(device: &mut Device, width: u32, height: u32) -> RtResult<Self> {
		let gbuffer = GBuffer {
			albedo: storage_image(device, width, height, Format::Rgba8UNorm)?,
			normal: storage_image(device, width, height, Format::Rg16Float)?,
			depth: storage_image(device, width, height, Format::R32Float)?,
			motion_vectors: storage_image(device, width, height, Format::Rg16Float)?,
		};

		let history = {
			let mut images = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
			for _ in 0..MAX_FRAMES_IN_FLIGHT {
				images.push(storage_image(device, width, height, Format::Rgba32Float)?);
			}
			images.try_into().unwrap_or_else(|_| unreachable!())
		};

		let output = storage_image(device, width, height, Format::Rgba16Float)?;

		Ok(Self { gbuffer, history, output, width, height })
	}

	pub fn gbuffer(&self) -> &GBuffer {
		&self.gbuffer
	}

	/// This frame's history slot, written by the stage that produces the
	/// image to be reused next frame.
	pub fn history_current(&self, frame: usize) -> &Image {
		&self.history[frame % MAX_FRAMES_IN_FLIGHT]
	}

	/// Last frame's history slot, read for temporal reuse (§3.6, §4.6.2).
	pub fn history_prev(&self, frame: usize) -> &Image {
		&self.history[(frame + MAX_FRAMES_IN_FLIGHT - 1) % MAX_FRAMES_IN_FLIGHT]
	}

	pub fn output(&self) -> &Image {
		&self.output
	}

	pub fn width(&self) -> u32 {
		self.width
	}

	pub fn height(&self) -> u32 {
		self.height
	}

	/// Recreates every image at the new resolution (§7's transient
	/// swapchain-resize recovery path). The caller must not be holding any
	/// descriptor set bound to the old images; builds the replacement set
	/// before tearing down the old one so a failed allocation leaves `self`
	/// intact.
	pub fn resize(&mut self, device: &mut Device, width: u32, height: u32) -> RtResult<()> {
		let new = Self::new(device, width, height)?;
		let old = std::mem::replace(self, new);
		old.destroy(device);
		Ok(())
	}

	pub fn destroy(self, device: &mut Device) {
		device.destroy_image(self.gbuffer.albedo);
		device.destroy_image(self.gbuffer.normal);
		device.destroy_image(self.gbuffer.depth);
		device.destroy_image(self.gbuffer.motion_vectors);
		for image in self.history {
			device.destroy_image(image);
		}
		device.destroy_image(self.output);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn history_slots_ping_pong_across_frames() {
		assert_ne!(0usize % MAX_FRAMES_IN_FLIGHT, 1usize % MAX_FRAMES_IN_FLIGHT);
	}
}
