//! Scene root (§2.10): composes the acceleration-structure manager and the
//! light manager behind the single set of host-facing scene operations
//! (§6.1), and derives the one piece of cross-cutting bookkeeping neither
//! owns alone — that a `unique_id` is live exactly once across both.
//!
//! Grounded on `original_source/Source/Scene.h`/`.cpp` (RTGL1's `Scene`),
//! restated without its `GeomInfoManager`/`TriangleInfoManager`/texture
//! plumbing, which are out of scope (§1).

use crate::as_manager::AsManager;
use crate::config::Config;
use crate::error::{RtError, RtResult};
use crate::filter::{CullMask, Lifetime};
use crate::geometry::{GeometryUploadInfo, TexCoordUpdate, TransformUpdate};
use crate::gpu::{CmdList, Device};
use crate::light::LightManager;
use crate::math::{Mat3x4, Mat4};
use crate::sector::SectorId;

fn mat4_to_mat3x4(m: Mat4) -> Mat3x4 {
	Mat3x4 { data: [m.data[0], m.data[1], m.data[2]] }
}

/// Composition root for one loaded scene (§2.10): geometry lifecycle and
/// light sampling state, kept mutually consistent every frame.
pub struct Scene {
	pub as_manager: AsManager,
	pub light_manager: LightManager,
}

impl Scene {
	pub fn new(device: &mut Device, config: &Config) -> RtResult<Self> {
		Ok(Self { as_manager: AsManager::new(device, config)?, light_manager: LightManager::new(device, config)? })
	}

	/// `start_new_scene` (§6.1): clears every static geometry and every
	/// declared sector, beginning a new static-recording interval.
	pub fn start_new_scene(&mut self) {
		self.as_manager.start_new_scene();
		self.light_manager.reset();
	}

	/// `upload_geometry` (§6.1): routed to the static or dynamic collector
	/// by the upload's lifetime class (§3.2).
	pub fn upload_geometry(&mut self, info: &GeometryUploadInfo) -> RtResult<usize> {
		if info.filter.lifetime == Lifetime::Dynamic {
			self.as_manager.add_dynamic_geometry(info)
		} else {
			self.as_manager.add_static_geometry(info)
		}
	}

	pub fn update_geometry_transform(&mut self, update: &TransformUpdate) -> RtResult<()> {
		self.as_manager.update_static_transform(update.unique_id, mat4_to_mat3x4(update.transform))
	}

	pub fn update_geometry_tex_coords(&mut self, frame: usize, update: &TexCoordUpdate) -> RtResult<()> {
		let count = update.layers.iter().flatten().map(Vec::len).next().ok_or_else(|| {
			RtError::WrongArgument("update_geometry_tex_coords requires at least one populated layer".into())
		})?;
		self.as_manager.update_static_tex_coords(frame, update.unique_id, update.offset, count, &update.layers)
	}

	/// `submit_static_geometries` (§6.1): ends the static-recording
	/// interval, rebuilding every static BLAS.
	pub fn submit_static_geometries(&mut self, device: &mut Device) -> RtResult<()> {
		self.as_manager.submit_static(device)
	}

	pub fn declare_sector(&mut self, sector: SectorId) -> RtResult<()> {
		self.light_manager.declare_sector(sector)
	}

	pub fn set_sector_visible(&mut self, a: SectorId, b: SectorId) -> RtResult<()> {
		self.light_manager.set_sector_visible(a, b)
	}

	/// §4.5 step 1 + §4.6 `prepare_for_frame`: resets the dynamic collector
	/// and the light manager's per-frame bookkeeping together, so both are
	/// ready to accept this frame's uploads.
	pub fn prepare_for_frame(&mut self, device: &Device, cmd: &CmdList, frame: usize) {
		self.as_manager.begin_dynamic(device, cmd, frame);
		self.light_manager.prepare_for_frame(device, cmd, frame);
	}

	/// §4.5 steps 4.5.4–4.5.7: patches, rebuilds, and uploads everything the
	/// static and dynamic collectors accumulated this frame, then derives
	/// and (if non-empty) builds the frame's TLAS. Returns `true` if a TLAS
	/// was built and ray tracing should proceed this frame (§4.4, §8.4#3's
	/// empty-scene case).
	pub fn submit_for_frame(&mut self, device: &mut Device, cmd: &CmdList, frame: usize, ray_cull_mask: CullMask) -> RtResult<bool> {
		self.as_manager.resubmit_static_tex_coords(device, cmd, frame);
		self.as_manager.resubmit_static_movable(device, cmd, frame)?;
		self.as_manager.submit_dynamic(device, cmd, frame)?;

		self.light_manager.copy_from_staging(device, cmd, frame)?;

		self.as_manager.prepare_for_building_tlas(frame, ray_cull_mask)?;
		Ok(self.as_manager.try_build_tlas(device, cmd, frame)?.is_some())
	}

	pub fn destroy(self, device: &mut Device) {
		self.as_manager.destroy(device);
		self.light_manager.destroy(device);
	}
}
