//! Error taxonomy (§7): misuse, capacity, device-lost, and transient errors.
//!
//! All public operations return [`RtResult`]; nothing in this crate panics
//! except for the documented programmer errors in [`crate::auto_buffer`] and
//! the invariant-violation aborts noted in §7 of the specification.

use thiserror::Error;

pub type RtResult<T> = Result<T, RtError>;

/// Kind-level error returned by public operations (§6.1, §7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RtError {
	#[error("generic error: {0}")]
	Generic(String),

	#[error("wrong argument: {0}")]
	WrongArgument(String),

	#[error("too many instances: requested {requested}, capacity {capacity}")]
	TooManyInstances { requested: usize, capacity: usize },

	#[error("wrong instance handle")]
	WrongInstance,

	#[error("frame not started")]
	FrameNotStarted,

	#[error("frame not ended")]
	FrameNotEnded,

	#[error("geometry {unique_id} is not registered as movable")]
	WrongMovableUpdate { unique_id: u64 },

	#[error("geometry {unique_id} does not accept static tex-coord updates")]
	WrongStaticTexCoordUpdate { unique_id: u64 },

	#[error("material {0} cannot be updated: not a dynamic material")]
	CannotUpdateDynamicMaterial(u64),

	#[error("material {0} cannot be updated: not an animated material")]
	CannotUpdateAnimatedMaterial(u64),

	#[error("geometry id {0} is not unique among live geometries")]
	IdNotUnique(u64),

	#[error("too many sectors: requested {requested}, capacity {capacity}")]
	TooManySectors { requested: usize, capacity: usize },

	#[error("sector light list overflow: sector {sector} holds more than {capacity} lights")]
	TooManyLightsInSector { sector: u32, capacity: usize },

	#[error("uploading static geometry outside a scene-recording interval")]
	NotRecordingScene,

	#[error("uploading dynamic geometry while recording the static scene")]
	RecordingScene,

	#[error("device lost or resources exhausted: {0}")]
	DeviceLost(String),

	#[error("GPU out of memory: {0}")]
	OutOfMemory(String),
}

impl RtError {
	/// Severity to forward through [`crate::config::Config::debug_print_callback`].
	pub fn log_level(&self) -> log::Level {
		match self {
			RtError::DeviceLost(_) | RtError::OutOfMemory(_) => log::Level::Error,
			RtError::TooManyInstances { .. }
			| RtError::TooManySectors { .. }
			| RtError::TooManyLightsInSector { .. } => log::Level::Warn,
			_ => log::Level::Debug,
		}
	}
}
