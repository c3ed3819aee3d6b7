//! Core runtime of a real-time path-tracing engine: acceleration-structure
//! lifecycle, vertex ingestion, light sampling, and the per-frame scheduler
//! that keeps them mutually consistent.
//!
//! GPU command recording, window-surface creation, the memory allocator, and
//! shader compilation are external collaborators; this crate fixes only the
//! contracts it needs from them (see [`gpu`] and [`pipeline::ShaderSource`]).

#[macro_use]
extern crate bitflags;

pub mod accel;
pub mod as_builder;
pub mod as_manager;
pub mod auto_buffer;
pub mod buffer;
pub mod collector;
pub mod config;
pub mod descriptors;
pub mod engine;
pub mod error;
pub mod filter;
pub mod framebuffer;
pub mod geometry;
pub mod gpu;
pub mod light;
pub mod math;
pub mod pipeline;
pub mod raster;
pub mod restir;
pub mod scene;
pub mod scheduler;
pub mod sector;
pub mod util;

pub use config::Config;
pub use engine::{Engine, MaterialStore};
pub use error::{RtError, RtResult};
pub use filter::{Filter, Lifetime, PassThrough, Visibility};
pub use scheduler::{DrawFrameInfo, FrameCompositor};

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
