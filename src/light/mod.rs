//! Light sampling pipeline (§2.7–§2.9): stable per-light identity, the
//! per-sector light lists, and the camera-centered light grid.

pub mod encoder;
pub mod grid;
pub mod lists;
pub mod manager;

pub use encoder::{LightEncoded, LightKind};
pub use manager::LightManager;
