//! Synthetic training data tooling for YOLO object detection
//!
//! This library renders 3D meshes under random rotations, composites them
//! onto photographic backgrounds with normalized bounding-box labels, and
//! provides the surrounding dataset plumbing: train/valid/test splitting,
//! bounding-box visualization, video frame extraction, and training glue.

pub mod config;
pub mod diagnostics;
pub mod draw;
#[cfg(feature = "video")]
pub mod frames;
pub mod grid;
pub mod io;
pub mod label;
pub mod render;
pub mod rotation;
pub mod split;
pub mod stl;
pub mod style;
pub mod synth;
pub mod train;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{Cli, Command};
pub use diagnostics::Diagnostics;
pub use grid::PlacementGrid;
pub use label::LabelRecord;
pub use split::run_split;
pub use stl::TriangleMesh;
pub use synth::run_generate;
pub use types::{DrawStats, GenerateStats, SkipReason, SplitStats};
