use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::utils::parse_hex_color;

// Default render color and scale ranges. Meshes whose identifier contains
// the marker token draw noticeably larger scale factors.
pub const DEFAULT_COLOR: [u8; 3] = [255, 255, 255];
pub const DEFAULT_SCALE_RANGE: (f64, f64) = (0.05, 0.22);
pub const MARKER_SCALE_RANGE: (f64, f64) = (0.22, 0.3);

/// Error types for the style configuration.
#[derive(Debug, thiserror::Error)]
pub enum StyleError {
    /// Failed to read the style file
    #[error("failed to read style config")]
    Io(#[from] std::io::Error),

    /// Failed to parse the style file
    #[error("failed to parse style config")]
    Parse(#[from] serde_json::Error),

    /// A color entry was not of the form #rrggbb
    #[error("invalid color for mesh {0:?}: {1:?}")]
    InvalidColor(String, String),

    /// A scale range entry was empty or inverted
    #[error("invalid scale range for mesh {0:?}")]
    InvalidScaleRange(String),
}

// One entry of the on-disk style file, keyed by mesh identifier:
// { "lid_c": { "color": "#343430", "scale_range": [0.22, 0.3] } }
#[derive(Debug, Deserialize)]
struct StyleEntry {
    color: Option<String>,
    scale_range: Option<(f64, f64)>,
}

/// Resolved render style for one mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshStyle {
    pub color: [u8; 3],
    pub scale_range: (f64, f64),
}

/// Per-mesh render styling: an explicit identifier -> style mapping with
/// marker-token fallback for the scale range.
#[derive(Debug, Default)]
pub struct StyleConfig {
    overrides: HashMap<String, MeshStyle>,
    marker_token: String,
}

impl StyleConfig {
    pub fn new(marker_token: impl Into<String>) -> Self {
        Self {
            overrides: HashMap::new(),
            marker_token: marker_token.into(),
        }
    }

    /// Load overrides from a JSON style file.
    pub fn from_file(path: &Path, marker_token: impl Into<String>) -> Result<Self, StyleError> {
        let content = std::fs::read_to_string(path)?;
        let entries: HashMap<String, StyleEntry> = serde_json::from_str(&content)?;
        let marker_token = marker_token.into();

        let mut overrides = HashMap::new();
        for (name, entry) in entries {
            let color = match &entry.color {
                Some(hex) => parse_hex_color(hex)
                    .ok_or_else(|| StyleError::InvalidColor(name.clone(), hex.clone()))?,
                None => DEFAULT_COLOR,
            };
            let scale_range = match entry.scale_range {
                Some((lo, hi)) => {
                    if !(lo > 0.0 && hi > lo) {
                        return Err(StyleError::InvalidScaleRange(name));
                    }
                    (lo, hi)
                }
                None => default_scale_range(&name, &marker_token),
            };
            overrides.insert(name, MeshStyle { color, scale_range });
        }

        Ok(Self {
            overrides,
            marker_token,
        })
    }

    /// Resolve the style for a mesh identifier (file base name without extension).
    pub fn resolve(&self, mesh_name: &str) -> MeshStyle {
        if let Some(style) = self.overrides.get(mesh_name) {
            return *style;
        }
        MeshStyle {
            color: DEFAULT_COLOR,
            scale_range: default_scale_range(mesh_name, &self.marker_token),
        }
    }
}

fn default_scale_range(mesh_name: &str, marker_token: &str) -> (f64, f64) {
    if !marker_token.is_empty() && mesh_name.contains(marker_token) {
        MARKER_SCALE_RANGE
    } else {
        DEFAULT_SCALE_RANGE
    }
}
