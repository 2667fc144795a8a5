use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::OnceLock;

// Supported image formats for backgrounds and dataset pairing
pub const IMG_FORMATS: &[&str] = &[
    "bmp", "dng", "jpeg", "jpg", "mpo", "png", "tif", "tiff", "webp", "pfm",
];

// Supported video container formats for frame extraction
pub const VIDEO_FORMATS: &[&str] = &["avi", "mkv", "mov", "mp4"];

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

// Why an object was dropped instead of placed. Callers aggregate these
// into stats rather than parsing console text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The mesh file could not be loaded or parsed
    MeshLoad,
    /// Rendering the mesh produced an error
    Render,
    /// The render contained no opaque pixels
    EmptyRender,
    /// All placement slots were consumed before this object
    SlotsExhausted,
    /// The normalized bounding box fell outside [0,1]
    OutOfRange,
}

// Struct to hold the paths to the output directories for train/valid/test splits
pub struct SplitDirs {
    pub train_images_dir: PathBuf,
    pub train_labels_dir: PathBuf,
    pub valid_images_dir: PathBuf,
    pub valid_labels_dir: PathBuf,
    pub test_images_dir: PathBuf,
    pub test_labels_dir: PathBuf,
}

// Struct to hold generation statistics across all background images
#[derive(Debug, Default, Clone)]
pub struct GenerateStats {
    pub images_written: usize,
    pub images_skipped: usize,
    pub objects_placed: usize,
    pub mesh_load_failures: usize,
    pub render_failures: usize,
    pub empty_renders: usize,
    pub slot_exhaustions: usize,
    pub out_of_range_boxes: usize,
}

impl GenerateStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::MeshLoad => self.mesh_load_failures += 1,
            SkipReason::Render => self.render_failures += 1,
            SkipReason::EmptyRender => self.empty_renders += 1,
            SkipReason::SlotsExhausted => self.slot_exhaustions += 1,
            SkipReason::OutOfRange => self.out_of_range_boxes += 1,
        }
    }

    pub fn objects_skipped(&self) -> usize {
        self.mesh_load_failures
            + self.render_failures
            + self.empty_renders
            + self.slot_exhaustions
            + self.out_of_range_boxes
    }

    pub fn print_summary(&self) {
        log::info!("=== Generation Summary ===");
        log::info!("Images written: {}", self.images_written);
        log::info!("Images skipped: {}", self.images_skipped);
        log::info!("Objects placed: {}", self.objects_placed);

        let skipped = self.objects_skipped();
        if skipped > 0 {
            log::warn!(
                "Objects skipped: {} (mesh load: {}, render: {}, empty render: {}, \
                 slots exhausted: {}, out-of-range box: {})",
                skipped,
                self.mesh_load_failures,
                self.render_failures,
                self.empty_renders,
                self.slot_exhaustions,
                self.out_of_range_boxes
            );
        }
    }
}

// Struct to hold split statistics
#[derive(Debug, Default, Clone)]
pub struct SplitStats {
    pub train_pairs: usize,
    pub valid_pairs: usize,
    pub test_pairs: usize,
    pub unpaired_images: usize,
}

impl SplitStats {
    pub fn total_pairs(&self) -> usize {
        self.train_pairs + self.valid_pairs + self.test_pairs
    }

    pub fn print_summary(&self) {
        log::info!("=== Split Summary ===");
        log::info!("Train pairs: {}", self.train_pairs);
        log::info!("Valid pairs: {}", self.valid_pairs);
        log::info!("Test pairs: {}", self.test_pairs);
        if self.unpaired_images > 0 {
            log::warn!("Images without a label file: {}", self.unpaired_images);
        }
    }
}

// Struct to hold drawing statistics for one annotated image
#[derive(Debug, Default, Clone)]
pub struct DrawStats {
    pub boxes_drawn: usize,
    pub malformed_lines: usize,
}

// Struct to hold frame extraction statistics
#[derive(Debug, Default, Clone)]
pub struct FramesStats {
    pub videos_processed: usize,
    pub videos_failed: usize,
    pub frames_written: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extensions_set_contains_common_formats() {
        let set = get_image_extensions_set();
        assert!(set.contains("jpg"));
        assert!(set.contains("png"));
        assert!(!set.contains("mp4"));
    }

    #[test]
    fn generate_stats_aggregates_skip_reasons() {
        let mut stats = GenerateStats::new();
        stats.record_skip(SkipReason::MeshLoad);
        stats.record_skip(SkipReason::Render);
        stats.record_skip(SkipReason::Render);
        stats.record_skip(SkipReason::OutOfRange);
        assert_eq!(stats.mesh_load_failures, 1);
        assert_eq!(stats.render_failures, 2);
        assert_eq!(stats.out_of_range_boxes, 1);
        assert_eq!(stats.objects_skipped(), 4);
    }
}
