use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// Command-line interface for synthetic YOLO dataset preparation.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate synthetic labeled images by compositing rendered meshes onto backgrounds
    Generate(GenerateArgs),
    /// Split paired image/label files into train/valid/test partitions
    Split(SplitArgs),
    /// Draw labeled bounding boxes onto an image for visual verification
    Draw(DrawArgs),
    /// Extract frames from video files at one frame per second
    #[cfg(feature = "video")]
    Frames(FramesArgs),
    /// Run an external YOLO training command with the given hyperparameters
    Train(TrainArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Directory containing STL mesh files
    #[arg(short = 'm', long = "mesh_dir")]
    pub mesh_dir: PathBuf,

    /// Directory containing background images (PNG/JPEG)
    #[arg(short = 'b', long = "backgrounds_dir")]
    pub backgrounds_dir: PathBuf,

    /// Directory where composited images are written
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: PathBuf,

    /// Directory where label files are written
    #[arg(short = 'l', long = "labels_dir")]
    pub labels_dir: PathBuf,

    /// Optional JSON file mapping mesh names to render color and scale range
    #[arg(long = "style_config")]
    pub style_config: Option<PathBuf>,

    /// Meshes whose name contains this token use the large scale range
    #[arg(long = "marker_token", default_value = "lid")]
    pub marker_token: String,

    /// Seed for rotation, scale, and placement sampling; random when omitted
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Write memory_usage.csv and timestamps.csv next to the output images
    #[arg(long = "diagnostics")]
    pub diagnostics: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SplitArgs {
    /// Root directory containing `images/` and `labels/` subdirectories
    #[arg(short = 'r', long = "root_dir")]
    pub root_dir: PathBuf,

    /// Proportion of the dataset to use for training
    #[arg(long = "train_size", default_value_t = 0.7, value_parser = validate_size)]
    pub train_size: f64,

    /// Proportion of the dataset to use for validation
    #[arg(long = "val_size", default_value_t = 0.2, value_parser = validate_size)]
    pub val_size: f64,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Disable shuffling and assign partitions in sorted filename order
    #[arg(long = "no_shuffle")]
    pub no_shuffle: bool,

    /// List of class names written into dataset.yaml
    #[arg(long = "label_list", use_value_delimiter = true)]
    pub label_list: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DrawArgs {
    /// Image file, or a directory of images
    #[arg(short = 'i', long = "image")]
    pub image: PathBuf,

    /// Label file, or a directory of label files
    #[arg(short = 'l', long = "labels")]
    pub labels: PathBuf,

    /// Output file, or a directory for annotated images
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// TTF font used for class text; boxes are drawn without text when omitted
    #[arg(long = "font")]
    pub font: Option<PathBuf>,
}

#[cfg(feature = "video")]
#[derive(Args, Debug, Clone)]
pub struct FramesArgs {
    /// Video file, or a directory of video files
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Directory where extracted frames are written
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: PathBuf,

    /// Write memory_usage.csv and video_processing_stats.csv to the output directory
    #[arg(long = "diagnostics")]
    pub diagnostics: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Path to the dataset yaml file
    #[arg(short = 'd', long = "data")]
    pub data: PathBuf,

    /// Training program to invoke
    #[arg(long = "program", default_value = "yolov5")]
    pub program: String,

    /// Model configuration yaml passed through to the trainer
    #[arg(long = "cfg")]
    pub cfg: Option<PathBuf>,

    /// Hyperparameter yaml passed through to the trainer
    #[arg(long = "hyp")]
    pub hyp: Option<PathBuf>,

    /// Initial weights; trained from scratch when omitted
    #[arg(long = "weights")]
    pub weights: Option<String>,

    /// Training image size
    #[arg(long = "img_size", default_value_t = 416)]
    pub img_size: u32,

    /// Batch size
    #[arg(long = "batch_size", default_value_t = 1)]
    pub batch_size: u32,

    /// Number of epochs
    #[arg(long = "epochs", default_value_t = 100)]
    pub epochs: u32,

    /// Output project directory for training runs
    #[arg(long = "project")]
    pub project: Option<PathBuf>,

    /// Run name inside the project directory
    #[arg(long = "name", default_value = "pipeline")]
    pub name: String,

    /// Number of dataloader workers
    #[arg(long = "workers", default_value_t = 0)]
    pub workers: u32,
}

// Validate that the size is between 0.0 and 1.0
pub fn validate_size(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_size() {
        assert!(validate_size("0.5").is_ok());
        assert!(validate_size("1.0").is_ok());
        assert!(validate_size("0.0").is_ok());
        assert!(validate_size("-0.1").is_err());
        assert!(validate_size("1.1").is_err());
        assert!(validate_size("abc").is_err());
    }
}
