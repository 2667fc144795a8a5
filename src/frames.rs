use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::FramesArgs;
use crate::diagnostics::{write_csv, Diagnostics};
use crate::types::{FramesStats, VIDEO_FORMATS};

// Frames are sampled at one per second of video.
const SAMPLE_FPS: i32 = 1;

/// Error types for the frame extractor.
#[derive(Debug, thiserror::Error)]
pub enum FramesError {
    /// GStreamer initialization or pipeline parsing failed
    #[error(transparent)]
    Glib(#[from] gst::glib::Error),

    /// The pipeline was built but misbehaved
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// No video files were found
    #[error("no video files found in {0}")]
    NoVideos(PathBuf),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Extract frames at 1 fps from a video file or a directory of videos.
///
/// Frames are written as `<stem>_frame_<n>.jpg`; per-video duration and
/// processing time land in `video_processing_stats.csv` in the output
/// directory. A video that fails to decode is logged and skipped.
pub fn run_frames(args: &FramesArgs, diagnostics: &Diagnostics) -> Result<FramesStats, FramesError> {
    gst::init()?;

    let videos = list_videos(&args.input)?;
    if videos.is_empty() {
        return Err(FramesError::NoVideos(args.input.clone()));
    }
    std::fs::create_dir_all(&args.output_dir)?;

    let mut stats = FramesStats::default();
    let mut rows: Vec<Vec<String>> = Vec::with_capacity(videos.len());

    for video in &videos {
        let started = Instant::now();
        match extract_single_video(video, &args.output_dir) {
            Ok((duration, frames)) => {
                stats.videos_processed += 1;
                stats.frames_written += frames;
                rows.push(vec![
                    video
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    format!("{duration:.3}"),
                    format!("{:.3}", started.elapsed().as_secs_f64()),
                ]);
                log::info!(
                    "Extracted {} frames from {}",
                    frames,
                    video.display()
                );
            }
            Err(e) => {
                stats.videos_failed += 1;
                log::error!("Failed to process video {}: {}", video.display(), e);
            }
        }
    }

    write_csv(
        &args.output_dir.join("video_processing_stats.csv"),
        &["Video Name", "Video Duration (s)", "Processing Time (s)"],
        &rows,
    )?;
    diagnostics.write_reports(&args.output_dir)?;

    Ok(stats)
}

/// Collect video files by extension in sorted order.
pub fn list_videos(input: &Path) -> std::io::Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut videos: Vec<PathBuf> = std::fs::read_dir(input)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| VIDEO_FORMATS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    videos.sort();
    Ok(videos)
}

// Decode one video through an appsink pipeline rate-limited to 1 fps and
// write each sample as a JPEG. Returns (video duration, frames written).
fn extract_single_video(video: &Path, output_dir: &Path) -> Result<(f64, usize), FramesError> {
    let pipeline_str = format!(
        "filesrc location=\"{}\" ! \
         decodebin ! \
         videoconvert ! \
         videorate ! \
         video/x-raw,format=RGB,framerate={}/1 ! \
         appsink name=sink sync=false",
        video.to_string_lossy(),
        SAMPLE_FPS
    );
    log::debug!("Reader pipeline: {}", pipeline_str);

    let pipeline = gst::parse::launch(&pipeline_str)?
        .dynamic_cast::<gst::Pipeline>()
        .map_err(|_| FramesError::Pipeline("element is not a pipeline".to_string()))?;
    let appsink = pipeline
        .by_name("sink")
        .ok_or_else(|| FramesError::Pipeline("appsink not found".to_string()))?
        .dynamic_cast::<gst_app::AppSink>()
        .map_err(|_| FramesError::Pipeline("sink is not an appsink".to_string()))?;

    pipeline
        .set_state(gst::State::Playing)
        .map_err(|e| FramesError::Pipeline(e.to_string()))?;

    let stem = video
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut frames = 0usize;
    loop {
        if appsink.is_eos() {
            break;
        }
        let sample = match appsink.pull_sample() {
            Ok(sample) => sample,
            Err(_) => break,
        };
        let image = sample_to_image(&sample)?;
        let frame_path = output_dir.join(format!("{}_frame_{}.jpg", stem, frames + 1));
        image.save(&frame_path)?;
        frames += 1;
    }

    let duration = pipeline
        .query_duration::<gst::ClockTime>()
        .map(|clock_time| clock_time.nseconds() as f64 / 1e9)
        .unwrap_or(0.0);

    pipeline
        .set_state(gst::State::Null)
        .map_err(|e| FramesError::Pipeline(e.to_string()))?;

    if frames == 0 {
        return Err(FramesError::Pipeline("no frames decoded".to_string()));
    }
    Ok((duration, frames))
}

// Copy an RGB sample into an image buffer, unpadding row strides if needed.
fn sample_to_image(sample: &gst::Sample) -> Result<RgbImage, FramesError> {
    let caps = sample
        .caps()
        .ok_or_else(|| FramesError::Pipeline("sample has no caps".to_string()))?;
    let structure = caps
        .structure(0)
        .ok_or_else(|| FramesError::Pipeline("caps have no structure".to_string()))?;
    let width = structure
        .get::<i32>("width")
        .map_err(|e| FramesError::Pipeline(e.to_string()))? as u32;
    let height = structure
        .get::<i32>("height")
        .map_err(|e| FramesError::Pipeline(e.to_string()))? as u32;

    let buffer = sample
        .buffer()
        .ok_or_else(|| FramesError::Pipeline("sample has no buffer".to_string()))?;
    let map = buffer
        .map_readable()
        .map_err(|e| FramesError::Pipeline(e.to_string()))?;
    let data = map.as_slice();

    let row_bytes = (width * 3) as usize;
    let tight = row_bytes * height as usize;
    let pixels = if data.len() == tight {
        data.to_vec()
    } else {
        // Rows are padded to the stride; repack them tightly
        let stride = data.len() / height as usize;
        let mut packed = Vec::with_capacity(tight);
        for row in 0..height as usize {
            let start = row * stride;
            packed.extend_from_slice(&data[start..start + row_bytes]);
        }
        packed
    };

    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| FramesError::Pipeline("buffer size mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_videos_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp4", "a.mov", "frame.jpg", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let videos = list_videos(dir.path()).unwrap();
        let names: Vec<_> = videos
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.mov", "b.mp4"]);
    }

    #[test]
    fn single_file_input_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("labor.mp4");
        std::fs::write(&video, b"x").unwrap();
        let videos = list_videos(&video).unwrap();
        assert_eq!(videos, vec![video]);
    }
}
