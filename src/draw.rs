use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

use crate::io::list_images;
use crate::label::{read_label_file, LabelError, LabelRecord};
use crate::types::DrawStats;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_SCALE: f32 = 16.0;

/// Error types for the bounding-box drawer.
#[derive(Debug, thiserror::Error)]
pub enum DrawError {
    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Label(#[from] LabelError),

    /// The font file could not be parsed
    #[error("failed to load font: {0}")]
    Font(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Load a TTF font for class text rendering.
pub fn load_font(path: &Path) -> Result<FontVec, DrawError> {
    let bytes = std::fs::read(path)?;
    FontVec::try_from_vec(bytes).map_err(|e| DrawError::Font(e.to_string()))
}

/// Draw the label file's boxes onto the image and write the annotated copy.
pub fn draw_boxes(
    image_path: &Path,
    label_path: &Path,
    output_path: &Path,
    font: Option<&FontVec>,
) -> Result<DrawStats, DrawError> {
    let mut image = image::open(image_path)?.to_rgb8();
    let (records, malformed_lines) = read_label_file(label_path)?;

    for record in &records {
        draw_record(&mut image, record, font);
    }

    image.save(output_path)?;
    Ok(DrawStats {
        boxes_drawn: records.len(),
        malformed_lines,
    })
}

fn draw_record(image: &mut RgbImage, record: &LabelRecord, font: Option<&FontVec>) {
    let (img_width, img_height) = image.dimensions();
    let (x_center, y_center, width, height) = record.to_pixels(img_width, img_height);
    let width = width.max(1);
    let height = height.max(1);
    let x0 = x_center - width as i32 / 2;
    let y0 = y_center - height as i32 / 2;

    // Two nested hollow rects approximate a 2 px stroke
    draw_hollow_rect_mut(image, Rect::at(x0, y0).of_size(width, height), BOX_COLOR);
    draw_hollow_rect_mut(
        image,
        Rect::at(x0 - 1, y0 - 1).of_size(width + 2, height + 2),
        BOX_COLOR,
    );

    if let Some(font) = font {
        let text = format!("Class {}", record.class_id);
        let text_y = (y0 - TEXT_SCALE as i32 - 2).max(0);
        draw_text_mut(
            image,
            BOX_COLOR,
            x0.max(0),
            text_y,
            PxScale::from(TEXT_SCALE),
            font,
            &text,
        );
    }
}

/// Draw boxes for a single image/label pair, or for every pair when the
/// arguments are directories.
pub fn run_draw(
    image: &Path,
    labels: &Path,
    output: &Path,
    font: Option<&FontVec>,
) -> Result<DrawStats, DrawError> {
    if !image.is_dir() {
        return draw_boxes(image, labels, output, font);
    }

    std::fs::create_dir_all(output)?;
    let mut totals = DrawStats::default();
    for image_path in list_images(image)? {
        let stem = match image_path.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => continue,
        };
        let label_path = labels.join(format!("{stem}.txt"));
        if !label_path.is_file() {
            log::warn!("No label file for {}", image_path.display());
            continue;
        }
        let output_path: PathBuf = output.join(
            image_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("{stem}.jpg")),
        );
        match draw_boxes(&image_path, &label_path, &output_path, font) {
            Ok(stats) => {
                totals.boxes_drawn += stats.boxes_drawn;
                totals.malformed_lines += stats.malformed_lines;
            }
            Err(e) => log::error!("Failed to annotate {}: {}", image_path.display(), e),
        }
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn draws_centered_box_with_expected_extent() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("input.png");
        let label_path = dir.path().join("input.txt");
        let output_path = dir.path().join("annotated.png");

        RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]))
            .save(&image_path)
            .unwrap();
        std::fs::write(&label_path, "0 0.5 0.5 0.2 0.2\n").unwrap();

        let stats = draw_boxes(&image_path, &label_path, &output_path, None).unwrap();
        assert_eq!(stats.boxes_drawn, 1);
        assert_eq!(stats.malformed_lines, 0);

        let annotated = image::open(&output_path).unwrap().to_rgb8();
        // Box centered at (50, 50) spanning 20 px: borders at x = 40 and 59
        assert_eq!(*annotated.get_pixel(40, 50), BOX_COLOR);
        assert_eq!(*annotated.get_pixel(59, 50), BOX_COLOR);
        assert_eq!(*annotated.get_pixel(50, 40), BOX_COLOR);
        // Interior untouched
        assert_eq!(*annotated.get_pixel(50, 50), Rgb([255, 255, 255]));
        // Well outside the box untouched
        assert_eq!(*annotated.get_pixel(10, 10), Rgb([255, 255, 255]));
    }

    #[test]
    fn malformed_lines_are_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("input.png");
        let label_path = dir.path().join("input.txt");
        let output_path = dir.path().join("annotated.png");

        RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]))
            .save(&image_path)
            .unwrap();
        std::fs::write(&label_path, "garbage line\n0 0.5 0.5 0.4 0.4\n").unwrap();

        let stats = draw_boxes(&image_path, &label_path, &output_path, None).unwrap();
        assert_eq!(stats.boxes_drawn, 1);
        assert_eq!(stats.malformed_lines, 1);
    }

    #[test]
    fn directory_mode_annotates_each_pair() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let labels = dir.path().join("labels");
        let output = dir.path().join("annotated");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::create_dir_all(&labels).unwrap();

        for index in 0..2 {
            RgbImage::from_pixel(40, 40, Rgb([0, 0, 0]))
                .save(images.join(format!("{index}.png")))
                .unwrap();
            std::fs::write(labels.join(format!("{index}.txt")), "0 0.5 0.5 0.5 0.5\n").unwrap();
        }
        // An image without a label is skipped, not an error
        RgbImage::from_pixel(40, 40, Rgb([0, 0, 0]))
            .save(images.join("orphan.png"))
            .unwrap();

        let stats = run_draw(&images, &labels, &output, None).unwrap();
        assert_eq!(stats.boxes_drawn, 2);
        assert!(output.join("0.png").exists());
        assert!(output.join("1.png").exists());
        assert!(!output.join("orphan.png").exists());
    }
}
