use dashmap::DashMap;
use glam::DMat4;
use image::{imageops, DynamicImage, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
use std::time::Instant;

use crate::config::GenerateArgs;
use crate::diagnostics::Diagnostics;
use crate::grid::{GridError, PlacementGrid};
use crate::io::{list_images, list_meshes, write_classes_file};
use crate::label::{write_label_file, LabelError, LabelRecord};
use crate::render::{opaque_bounds, render_mesh};
use crate::rotation::random_rotation;
use crate::stl::read_stl;
use crate::style::{StyleConfig, StyleError};
use crate::types::{GenerateStats, SkipReason};
use crate::utils::{create_output_directory, create_progress_bar};

/// Error types for the synthetic-data generator.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// No STL files were found in the mesh directory
    #[error("no mesh files found in {0}")]
    NoMeshes(PathBuf),

    /// No background images were found
    #[error("no background images found in {0}")]
    NoBackgrounds(PathBuf),

    #[error(transparent)]
    Style(#[from] StyleError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// Why one background image could not be processed at all.
#[derive(Debug, thiserror::Error)]
enum BackgroundError {
    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error("every mesh failed to render")]
    NoRenders,
}

// A mesh scheduled for rendering, with its resolved class id and style.
struct MeshSpec {
    path: PathBuf,
    class_id: u32,
    color: [u8; 3],
    scale_range: (f64, f64),
}

// A successful off-screen render, kept in memory until composited.
struct RenderedObject {
    class_id: u32,
    raster: RgbaImage,
}

/// Run the synthetic-data generator over every background image.
///
/// Each background gets every mesh rendered once under a fresh random
/// rotation and scale, composited at random grid slots, and labeled. The
/// composited image and its label file are written exactly once per
/// background.
pub fn run_generate(
    args: &GenerateArgs,
    diagnostics: &Diagnostics,
) -> Result<GenerateStats, GenerateError> {
    let start_main = Instant::now();

    let style_config = match &args.style_config {
        Some(path) => StyleConfig::from_file(path, args.marker_token.clone())?,
        None => StyleConfig::new(args.marker_token.clone()),
    };

    let mesh_paths = list_meshes(&args.mesh_dir)?;
    if mesh_paths.is_empty() {
        return Err(GenerateError::NoMeshes(args.mesh_dir.clone()));
    }

    let backgrounds = list_images(&args.backgrounds_dir)?;
    if backgrounds.is_empty() {
        return Err(GenerateError::NoBackgrounds(args.backgrounds_dir.clone()));
    }

    create_output_directory(&args.output_dir)?;
    create_output_directory(&args.labels_dir)?;

    // Class ids follow the sorted mesh enumeration; the map is written out
    // so downstream consumers can recover the names.
    let label_map: DashMap<String, usize> = DashMap::new();
    let next_class_id = AtomicUsize::new(0);
    let meshes: Vec<MeshSpec> = mesh_paths
        .iter()
        .map(|path| {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            let class_id = *label_map
                .entry(name.clone())
                .or_insert_with(|| next_class_id.fetch_add(1, Relaxed));
            let style = style_config.resolve(&name);
            MeshSpec {
                path: path.clone(),
                class_id: class_id as u32,
                color: style.color,
                scale_range: style.scale_range,
            }
        })
        .collect();

    let classes: Vec<(usize, String)> = label_map
        .iter()
        .map(|entry| (*entry.value(), entry.key().clone()))
        .collect();
    write_classes_file(&args.labels_dir.join("classes.txt"), &classes)?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut stats = GenerateStats::new();
    let pb = create_progress_bar(backgrounds.len() as u64, "Generate");

    for (index, background_path) in backgrounds.iter().enumerate() {
        match process_background(
            index,
            background_path,
            &meshes,
            &args.output_dir,
            &args.labels_dir,
            &mut rng,
            diagnostics,
            &mut stats,
        ) {
            Ok(()) => stats.images_written += 1,
            Err(e) => {
                log::error!(
                    "Failed to process background {}: {}",
                    background_path.display(),
                    e
                );
                stats.images_skipped += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Generation complete");

    diagnostics.record_event("Main", start_main);
    diagnostics.write_reports(&args.output_dir)?;

    Ok(stats)
}

#[allow(clippy::too_many_arguments)]
fn process_background(
    index: usize,
    background_path: &Path,
    meshes: &[MeshSpec],
    output_dir: &Path,
    labels_dir: &Path,
    rng: &mut StdRng,
    diagnostics: &Diagnostics,
    stats: &mut GenerateStats,
) -> Result<(), BackgroundError> {
    let mut background = image::open(background_path)?.to_rgba8();
    let (bg_width, bg_height) = background.dimensions();

    // Rotation and scale are sampled up front from the sequential rng so a
    // fixed seed stays deterministic while renders run in parallel.
    let params: Vec<(DMat4, f64)> = meshes
        .iter()
        .map(|mesh| {
            let rotation = random_rotation(rng);
            let scale = rng.gen_range(mesh.scale_range.0..mesh.scale_range.1);
            (rotation, scale)
        })
        .collect();

    let start_render = Instant::now();
    let render_results: Vec<Result<RenderedObject, SkipReason>> = meshes
        .par_iter()
        .zip(params)
        .map(|(mesh, (rotation, scale))| {
            let loaded = read_stl(&mesh.path).map_err(|e| {
                log::error!("Failed to load mesh {}: {}", mesh.path.display(), e);
                SkipReason::MeshLoad
            })?;
            let raster = render_mesh(&loaded, rotation, scale, mesh.color).map_err(|e| {
                log::error!("Failed to render mesh {}: {}", mesh.path.display(), e);
                SkipReason::Render
            })?;
            if opaque_bounds(&raster).is_none() {
                log::warn!("Mesh {} rendered no opaque pixels", mesh.path.display());
                return Err(SkipReason::EmptyRender);
            }
            Ok(RenderedObject {
                class_id: mesh.class_id,
                raster,
            })
        })
        .collect();
    diagnostics.record_event("Rend_Obj", start_render);

    let mut rendered = Vec::with_capacity(render_results.len());
    for result in render_results {
        match result {
            Ok(object) => rendered.push(object),
            Err(reason) => stats.record_skip(reason),
        }
    }
    if rendered.is_empty() {
        return Err(BackgroundError::NoRenders);
    }

    // Average footprint, halved to leave spacing margin between slots
    let sum_width: u32 = rendered.iter().map(|object| object.raster.width()).sum();
    let sum_height: u32 = rendered.iter().map(|object| object.raster.height()).sum();
    let cell_width = sum_width / rendered.len() as u32 / 2;
    let cell_height = sum_height / rendered.len() as u32 / 2;

    let start_positions = Instant::now();
    let mut grid = PlacementGrid::build(bg_width, bg_height, cell_width, cell_height)?;
    diagnostics.record_event("Get_Positions", start_positions);

    let start_place = Instant::now();
    let mut records = Vec::with_capacity(rendered.len());
    for object in &rendered {
        match place_object(object, &mut background, &mut grid, rng) {
            Ok(record) => records.push(record),
            Err(reason) => stats.record_skip(reason),
        }
    }
    diagnostics.record_event("Place_Objects", start_place);

    // One write per background image, after all objects are composited
    let image_path = output_dir.join(format!("{index}.jpg"));
    DynamicImage::ImageRgba8(background)
        .to_rgb8()
        .save(&image_path)?;
    write_label_file(&labels_dir.join(format!("{index}.txt")), &records)?;

    stats.objects_placed += records.len();
    log::info!(
        "Processed background {}: {} objects placed",
        background_path.display(),
        records.len()
    );
    Ok(())
}

// Composite one render at a random unused slot and derive its label from the
// visible extent of its opaque pixels.
fn place_object(
    object: &RenderedObject,
    background: &mut RgbaImage,
    grid: &mut PlacementGrid,
    rng: &mut StdRng,
) -> Result<LabelRecord, SkipReason> {
    let (slot_x, slot_y) = grid.take_random(rng).ok_or(SkipReason::SlotsExhausted)?;
    let (bg_width, bg_height) = background.dimensions();
    let raster = &object.raster;

    let paste_x = slot_x - raster.width() as i64 / 2;
    let paste_y = slot_y - raster.height() as i64 / 2;
    imageops::overlay(background, raster, paste_x, paste_y);

    let (min_x, min_y, max_x, max_y) =
        opaque_bounds(raster).ok_or(SkipReason::EmptyRender)?;

    // Visible extent in background coordinates, clipped to the image
    let x0 = (paste_x + min_x as i64).max(0);
    let y0 = (paste_y + min_y as i64).max(0);
    let x1 = (paste_x + max_x as i64).min(bg_width as i64 - 1);
    let y1 = (paste_y + max_y as i64).min(bg_height as i64 - 1);
    if x0 > x1 || y0 > y1 {
        return Err(SkipReason::OutOfRange);
    }

    let width = (x1 - x0 + 1) as f64;
    let height = (y1 - y0 + 1) as f64;
    let x_center = (x0 + x1 + 1) as f64 / 2.0;
    let y_center = (y0 + y1 + 1) as f64 / 2.0;

    LabelRecord::from_pixels(
        object.class_id,
        x_center,
        y_center,
        width,
        height,
        bg_width,
        bg_height,
    )
    .map_err(|_| SkipReason::OutOfRange)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use rand::SeedableRng;

    fn solid_raster(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn placed_object_label_stays_normalized() {
        let mut background = RgbaImage::from_pixel(200, 100, Rgba([0, 0, 0, 255]));
        let mut grid = PlacementGrid::build(200, 100, 40, 40).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let object = RenderedObject {
            class_id: 1,
            raster: solid_raster(30, 20),
        };

        let record = place_object(&object, &mut background, &mut grid, &mut rng).unwrap();
        assert_eq!(record.class_id, 1);
        for value in [
            record.x_center,
            record.y_center,
            record.width,
            record.height,
        ] {
            assert!((0.0..=1.0).contains(&value));
        }
        // A fully interior paste keeps the raster's exact footprint
        assert!((record.width * 200.0 - 30.0).abs() < 1e-9);
        assert!((record.height * 100.0 - 20.0).abs() < 1e-9);
    }

    #[test]
    fn edge_paste_is_clipped_into_range() {
        // Raster larger than the cell spacing forces clipping at the border
        let mut background = RgbaImage::from_pixel(60, 60, Rgba([0, 0, 0, 255]));
        let mut grid = PlacementGrid::build(60, 60, 30, 30).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let object = RenderedObject {
            class_id: 0,
            raster: solid_raster(50, 50),
        };

        let record = place_object(&object, &mut background, &mut grid, &mut rng).unwrap();
        for value in [
            record.x_center,
            record.y_center,
            record.width,
            record.height,
        ] {
            assert!((0.0..=1.0).contains(&value), "value {value} out of range");
        }
    }

    #[test]
    fn exhausted_grid_reports_skip() {
        let mut background = RgbaImage::from_pixel(60, 60, Rgba([0, 0, 0, 255]));
        let mut grid = PlacementGrid::build(60, 60, 40, 40).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let object = RenderedObject {
            class_id: 0,
            raster: solid_raster(10, 10),
        };

        assert!(place_object(&object, &mut background, &mut grid, &mut rng).is_ok());
        assert!(matches!(
            place_object(&object, &mut background, &mut grid, &mut rng),
            Err(SkipReason::SlotsExhausted)
        ));
    }

    #[test]
    fn compositing_changes_background_pixels() {
        let mut background = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        let mut grid = PlacementGrid::build(100, 100, 50, 50).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let object = RenderedObject {
            class_id: 0,
            raster: solid_raster(20, 20),
        };

        let record = place_object(&object, &mut background, &mut grid, &mut rng).unwrap();
        let (x, y, _, _) = record.to_pixels(100, 100);
        let pixel = background.get_pixel(x as u32 - 1, y as u32 - 1);
        assert_eq!(pixel[0], 255);
    }
}
