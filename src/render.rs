use glam::{DMat4, DVec3};
use image::{Rgba, RgbaImage};

use crate::stl::TriangleMesh;

// Base off-screen window; rendered rasters are scale_factor * base per axis.
pub const BASE_WINDOW_WIDTH: u32 = 1024;
pub const BASE_WINDOW_HEIGHT: u32 = 768;

// Vertical field of view of the framing camera.
const FOV_Y_DEGREES: f64 = 30.0;

// Flat shading: ambient floor plus headlight diffuse.
const AMBIENT: f64 = 0.25;

/// Error types for the render module.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Mesh bounds are empty or non-finite
    #[error("mesh has degenerate bounds")]
    DegenerateMesh,

    /// Scale factor must be positive
    #[error("invalid scale factor: {0}")]
    InvalidScale(f64),
}

/// Render a mesh under the given rotation to a transparent-background RGBA
/// raster of `scale_factor * base_window` pixels per axis.
///
/// The camera sits at `(0, 0, -2 * diagonal)` looking at the origin with up
/// `(0, 1, 0)`; the mesh is centered on its bounding box before the rotation
/// is applied. Triangles are z-buffered and flat shaded in `color`.
pub fn render_mesh(
    mesh: &TriangleMesh,
    rotation: DMat4,
    scale_factor: f64,
    color: [u8; 3],
) -> Result<RgbaImage, RenderError> {
    if !(scale_factor > 0.0 && scale_factor.is_finite()) {
        return Err(RenderError::InvalidScale(scale_factor));
    }
    let length = mesh.bounding_diagonal();
    if !(length > 0.0 && length.is_finite()) {
        return Err(RenderError::DegenerateMesh);
    }

    let width = ((BASE_WINDOW_WIDTH as f64 * scale_factor) as u32).max(1);
    let height = ((BASE_WINDOW_HEIGHT as f64 * scale_factor) as u32).max(1);

    let model = rotation * DMat4::from_translation(-mesh.center());
    let eye = DVec3::new(0.0, 0.0, -2.0 * length);
    let view = DMat4::look_at_rh(eye, DVec3::ZERO, DVec3::Y);
    let proj = DMat4::perspective_rh(
        FOV_Y_DEGREES.to_radians(),
        width as f64 / height as f64,
        0.05 * length,
        8.0 * length,
    );
    let view_proj = proj * view;

    let mut raster = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    let mut zbuffer = vec![f64::MAX; (width * height) as usize];

    for triangle in &mesh.triangles {
        let world: [DVec3; 3] = [
            model.transform_point3(mesh.vertices[triangle[0] as usize]),
            model.transform_point3(mesh.vertices[triangle[1] as usize]),
            model.transform_point3(mesh.vertices[triangle[2] as usize]),
        ];

        // Double-sided headlight shading along the view axis
        let normal = (world[1] - world[0]).cross(world[2] - world[0]);
        let shade = if normal.length_squared() > 0.0 {
            AMBIENT + (1.0 - AMBIENT) * normal.normalize().z.abs()
        } else {
            continue;
        };
        let shaded = color.map(|c| (c as f64 * shade).round().clamp(0.0, 255.0) as u8);

        let mut screen = [(0.0f64, 0.0f64, 0.0f64); 3];
        let mut clipped = false;
        for (slot, point) in screen.iter_mut().zip(world) {
            let clip = view_proj * point.extend(1.0);
            if clip.w <= 0.0 {
                clipped = true;
                break;
            }
            let ndc = clip.truncate() / clip.w;
            *slot = (
                (ndc.x * 0.5 + 0.5) * width as f64,
                (0.5 - ndc.y * 0.5) * height as f64,
                ndc.z,
            );
        }
        if clipped {
            continue;
        }

        fill_triangle(&mut raster, &mut zbuffer, &screen, shaded);
    }

    Ok(raster)
}

fn edge(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> f64 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

fn fill_triangle(
    raster: &mut RgbaImage,
    zbuffer: &mut [f64],
    screen: &[(f64, f64, f64); 3],
    color: [u8; 3],
) {
    let (width, height) = (raster.width(), raster.height());
    let p0 = (screen[0].0, screen[0].1);
    let p1 = (screen[1].0, screen[1].1);
    let p2 = (screen[2].0, screen[2].1);

    let area = edge(p0, p1, p2);
    if area.abs() < f64::EPSILON {
        return;
    }

    let min_x = p0.0.min(p1.0).min(p2.0).floor().max(0.0) as u32;
    let max_x = (p0.0.max(p1.0).max(p2.0).ceil() as i64).clamp(0, width as i64 - 1) as u32;
    let min_y = p0.1.min(p1.1).min(p2.1).floor().max(0.0) as u32;
    let max_y = (p0.1.max(p1.1).max(p2.1).ceil() as i64).clamp(0, height as i64 - 1) as u32;
    if min_x > max_x || min_y > max_y {
        return;
    }

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let p = (x as f64 + 0.5, y as f64 + 0.5);
            let w0 = edge(p1, p2, p) / area;
            let w1 = edge(p2, p0, p) / area;
            let w2 = edge(p0, p1, p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let depth = w0 * screen[0].2 + w1 * screen[1].2 + w2 * screen[2].2;
            let index = (y * width + x) as usize;
            if depth < zbuffer[index] {
                zbuffer[index] = depth;
                raster.put_pixel(x, y, Rgba([color[0], color[1], color[2], 255]));
            }
        }
    }
}

/// Tight bounds of the opaque pixels of a raster as (min_x, min_y, max_x, max_y),
/// or `None` when nothing was drawn.
pub fn opaque_bounds(raster: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in raster.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((min_x, min_y, max_x, max_y)) => {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            }
        });
    }
    bounds
}
