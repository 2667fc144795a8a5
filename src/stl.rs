use glam::DVec3;
use std::path::Path;

// Binary STL layout: 80-byte header, u32 facet count, then 50 bytes per
// facet (normal + three vertices as f32 triplets + u16 attribute).
const BINARY_HEADER_LEN: usize = 80;
const BINARY_FACET_LEN: usize = 50;

/// Error types for the STL module.
#[derive(Debug, thiserror::Error)]
pub enum StlError {
    /// Failed to read STL file
    #[error("Failed to read STL file")]
    Io(#[from] std::io::Error),

    /// File too short or facet payload truncated
    #[error("Truncated STL data")]
    Truncated,

    /// A line of an ASCII STL file could not be parsed
    #[error("Malformed ASCII STL line: {0:?}")]
    MalformedAscii(String),

    /// Mesh contains no triangles
    #[error("STL file contains no triangles")]
    Empty,
}

/// A triangle surface mesh loaded from an STL file.
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    pub vertices: Vec<DVec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Axis-aligned bounds as (min, max).
    pub fn bounds(&self) -> (DVec3, DVec3) {
        let mut min = DVec3::splat(f64::MAX);
        let mut max = DVec3::splat(f64::MIN);
        for v in &self.vertices {
            min = min.min(*v);
            max = max.max(*v);
        }
        (min, max)
    }

    /// Length of the bounding-box diagonal, used for camera framing.
    pub fn bounding_diagonal(&self) -> f64 {
        let (min, max) = self.bounds();
        (max - min).length()
    }

    /// Center of the bounding box.
    pub fn center(&self) -> DVec3 {
        let (min, max) = self.bounds();
        (min + max) * 0.5
    }
}

/// Read an STL surface mesh, detecting binary vs ASCII encoding.
pub fn read_stl(path: impl AsRef<Path>) -> Result<TriangleMesh, StlError> {
    let bytes = std::fs::read(path)?;
    parse_stl(&bytes)
}

/// Parse STL data from a byte buffer.
///
/// The binary layout is checked first since binary files are allowed to start
/// with the bytes "solid" in their free-form header.
pub fn parse_stl(bytes: &[u8]) -> Result<TriangleMesh, StlError> {
    if bytes.len() >= BINARY_HEADER_LEN + 4 {
        let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
        if bytes.len() == BINARY_HEADER_LEN + 4 + count * BINARY_FACET_LEN {
            return parse_binary(&bytes[BINARY_HEADER_LEN + 4..], count);
        }
    }
    if bytes.starts_with(b"solid") {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| StlError::MalformedAscii("non-utf8 data".to_string()))?;
        return parse_ascii(text);
    }
    Err(StlError::Truncated)
}

fn parse_binary(payload: &[u8], count: usize) -> Result<TriangleMesh, StlError> {
    if count == 0 {
        return Err(StlError::Empty);
    }

    let mut vertices = Vec::with_capacity(count * 3);
    let mut triangles = Vec::with_capacity(count);

    for facet in payload.chunks_exact(BINARY_FACET_LEN) {
        // Skip the 12-byte facet normal; it is recomputed from the winding.
        let base = vertices.len() as u32;
        for i in 0..3 {
            let offset = 12 + i * 12;
            let v = read_vec3_f32(&facet[offset..offset + 12]).ok_or(StlError::Truncated)?;
            vertices.push(v);
        }
        triangles.push([base, base + 1, base + 2]);
    }

    Ok(TriangleMesh {
        vertices,
        triangles,
    })
}

fn read_vec3_f32(bytes: &[u8]) -> Option<DVec3> {
    if bytes.len() < 12 {
        return None;
    }
    let x = f32::from_le_bytes(bytes[0..4].try_into().ok()?);
    let y = f32::from_le_bytes(bytes[4..8].try_into().ok()?);
    let z = f32::from_le_bytes(bytes[8..12].try_into().ok()?);
    Some(DVec3::new(x as f64, y as f64, z as f64))
}

fn parse_ascii(text: &str) -> Result<TriangleMesh, StlError> {
    let mut vertices = Vec::new();
    let mut triangles = Vec::new();
    let mut pending: Vec<DVec3> = Vec::with_capacity(3);

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("vertex") {
            let coords: Vec<f64> = rest
                .split_whitespace()
                .map(|field| {
                    field
                        .parse()
                        .map_err(|_| StlError::MalformedAscii(trimmed.to_string()))
                })
                .collect::<Result<_, _>>()?;
            if coords.len() != 3 {
                return Err(StlError::MalformedAscii(trimmed.to_string()));
            }
            pending.push(DVec3::new(coords[0], coords[1], coords[2]));
        } else if trimmed == "endloop" {
            if pending.len() != 3 {
                return Err(StlError::MalformedAscii(trimmed.to_string()));
            }
            let base = vertices.len() as u32;
            vertices.append(&mut pending);
            triangles.push([base, base + 1, base + 2]);
        }
    }

    if triangles.is_empty() {
        return Err(StlError::Empty);
    }

    Ok(TriangleMesh {
        vertices,
        triangles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Build a binary STL buffer for the given facets.
    pub fn binary_stl(facets: &[[[f32; 3]; 3]]) -> Vec<u8> {
        let mut bytes = vec![0u8; BINARY_HEADER_LEN];
        bytes.extend_from_slice(&(facets.len() as u32).to_le_bytes());
        for facet in facets {
            bytes.extend_from_slice(&[0u8; 12]); // normal, ignored
            for vertex in facet {
                for coord in vertex {
                    bytes.extend_from_slice(&coord.to_le_bytes());
                }
            }
            bytes.extend_from_slice(&[0u8; 2]); // attribute byte count
        }
        bytes
    }

    #[test]
    fn parses_binary_facets() {
        let bytes = binary_stl(&[[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 2.0, 0.0]]]);
        let mesh = parse_stl(&bytes).unwrap();
        assert_eq!(mesh.triangles.len(), 1);
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.vertices[2], DVec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn parses_ascii_facets() {
        let text = "solid cube\n\
                    facet normal 0 0 1\n\
                    outer loop\n\
                    vertex 0 0 0\n\
                    vertex 1 0 0\n\
                    vertex 0 1 0\n\
                    endloop\n\
                    endfacet\n\
                    endsolid cube\n";
        let mesh = parse_stl(text.as_bytes()).unwrap();
        assert_eq!(mesh.triangles.len(), 1);
        assert_eq!(mesh.vertices[1], DVec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn bounding_diagonal_of_unit_triangle() {
        let bytes = binary_stl(&[[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]]);
        let mesh = parse_stl(&bytes).unwrap();
        assert_relative_eq!(mesh.bounding_diagonal(), 2.0f64.sqrt(), epsilon = 1e-9);
        assert_relative_eq!(mesh.center().x, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn rejects_truncated_and_empty_input() {
        assert!(matches!(parse_stl(&[0u8; 10]), Err(StlError::Truncated)));
        let empty = binary_stl(&[]);
        assert!(matches!(parse_stl(&empty), Err(StlError::Empty)));
    }
}
