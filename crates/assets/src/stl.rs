//! Binary STL decoder.
//!
//! Layout, little-endian:
//! ```text
//! [80 bytes header][u32 triangle_count]
//! { [f32 x3 normal] [f32 x3 vertex] x3 [u16 attribute] } x triangle_count
//! ```
//! The layout is bit-exact: a short or over-long record stream fails decoding.

use crate::normalize::UpAxis;
use glam::Vec3;
use meshview_common::{MAX_INDEXED_VERTICES, MeshData, Vertex};
use std::path::Path;

pub const HEADER_LEN: usize = 80;
const COUNT_LEN: usize = 4;
pub const RECORD_LEN: usize = 50;

/// Facet normals with a squared length below this are replaced.
pub const DEGENERATE_NORMAL_EPSILON: f32 = 1e-4;

/// Substitute for degenerate facet normals.
pub const DEFAULT_NORMAL: Vec3 = Vec3::Y;

/// STL files are authored Z-up.
pub const STL_UP_AXIS: UpAxis = UpAxis::Z;

/// Errors from decoding a binary STL stream.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file too short for header and triangle count ({len} bytes)")]
    MissingHeader { len: usize },
    #[error("truncated: {triangles} triangles need {expected} bytes, got {actual}")]
    Truncated {
        triangles: u32,
        expected: u64,
        actual: u64,
    },
    #[error("{extra} unexpected bytes after {triangles} triangle records")]
    TrailingBytes { triangles: u32, extra: u64 },
    #[error("{vertices} vertices exceed the 16-bit index range ({max})", max = MAX_INDEXED_VERTICES)]
    IndexOverflow { vertices: u64 },
}

/// Result of a successful decode.
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub mesh: MeshData,
    /// Number of facets whose normal was replaced by [`DEFAULT_NORMAL`].
    pub substituted_normals: usize,
}

/// Decode a binary STL byte stream into flat-shaded vertex and index arrays.
pub fn decode(bytes: &[u8]) -> Result<Decoded, DecodeError> {
    if bytes.len() < HEADER_LEN + COUNT_LEN {
        return Err(DecodeError::MissingHeader { len: bytes.len() });
    }

    let triangles = u32::from_le_bytes([
        bytes[HEADER_LEN],
        bytes[HEADER_LEN + 1],
        bytes[HEADER_LEN + 2],
        bytes[HEADER_LEN + 3],
    ]);
    let records = &bytes[HEADER_LEN + COUNT_LEN..];

    let expected = triangles as u64 * RECORD_LEN as u64;
    let actual = records.len() as u64;
    if actual < expected {
        return Err(DecodeError::Truncated {
            triangles,
            expected: expected + (HEADER_LEN + COUNT_LEN) as u64,
            actual: bytes.len() as u64,
        });
    }
    if actual > expected {
        return Err(DecodeError::TrailingBytes {
            triangles,
            extra: actual - expected,
        });
    }

    let vertex_count = triangles as u64 * 3;
    if vertex_count > MAX_INDEXED_VERTICES as u64 {
        return Err(DecodeError::IndexOverflow {
            vertices: vertex_count,
        });
    }

    let mut vertices = Vec::with_capacity(vertex_count as usize);
    let mut indices = Vec::with_capacity(vertex_count as usize);
    let mut substituted_normals = 0;

    for record in records.chunks_exact(RECORD_LEN) {
        let mut normal = read_vec3(record, 0);
        if normal.length_squared() < DEGENERATE_NORMAL_EPSILON {
            normal = DEFAULT_NORMAL;
            substituted_normals += 1;
        }

        for (corner, barycentric) in Vertex::CORNERS.into_iter().enumerate() {
            let position = read_vec3(record, 12 + corner * 12);
            indices.push(vertices.len() as u16);
            vertices.push(Vertex::new(position, normal, barycentric));
        }
        // The trailing 2-byte attribute field is ignored.
    }

    if substituted_normals > 0 {
        tracing::debug!(substituted_normals, "replaced degenerate facet normals");
    }

    Ok(Decoded {
        mesh: MeshData { vertices, indices },
        substituted_normals,
    })
}

/// Read and decode a binary STL file.
pub fn load(path: impl AsRef<Path>) -> Result<Decoded, DecodeError> {
    let bytes = std::fs::read(path.as_ref())?;
    decode(&bytes)
}

fn read_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn read_vec3(data: &[u8], offset: usize) -> Vec3 {
    Vec3::new(
        read_f32(data, offset),
        read_f32(data, offset + 4),
        read_f32(data, offset + 8),
    )
}

/// Encode triangles as binary STL. Test fixture helper.
#[cfg(test)]
pub(crate) fn encode(triangles: &[(Vec3, [Vec3; 3])]) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_LEN];
    out.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
    for (normal, corners) in triangles {
        for v in std::iter::once(normal).chain(corners.iter()) {
            for c in v.to_array() {
                out.extend_from_slice(&c.to_le_bytes());
            }
        }
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    out
}
