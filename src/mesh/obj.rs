use std::path::Path;

use crate::error::{MeshError, Result};
use crate::math::Point3;

use super::TriangleMesh;

/// Loads the geometry of a Wavefront OBJ file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_obj(path: impl AsRef<Path>) -> Result<TriangleMesh> {
    let text = std::fs::read_to_string(path).map_err(MeshError::from)?;
    parse_obj(&text)
}

/// Parses the `v` and `f` records of Wavefront OBJ text.
///
/// Faces with more than three corners are fan-triangulated. Corner
/// references may be negative (relative to the end of the vertex list)
/// and may carry `/vt/vn` suffixes, which are ignored along with every
/// other record type.
///
/// # Errors
///
/// Returns an error on malformed numbers, faces with fewer than three
/// corners, or corner references outside the vertex list.
pub fn parse_obj(text: &str) -> Result<TriangleMesh> {
    let mut mesh = TriangleMesh::new();

    for (n, raw) in text.lines().enumerate() {
        let line = n + 1;
        let mut fields = raw.split_whitespace();
        match fields.next() {
            Some("v") => {
                let mut coords = [0.0; 3];
                for c in &mut coords {
                    let field = fields.next().ok_or_else(|| parse_error(line, "vertex needs 3 coordinates"))?;
                    *c = field
                        .parse()
                        .map_err(|_| parse_error(line, &format!("bad coordinate `{field}`")))?;
                }
                mesh.append_vertex(Point3::new(coords[0], coords[1], coords[2]));
            }
            Some("f") => {
                let corners = fields
                    .map(|field| corner_index(field, mesh.num_vertices(), line))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                if corners.len() < 3 {
                    return Err(parse_error(line, "face needs at least 3 corners").into());
                }
                for k in 1..corners.len() - 1 {
                    mesh.append_triangle(corners[0], corners[k], corners[k + 1]);
                }
            }
            _ => {}
        }
    }

    Ok(mesh)
}

fn corner_index(field: &str, vertex_count: usize, line: usize) -> std::result::Result<u32, MeshError> {
    let head = field.split('/').next().unwrap_or(field);
    let raw: i64 = head
        .parse()
        .map_err(|_| parse_error(line, &format!("bad face corner `{field}`")))?;
    let count = i64::try_from(vertex_count).unwrap_or(i64::MAX);
    let index = match raw {
        r if r > 0 => r - 1,
        r if r < 0 => count + r,
        _ => return Err(parse_error(line, "face corner index 0 is invalid")),
    };
    if index < 0 || index >= count {
        return Err(parse_error(line, &format!("face corner `{field}` is out of range")));
    }
    u32::try_from(index).map_err(|_| parse_error(line, "face corner index too large"))
}

fn parse_error(line: usize, message: &str) -> MeshError {
    MeshError::Parse {
        line,
        message: message.to_owned(),
    }
}
