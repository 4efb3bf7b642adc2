use std::f32::consts::PI;

use glam::{vec3, Vec3};

use crate::{Error, Result};

/// Single triangle of a [`Mesh`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshTriangle {
    positions: [Vec3; 3],
    normals: Option<[Vec3; 3]>,
}

impl MeshTriangle {
    pub fn new(positions: [Vec3; 3]) -> Self {
        Self {
            positions,
            normals: None,
        }
    }

    pub fn with_normals(mut self, normals: [Vec3; 3]) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn positions(&self) -> [Vec3; 3] {
        self.positions
    }

    /// Returns per-vertex normals, falling back to the flat face normal.
    pub fn normals(&self) -> [Vec3; 3] {
        self.normals.unwrap_or([self.face_normal(); 3])
    }

    pub fn face_normal(&self) -> Vec3 {
        let [p0, p1, p2] = self.positions;

        (p1 - p0).cross(p2 - p0).normalize_or_zero()
    }

    pub fn center(&self) -> Vec3 {
        self.positions.into_iter().sum::<Vec3>() / 3.0
    }

    fn is_finite(&self) -> bool {
        self.positions.iter().all(|p| p.is_finite())
            && self
                .normals
                .map_or(true, |normals| normals.iter().all(|n| n.is_finite()))
    }
}

/// De-indexed triangle soup, i.e. each triangle owns its vertices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    triangles: Vec<MeshTriangle>,
}

impl Mesh {
    pub fn new(triangles: Vec<MeshTriangle>) -> Self {
        Self { triangles }
    }

    /// Creates a mesh out of indexed geometry, duplicating shared vertices.
    ///
    /// `normals`, if given, must be as long as `positions`.
    pub fn from_indexed(
        positions: &[Vec3],
        normals: Option<&[Vec3]>,
        indices: &[u32],
    ) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(Error::InvalidGeometry(format!(
                "index count ({}) is not a multiple of three",
                indices.len()
            )));
        }

        if let Some(normals) = normals {
            if normals.len() != positions.len() {
                return Err(Error::InvalidGeometry(format!(
                    "got {} normals for {} positions",
                    normals.len(),
                    positions.len()
                )));
            }
        }

        let vertex = |idx: u32| {
            positions.get(idx as usize).copied().ok_or_else(|| {
                Error::InvalidGeometry(format!("index out of bounds: {idx}"))
            })
        };

        indices
            .chunks_exact(3)
            .map(|idx| {
                let triangle = MeshTriangle::new([
                    vertex(idx[0])?,
                    vertex(idx[1])?,
                    vertex(idx[2])?,
                ]);

                Ok(match normals {
                    Some(normals) => triangle.with_normals([
                        normals[idx[0] as usize],
                        normals[idx[1] as usize],
                        normals[idx[2] as usize],
                    ]),
                    None => triangle,
                })
            })
            .collect::<Result<_>>()
            .map(Self::new)
    }

    /// Creates a unit icosphere (radius = 1, centered at origin) with smooth
    /// normals; `subdivisions = 0` yields a plain icosahedron.
    pub fn icosphere(subdivisions: u32) -> Self {
        let t = (1.0 + 5.0f32.sqrt()) / 2.0;

        let mut positions: Vec<Vec3> = [
            vec3(-1.0, t, 0.0),
            vec3(1.0, t, 0.0),
            vec3(-1.0, -t, 0.0),
            vec3(1.0, -t, 0.0),
            vec3(0.0, -1.0, t),
            vec3(0.0, 1.0, t),
            vec3(0.0, -1.0, -t),
            vec3(0.0, 1.0, -t),
            vec3(t, 0.0, -1.0),
            vec3(t, 0.0, 1.0),
            vec3(-t, 0.0, -1.0),
            vec3(-t, 0.0, 1.0),
        ]
        .into_iter()
        .map(Vec3::normalize)
        .collect();

        let mut faces: Vec<[u32; 3]> = vec![
            [0, 11, 5],
            [0, 5, 1],
            [0, 1, 7],
            [0, 7, 10],
            [0, 10, 11],
            [1, 5, 9],
            [5, 11, 4],
            [11, 10, 2],
            [10, 7, 6],
            [7, 1, 8],
            [3, 9, 4],
            [3, 4, 2],
            [3, 2, 6],
            [3, 6, 8],
            [3, 8, 9],
            [4, 9, 5],
            [2, 4, 11],
            [6, 2, 10],
            [8, 6, 7],
            [9, 8, 1],
        ];

        for _ in 0..subdivisions {
            let mut midpoints = std::collections::HashMap::new();

            let mut midpoint = |a: u32, b: u32| {
                *midpoints.entry((a.min(b), a.max(b))).or_insert_with(|| {
                    let p = (positions[a as usize] + positions[b as usize])
                        .normalize();

                    positions.push(p);
                    (positions.len() - 1) as u32
                })
            };

            faces = faces
                .into_iter()
                .flat_map(|[a, b, c]| {
                    let ab = midpoint(a, b);
                    let bc = midpoint(b, c);
                    let ca = midpoint(c, a);

                    [[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]
                })
                .collect();
        }

        let triangles = faces
            .into_iter()
            .map(|face| {
                let positions = face.map(|idx| positions[idx as usize]);

                // On a unit sphere, the normal is the position itself
                MeshTriangle::new(positions).with_normals(positions)
            })
            .collect();

        Self::new(triangles)
    }

    /// Creates a brilliant-ish cut: a crown and a pavilion fanned out of a
    /// regular polygon girdle, with flat normals.
    pub fn gem(facets: u32, crown_height: f32, pavilion_depth: f32) -> Self {
        let facets = facets.max(3);
        let table = vec3(0.0, crown_height, 0.0);
        let culet = vec3(0.0, -pavilion_depth, 0.0);

        let girdle = |idx: u32| {
            let angle = 2.0 * PI * (idx % facets) as f32 / facets as f32;

            vec3(angle.cos(), 0.0, -angle.sin())
        };

        let triangles = (0..facets)
            .flat_map(|idx| {
                let a = girdle(idx);
                let b = girdle(idx + 1);

                [
                    MeshTriangle::new([table, a, b]),
                    MeshTriangle::new([culet, b, a]),
                ]
            })
            .collect();

        Self::new(triangles)
    }

    pub fn triangles(&self) -> &[MeshTriangle] {
        &self.triangles
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyMesh);
        }

        if let Some(idx) = self.triangles.iter().position(|t| !t.is_finite()) {
            return Err(Error::InvalidGeometry(format!(
                "triangle #{idx} has non-finite coordinates"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn from_indexed() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
        let mesh = Mesh::from_indexed(&positions, None, &[0, 1, 2, 0, 2, 3])
            .unwrap();

        assert_eq!(2, mesh.len());
        assert_eq!(
            [Vec3::ZERO, Vec3::X, Vec3::Y],
            mesh.triangles()[0].positions()
        );
        assert_eq!([Vec3::Z; 3], mesh.triangles()[0].normals());
    }

    #[test]
    fn from_indexed_rejects_out_of_bounds_indices() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let result = Mesh::from_indexed(&positions, None, &[0, 1, 3]);

        assert!(matches!(result, Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn from_indexed_rejects_dangling_indices() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let result = Mesh::from_indexed(&positions, None, &[0, 1]);

        assert!(matches!(result, Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn icosphere() {
        assert_eq!(20, Mesh::icosphere(0).len());
        assert_eq!(80, Mesh::icosphere(1).len());
        assert_eq!(320, Mesh::icosphere(2).len());

        for triangle in Mesh::icosphere(2).triangles() {
            for p in triangle.positions() {
                assert_relative_eq!(p.length(), 1.0, epsilon = 1e-5);
            }

            // Faces are wound outwards
            assert!(triangle.face_normal().dot(triangle.center()) > 0.0);
        }
    }

    #[test]
    fn gem_is_wound_outwards() {
        let mesh = Mesh::gem(8, 0.4, 0.8);

        assert_eq!(16, mesh.len());

        for triangle in mesh.triangles() {
            assert!(triangle.face_normal().dot(triangle.center()) > 0.0);
        }
    }

    #[test]
    fn validate() {
        assert!(matches!(Mesh::default().validate(), Err(Error::EmptyMesh)));

        let mesh = Mesh::new(vec![MeshTriangle::new([
            Vec3::ZERO,
            Vec3::X,
            Vec3::splat(f32::NAN),
        ])]);

        assert!(matches!(mesh.validate(), Err(Error::InvalidGeometry(_))));
    }
}
