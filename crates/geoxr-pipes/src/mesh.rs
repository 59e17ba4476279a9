//! Coloured triangle meshes for cylinders and hollow tubes.
//!
//! Shapes are generated along +Z from `z = 0` and then moved into place with
//! [`ColoredMesh::transform`]. Triangles wind counter-clockwise seen from
//! outside.

use std::f64::consts::TAU;

use glam::{DMat4, DVec3};

use crate::color::Rgba8;

/// Number of segments around every cylinder.
pub const SECTIONS: u32 = 64;

/// An indexed triangle list with per-vertex normals and colours.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColoredMesh {
    pub positions: Vec<DVec3>,
    pub normals: Vec<DVec3>,
    pub colors: Vec<Rgba8>,
    pub indices: Vec<u32>,
}

impl ColoredMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Smallest and largest corner over all vertices.
    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))),
        )
    }

    /// Move every vertex by a rigid transform.
    pub fn transform(&mut self, matrix: &DMat4) {
        for position in &mut self.positions {
            *position = matrix.transform_point3(*position);
        }
        for normal in &mut self.normals {
            *normal = matrix.transform_vector3(*normal).normalize_or_zero();
        }
    }

    /// Add another mesh's triangles to this one.
    pub fn append(&mut self, other: ColoredMesh) {
        let offset = index(self.positions.len());
        self.positions.extend(other.positions);
        self.normals.extend(other.normals);
        self.colors.extend(other.colors);
        self.indices.extend(other.indices.into_iter().map(|i| i + offset));
    }

    fn push_vertex(&mut self, position: DVec3, normal: DVec3, color: Rgba8) -> u32 {
        let i = index(self.positions.len());
        self.positions.push(position);
        self.normals.push(normal);
        self.colors.push(color);
        i
    }

    fn push_quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.indices.extend([a, b, c, a, c, d]);
    }

    /// Side wall of radius `radius` between `z0` and `z1`. Normals point
    /// away from the axis when `outward`, towards it otherwise.
    fn side(&mut self, radius: f64, z0: f64, z1: f64, outward: bool, color: Rgba8) {
        let sign = if outward { 1.0 } else { -1.0 };
        let first = index(self.positions.len());
        for radial in ring() {
            self.push_vertex(radial * radius + DVec3::Z * z0, radial * sign, color);
            self.push_vertex(radial * radius + DVec3::Z * z1, radial * sign, color);
        }
        for i in 0..SECTIONS {
            let j = (i + 1) % SECTIONS;
            let (bottom_a, top_a) = (first + 2 * i, first + 2 * i + 1);
            let (bottom_b, top_b) = (first + 2 * j, first + 2 * j + 1);
            if outward {
                self.push_quad(bottom_a, bottom_b, top_b, top_a);
            } else {
                self.push_quad(bottom_a, top_a, top_b, bottom_b);
            }
        }
    }

    /// Flat disc at height `z`, facing +Z when `up`.
    fn disc(&mut self, radius: f64, z: f64, up: bool, color: Rgba8) {
        let normal = if up { DVec3::Z } else { DVec3::NEG_Z };
        let center = self.push_vertex(DVec3::Z * z, normal, color);
        for radial in ring() {
            self.push_vertex(radial * radius + DVec3::Z * z, normal, color);
        }
        for i in 0..SECTIONS {
            let a = center + 1 + i;
            let b = center + 1 + (i + 1) % SECTIONS;
            if up {
                self.indices.extend([center, a, b]);
            } else {
                self.indices.extend([center, b, a]);
            }
        }
    }

    /// Flat ring between `inner` and `outer` at height `z`, facing +Z when `up`.
    fn annulus(&mut self, outer: f64, inner: f64, z: f64, up: bool, color: Rgba8) {
        let normal = if up { DVec3::Z } else { DVec3::NEG_Z };
        let first = index(self.positions.len());
        for radial in ring() {
            self.push_vertex(radial * inner + DVec3::Z * z, normal, color);
            self.push_vertex(radial * outer + DVec3::Z * z, normal, color);
        }
        for i in 0..SECTIONS {
            let j = (i + 1) % SECTIONS;
            let (inner_a, outer_a) = (first + 2 * i, first + 2 * i + 1);
            let (inner_b, outer_b) = (first + 2 * j, first + 2 * j + 1);
            if up {
                self.push_quad(inner_a, outer_a, outer_b, inner_b);
            } else {
                self.push_quad(inner_a, inner_b, outer_b, outer_a);
            }
        }
    }
}

fn index(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Unit vectors around the Z axis, counter-clockwise from +X.
fn ring() -> impl Iterator<Item = DVec3> {
    (0..SECTIONS).map(|i| {
        let angle = TAU * f64::from(i) / f64::from(SECTIONS);
        DVec3::new(angle.cos(), angle.sin(), 0.0)
    })
}

/// Closed solid cylinder along +Z from `0` to `length`.
pub fn cylinder(radius: f64, length: f64, color: Rgba8) -> ColoredMesh {
    let mut mesh = ColoredMesh::default();
    mesh.side(radius, 0.0, length, true, color);
    mesh.disc(radius, 0.0, false, color);
    mesh.disc(radius, length, true, color);
    mesh
}

/// Closed hollow tube along +Z from `0` to `length`.
///
/// Falls back to a solid cylinder when the wall is as thick as the radius.
pub fn tube(outer: f64, inner: f64, length: f64, color: Rgba8) -> ColoredMesh {
    if inner <= 0.0 {
        return cylinder(outer, length, color);
    }
    let mut mesh = ColoredMesh::default();
    mesh.side(outer, 0.0, length, true, color);
    mesh.side(inner, 0.0, length, false, color);
    mesh.annulus(outer, inner, 0.0, false, color);
    mesh.annulus(outer, inner, length, true, color);
    mesh
}

#[cfg(test)]
mod tests {
    use glam::DQuat;

    use super::*;

    /// Outward normal of each triangle from its winding.
    fn face_normals(mesh: &ColoredMesh) -> impl Iterator<Item = (DVec3, DVec3)> + '_ {
        mesh.indices.chunks(3).map(|t| {
            let [a, b, c] = [t[0], t[1], t[2]].map(|i| mesh.positions[i as usize]);
            ((b - a).cross(c - a), (a + b + c) / 3.0)
        })
    }

    #[test]
    fn test_cylinder_counts_and_bounds() {
        let mesh = cylinder(0.5, 2.0, Rgba8::DEFAULT);
        let n = SECTIONS as usize;

        assert_eq!(mesh.vertex_count(), 4 * n + 2);
        assert_eq!(mesh.triangle_count(), 4 * n);
        assert_eq!(mesh.colors.len(), mesh.vertex_count());
        let (min, max) = mesh.bounds().unwrap();
        assert!((min - DVec3::new(-0.5, -0.5, 0.0)).length() < 1e-9);
        assert!((max - DVec3::new(0.5, 0.5, 2.0)).length() < 1e-9);
    }

    #[test]
    fn test_tube_counts() {
        let mesh = tube(0.5, 0.45, 3.0, Rgba8::DEFAULT);
        let n = SECTIONS as usize;

        assert_eq!(mesh.vertex_count(), 8 * n);
        assert_eq!(mesh.triangle_count(), 8 * n);
    }

    #[test]
    fn test_thin_tube_is_solid() {
        assert_eq!(
            tube(0.04, -0.01, 1.0, Rgba8::DEFAULT),
            cylinder(0.04, 1.0, Rgba8::DEFAULT)
        );
    }

    #[test]
    fn test_cylinder_faces_point_outward() {
        let mesh = cylinder(1.0, 2.0, Rgba8::DEFAULT);
        let center = DVec3::new(0.0, 0.0, 1.0);
        for (normal, centroid) in face_normals(&mesh) {
            assert!(normal.dot(centroid - center) > 0.0);
        }
    }

    #[test]
    fn test_tube_faces_point_out_of_the_wall() {
        let mesh = tube(1.0, 0.8, 2.0, Rgba8::DEFAULT);
        for (normal, centroid) in face_normals(&mesh) {
            let radial = DVec3::new(centroid.x, centroid.y, 0.0);
            let axial = centroid.z - 1.0;
            // Inside the wall's mid radius faces inwards, ends face along Z.
            let expected = if axial.abs() > 0.999 {
                DVec3::Z * axial.signum()
            } else if radial.length() > 0.9 {
                radial
            } else {
                -radial
            };
            assert!(normal.dot(expected) > 0.0, "{centroid:?}");
        }
    }

    #[test]
    fn test_transform_and_append() {
        let mut a = cylinder(1.0, 1.0, Rgba8::DEFAULT);
        let mut b = cylinder(1.0, 1.0, Rgba8([255, 0, 0, 255]));
        b.transform(&DMat4::from_rotation_translation(
            DQuat::from_rotation_x(std::f64::consts::FRAC_PI_2),
            DVec3::new(10.0, 0.0, 0.0),
        ));
        let (_, max) = b.bounds().unwrap();
        assert!((max.x - 11.0).abs() < 1e-9);
        assert!(b.normals.iter().all(|n| (n.length() - 1.0).abs() < 1e-9));

        let vertices = a.vertex_count();
        a.append(b);
        assert_eq!(a.vertex_count(), 2 * vertices);
        assert!(a.indices.iter().all(|&i| (i as usize) < a.vertex_count()));
        assert_eq!(a.colors[vertices], Rgba8([255, 0, 0, 255]));
    }
}
