//! Polygon extrusion.
//!
//! Builds a closed prism from a 2D outline: caps at `z = 0` and `z = depth`
//! and one flat-shaded quad per outline edge. Caps are
//! triangulated by ear clipping, so concave footprints are supported. Holes
//! are not.

use glam::{Vec2, Vec3};

use crate::bounds::Aabb3;

/// Tolerance for collinear and zero-area checks, relative to the square of
/// the ring's extent.
const AREA_EPSILON: f32 = 1e-9;

/// Triangle mesh data in the outline's local space (extrusion along +Z).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtrudedMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// Triangle list, counter-clockwise when seen from outside.
    pub indices: Vec<u32>,
}

impl ExtrudedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Local-space bounds of the mesh.
    pub fn bounds(&self) -> Option<Aabb3> {
        Aabb3::from_points(self.positions.iter().map(|p| Vec3::from_array(*p)))
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        // Meshes are far below u32::MAX vertices.
        #[allow(clippy::cast_possible_truncation)]
        let index = self.positions.len() as u32;
        self.positions.push(position.to_array());
        self.normals.push(normal.to_array());
        index
    }
}

/// Signed area of a ring (positive when counter-clockwise).
pub fn signed_area(ring: &[Vec2]) -> f32 {
    let Some(&origin) = ring.first() else {
        return 0.0;
    };
    // Relative to the first vertex so rings far from the origin keep precision.
    let n = ring.len();
    (0..n)
        .map(|i| (ring[i] - origin).perp_dot(ring[(i + 1) % n] - origin))
        .sum::<f32>()
        * 0.5
}

/// Normalize a ring for triangulation.
///
/// Drops the closing duplicate, repeated vertices and collinear vertices, and
/// reorders the ring counter-clockwise. Returns `None` when fewer than three
/// vertices remain or the ring has no area.
pub fn clean_outline(ring: &[Vec2]) -> Option<Vec<Vec2>> {
    let mut outline: Vec<Vec2> = Vec::with_capacity(ring.len());
    for &point in ring {
        if !point.is_finite() {
            return None;
        }
        if outline.last() != Some(&point) {
            outline.push(point);
        }
    }
    while outline.len() > 1 && outline.first() == outline.last() {
        outline.pop();
    }

    // Scale by the ring's own size, not its distance from the origin.
    let (min, max) = outline
        .iter()
        .fold((Vec2::INFINITY, Vec2::NEG_INFINITY), |(min, max), p| {
            (min.min(*p), max.max(*p))
        });
    let extent = (max - min).max_element();
    let tolerance = AREA_EPSILON * extent * extent;

    // Remove collinear vertices until none are left.
    loop {
        let n = outline.len();
        if n < 3 {
            return None;
        }
        let collinear = (0..n).find(|&i| {
            let prev = outline[(i + n - 1) % n];
            let next = outline[(i + 1) % n];
            (outline[i] - prev).perp_dot(next - outline[i]).abs() <= tolerance
        });
        match collinear {
            Some(i) => {
                outline.remove(i);
            }
            None => break,
        }
    }

    let area = signed_area(&outline);
    if area.abs() <= tolerance {
        return None;
    }
    if area < 0.0 {
        outline.reverse();
    }

    Some(outline)
}

/// Triangulate a counter-clockwise simple polygon by ear clipping.
///
/// Returns index triples into `outline`, counter-clockwise. Self-intersecting
/// input still terminates but may produce overlapping triangles.
pub fn triangulate(outline: &[Vec2]) -> Vec<[u32; 3]> {
    let n = outline.len();
    if n < 3 {
        return Vec::new();
    }

    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    while remaining.len() > 3 {
        let count = remaining.len();
        let ear = (0..count)
            .find(|&i| is_ear(outline, &remaining, i))
            // No clean ear left (self-intersecting ring): clip anyway so the
            // loop always terminates.
            .unwrap_or(0);

        let prev = remaining[(ear + count - 1) % count];
        let curr = remaining[ear];
        let next = remaining[(ear + 1) % count];
        triangles.push(triangle(prev, curr, next));
        remaining.remove(ear);
    }

    triangles.push(triangle(remaining[0], remaining[1], remaining[2]));
    triangles
}

fn triangle(a: usize, b: usize, c: usize) -> [u32; 3] {
    #[allow(clippy::cast_possible_truncation)]
    [a as u32, b as u32, c as u32]
}

fn is_ear(outline: &[Vec2], remaining: &[usize], i: usize) -> bool {
    let count = remaining.len();
    let ia = remaining[(i + count - 1) % count];
    let ib = remaining[i];
    let ic = remaining[(i + 1) % count];
    let (a, b, c) = (outline[ia], outline[ib], outline[ic]);

    // Reflex or flat corners are never ears.
    if (b - a).perp_dot(c - b) <= 0.0 {
        return false;
    }

    remaining
        .iter()
        .filter(|&&j| j != ia && j != ib && j != ic)
        .all(|&j| !point_in_triangle(outline[j], a, b, c))
}

fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = (b - a).perp_dot(p - a);
    let d2 = (c - b).perp_dot(p - b);
    let d3 = (a - c).perp_dot(p - c);
    d1 >= 0.0 && d2 >= 0.0 && d3 >= 0.0
}

/// Extrude a 2D ring along Z by `depth`.
///
/// A positive depth spans `0..=depth`, a negative one `depth..=0`. The ring may
/// be in either winding and may repeat its first vertex at the end. Returns
/// `None` for degenerate rings or a zero or non-finite depth.
pub fn extrude(ring: &[Vec2], depth: f32) -> Option<ExtrudedMesh> {
    if !(depth.is_finite() && depth != 0.0) {
        return None;
    }
    let (low, high) = (depth.min(0.0), depth.max(0.0));
    let outline = clean_outline(ring)?;
    let caps = triangulate(&outline);

    let n = outline.len();
    let mut mesh = ExtrudedMesh {
        positions: Vec::with_capacity(n * 6),
        normals: Vec::with_capacity(n * 6),
        indices: Vec::with_capacity((caps.len() * 2 + n * 2) * 3),
    };

    // Bottom cap faces -Z, so its winding is flipped.
    let bottom: Vec<u32> = outline
        .iter()
        .map(|p| mesh.push_vertex(p.extend(low), Vec3::NEG_Z))
        .collect();
    for [a, b, c] in &caps {
        mesh.indices
            .extend([bottom[*a as usize], bottom[*c as usize], bottom[*b as usize]]);
    }

    let top: Vec<u32> = outline
        .iter()
        .map(|p| mesh.push_vertex(p.extend(high), Vec3::Z))
        .collect();
    for [a, b, c] in &caps {
        mesh.indices
            .extend([top[*a as usize], top[*b as usize], top[*c as usize]]);
    }

    // Side walls: the outline is counter-clockwise, so (dy, -dx) points out.
    for i in 0..n {
        let a = outline[i];
        let b = outline[(i + 1) % n];
        let edge = b - a;
        let normal = Vec3::new(edge.y, -edge.x, 0.0).normalize_or_zero();

        let a0 = mesh.push_vertex(a.extend(low), normal);
        let b0 = mesh.push_vertex(b.extend(low), normal);
        let b1 = mesh.push_vertex(b.extend(high), normal);
        let a1 = mesh.push_vertex(a.extend(high), normal);
        mesh.indices.extend([a0, b0, b1, a0, b1, a1]);
    }

    Some(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f32) -> Vec<Vec2> {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(side, 0.0),
            Vec2::new(side, side),
            Vec2::new(0.0, side),
            Vec2::new(0.0, 0.0),
        ]
    }

    fn triangulated_area(outline: &[Vec2], triangles: &[[u32; 3]]) -> f32 {
        triangles
            .iter()
            .map(|[a, b, c]| {
                signed_area(&[
                    outline[*a as usize],
                    outline[*b as usize],
                    outline[*c as usize],
                ])
            })
            .sum()
    }

    #[test]
    fn test_clean_outline_drops_closing_and_collinear_vertices() {
        let ring = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(4.0, 4.0),
            Vec2::new(4.0, 4.0),
            Vec2::new(0.0, 4.0),
            Vec2::new(0.0, 0.0),
        ];
        let outline = clean_outline(&ring).unwrap();
        assert_eq!(outline.len(), 4);
        assert!(signed_area(&outline) > 0.0);
    }

    #[test]
    fn test_clean_outline_reorders_clockwise_rings() {
        let mut ring = square(2.0);
        ring.reverse();
        assert!(signed_area(&ring) < 0.0);

        let outline = clean_outline(&ring).unwrap();
        assert!((signed_area(&outline) - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_clean_outline_rejects_degenerate_rings() {
        assert!(clean_outline(&[]).is_none());
        assert!(clean_outline(&[Vec2::ZERO, Vec2::ONE, Vec2::ZERO]).is_none());
        assert!(clean_outline(&[Vec2::ZERO, Vec2::ONE, Vec2::splat(2.0)]).is_none());
        assert!(clean_outline(&[Vec2::ZERO, Vec2::X, Vec2::NAN]).is_none());
    }

    #[test]
    fn test_triangulate_concave_polygon() {
        // An L-shaped footprint with one reflex corner.
        let outline = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(4.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 4.0),
            Vec2::new(0.0, 4.0),
        ];
        let triangles = triangulate(&outline);

        assert_eq!(triangles.len(), outline.len() - 2);
        assert!((triangulated_area(&outline, &triangles) - 7.0).abs() < 1e-5);
        for [a, b, c] in &triangles {
            let area = signed_area(&[
                outline[*a as usize],
                outline[*b as usize],
                outline[*c as usize],
            ]);
            assert!(area > 0.0, "triangle {a},{b},{c} is not counter-clockwise");
        }
    }

    #[test]
    fn test_extrude_square() {
        let mesh = extrude(&square(4.0), 5.0).unwrap();

        // Two triangles per cap, two per side.
        assert_eq!(mesh.triangle_count(), 2 + 2 + 4 * 2);
        assert_eq!(mesh.vertex_count(), 4 + 4 + 4 * 4);
        assert_eq!(mesh.normals.len(), mesh.positions.len());

        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, Vec3::new(4.0, 4.0, 5.0));
    }

    #[test]
    fn test_extrude_faces_point_outwards() {
        let mesh = extrude(&square(2.0), 1.0).unwrap();
        let centre = Vec3::new(1.0, 1.0, 0.5);

        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]]
                .map(|i| Vec3::from_array(mesh.positions[i as usize]));
            let face_normal = (b - a).cross(c - a);
            let outward = (a + b + c) / 3.0 - centre;
            assert!(face_normal.dot(outward) > 0.0);

            let stored = Vec3::from_array(mesh.normals[tri[0] as usize]);
            assert!(stored.dot(face_normal.normalize()) > 0.99);
        }
    }

    #[test]
    fn test_extrude_negative_depth_goes_down() {
        let mesh = extrude(&square(2.0), -3.0).unwrap();
        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::new(0.0, 0.0, -3.0));
        assert_eq!(bounds.max, Vec3::new(2.0, 2.0, 0.0));

        // Still closed and facing outwards.
        let centre = Vec3::new(1.0, 1.0, -1.5);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]]
                .map(|i| Vec3::from_array(mesh.positions[i as usize]));
            let outward = (a + b + c) / 3.0 - centre;
            assert!((b - a).cross(c - a).dot(outward) > 0.0);
        }
    }

    #[test]
    fn test_small_ring_far_from_origin_is_kept() {
        // A building-sized footprint in degrees, relative and absolute.
        let footprint = |origin: Vec2| {
            [
                Vec2::new(0.0, 0.0),
                Vec2::new(5e-4, 0.0),
                Vec2::new(5e-4, 4e-4),
                Vec2::new(0.0, 4e-4),
            ]
            .map(|p| origin + p)
        };

        let local = clean_outline(&footprint(Vec2::ZERO)).unwrap();
        assert_eq!(local.len(), 4);
        let placed = clean_outline(&footprint(Vec2::new(-111.891, 40.7608))).unwrap();
        assert_eq!(placed.len(), 4);
    }

    #[test]
    fn test_extrude_rejects_bad_input() {
        assert!(extrude(&square(1.0), 0.0).is_none());
        assert!(extrude(&square(1.0), f32::INFINITY).is_none());
        assert!(extrude(&[Vec2::ZERO, Vec2::X], 1.0).is_none());
    }
}
