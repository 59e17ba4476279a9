//! Conversion of GeoJSON features to 3D primitives.
//!
//! GeoJSON `(x, y)` maps to scene `(x, up, -y)`: x stays horizontal, y becomes
//! depth with its sign flipped, and heights go up.

use std::f32::consts::FRAC_PI_2;

use glam::{DVec2, Quat, Vec2, Vec3};
use rand::Rng;

use crate::bounds::Aabb3;
use crate::extrude::{ExtrudedMesh, extrude};
use crate::geojson::{Feature, FeatureCollection, Geometry, Ring};

/// Extrusion depth for polygons without a usable `height`.
pub const DEFAULT_POLYGON_HEIGHT: f64 = 5.0;
/// Sphere elevation for points without a usable `height`.
pub const DEFAULT_POINT_HEIGHT: f64 = 1.0;
/// Elevation of every line vertex.
pub const LINE_ELEVATION: f32 = 0.5;
/// Radius of point spheres.
pub const POINT_RADIUS: f32 = 1.5;
/// Sphere tessellation (sectors and stacks).
pub const POINT_SEGMENTS: u32 = 16;
/// Colour of point spheres.
pub const POINT_COLOR: Rgb = Rgb(0xff_66_00);
/// Colour of lines.
pub const LINE_COLOR: Rgb = Rgb(0x00_ff_ff);

/// A packed `0xRRGGBB` sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u32);

impl Rgb {
    /// A uniformly random colour.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.random_range(0..=0xff_ff_ff))
    }

    /// Channels as bytes.
    pub fn to_bytes(self) -> [u8; 3] {
        let [_, r, g, b] = self.0.to_be_bytes();
        [r, g, b]
    }

}

/// Map a GeoJSON position and an elevation to scene space.
#[allow(clippy::cast_possible_truncation)]
pub fn to_scene(position: DVec2, up: f64) -> Vec3 {
    Vec3::new(position.x as f32, up as f32, -position.y as f32)
}

/// Rotation that turns an outline-space extrusion (along +Z) upright.
///
/// Maps `(x, y, z)` to `(x, z, -y)`, which keeps the footprint consistent
/// with [`to_scene`].
pub fn extrusion_rotation() -> Quat {
    Quat::from_rotation_x(-FRAC_PI_2)
}

/// An extruded polygon footprint.
///
/// The mesh is built relative to the ring's first vertex, so footprints given
/// in degrees far from `(0, 0)` keep their shape in `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrudedPolygon {
    /// Outer ring in GeoJSON `(x, y)`, as read from the document.
    pub footprint: Vec<DVec2>,
    /// Scene position of the ring's first vertex at ground level.
    pub origin: Vec3,
    /// Extrusion height; negative heights extrude downwards.
    pub depth: f32,
    /// Mesh in outline space relative to `origin`; apply
    /// [`extrusion_rotation`] and then translate by `origin` to place it.
    pub mesh: ExtrudedMesh,
    pub color: Rgb,
}

impl ExtrudedPolygon {
    /// Bounds in scene space.
    pub fn scene_bounds(&self) -> Option<Aabb3> {
        let rotation = extrusion_rotation();
        Aabb3::from_points(
            self.mesh
                .positions
                .iter()
                .map(|p| self.origin + rotation * Vec3::from_array(*p)),
        )
    }
}

/// A sphere marking a point feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMarker {
    pub center: Vec3,
    pub radius: f32,
    pub color: Rgb,
}

/// An open polyline for a line feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub vertices: Vec<Vec3>,
    pub color: Rgb,
}

/// A renderable shape produced from one feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Extruded(ExtrudedPolygon),
    Sphere(PointMarker),
    Polyline(Polyline),
}

/// Project every feature of a collection.
pub fn project_collection<R: Rng + ?Sized>(
    collection: &FeatureCollection,
    rng: &mut R,
) -> Vec<Primitive> {
    collection
        .features
        .iter()
        .flat_map(|feature| project_feature(feature, rng))
        .collect()
}

/// Project one feature.
///
/// Polygons produce one primitive per polygon (a `MultiPolygon` may produce
/// several). Degenerate shapes produce nothing.
pub fn project_feature<R: Rng + ?Sized>(feature: &Feature, rng: &mut R) -> Vec<Primitive> {
    let primitives = project_geometry(feature, rng);
    tracing::trace!(
        kind = feature.geometry.type_name(),
        primitives = primitives.len(),
        "projected feature"
    );
    primitives
}

fn project_geometry<R: Rng + ?Sized>(feature: &Feature, rng: &mut R) -> Vec<Primitive> {
    match &feature.geometry {
        Geometry::Polygon(rings) => {
            let height = feature.properties.height_or(DEFAULT_POLYGON_HEIGHT);
            project_polygon(rings, height, rng)
                .map(Primitive::Extruded)
                .into_iter()
                .collect()
        }
        Geometry::MultiPolygon(polygons) => {
            let height = feature.properties.height_or(DEFAULT_POLYGON_HEIGHT);
            polygons
                .iter()
                .filter_map(|rings| project_polygon(rings, height, rng))
                .map(Primitive::Extruded)
                .collect()
        }
        Geometry::Point(position) => {
            let height = feature.properties.height_or(DEFAULT_POINT_HEIGHT);
            vec![Primitive::Sphere(PointMarker {
                center: to_scene(*position, height),
                radius: POINT_RADIUS,
                color: POINT_COLOR,
            })]
        }
        Geometry::LineString(positions) => project_line(positions)
            .map(Primitive::Polyline)
            .into_iter()
            .collect(),
    }
}

/// Extrude the outer ring of a polygon. Inner rings (holes) are ignored.
#[allow(clippy::cast_possible_truncation)]
fn project_polygon<R: Rng + ?Sized>(
    rings: &[Ring],
    height: f64,
    rng: &mut R,
) -> Option<ExtrudedPolygon> {
    let outer = rings.first()?;
    let anchor = *outer.first()?;
    // Narrow to f32 only once the ring sits next to the origin.
    let outline: Vec<Vec2> = outer.iter().map(|p| (*p - anchor).as_vec2()).collect();
    let depth = height as f32;

    let Some(mesh) = extrude(&outline, depth) else {
        tracing::debug!(vertices = outer.len(), "skipping degenerate polygon ring");
        return None;
    };

    Some(ExtrudedPolygon {
        footprint: outer.clone(),
        origin: to_scene(anchor, 0.0),
        depth,
        mesh,
        color: Rgb::random(rng),
    })
}

fn project_line(positions: &[DVec2]) -> Option<Polyline> {
    if positions.len() < 2 {
        tracing::debug!(vertices = positions.len(), "skipping degenerate line");
        return None;
    }

    Some(Polyline {
        vertices: positions
            .iter()
            .map(|p| to_scene(*p, f64::from(LINE_ELEVATION)))
            .collect(),
        color: LINE_COLOR,
    })
}
