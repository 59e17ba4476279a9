//! GeoJSON VR scene.
//!
//! Each uploaded document is parsed in a background task and becomes one
//! layer entity holding the primitives of its features. Layers live in world space; the camera rides inside the user
//! anchor, so two-handed manipulation moves the viewer rather than the data.

use std::path::Path;

use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use geoxr_core::bounds::Aabb3;
use geoxr_core::extrude::ExtrudedMesh;
use geoxr_core::geojson::parse_document;
use geoxr_core::projection::{
    ExtrudedPolygon, POINT_SEGMENTS, PointMarker, Polyline, Primitive, Rgb, extrusion_rotation,
    project_collection,
};

use crate::async_runtime::TaskSpawner;
use crate::model_viewer::CAMERA_FOV;
use crate::ui::Notices;
use crate::upload::{UploadChannel, UploadKind, UploadedFile};
use crate::xr_input::{UserAnchorRoot, anchor_transform};

/// Background colour of the VR scene.
const BACKGROUND: Color = Color::srgb_u8(0x20, 0x20, 0x20);

/// Eye height of the camera inside the user anchor.
const EYE_POSITION: Vec3 = Vec3::new(0.0, 1.6, 3.0);

/// Plugin for the GeoJSON scene.
pub struct GeoJsonScenePlugin;

impl Plugin for GeoJsonScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SceneStats>()
            .init_resource::<ParsedLayers>()
            .insert_resource(ClearColor(BACKGROUND))
            .add_systems(Startup, setup_vr_scene)
            .add_systems(Update, (parse_geojson_uploads, spawn_parsed_layers).chain());
    }
}

/// Running totals over everything loaded so far.
#[derive(Resource, Debug, Default, Clone, PartialEq, Eq)]
pub struct SceneStats {
    pub files: usize,
    pub features: usize,
    /// Features that were dropped while decoding.
    pub skipped_features: usize,
    pub extruded: usize,
    pub points: usize,
    pub lines: usize,
    /// Triangles across all extruded meshes.
    pub triangles: usize,
}

impl SceneStats {
    fn record(&mut self, features: usize, skipped: usize, primitives: &[Primitive]) {
        self.files += 1;
        self.features += features;
        self.skipped_features += skipped;
        for primitive in primitives {
            match primitive {
                Primitive::Extruded(polygon) => {
                    self.extruded += 1;
                    self.triangles += polygon.mesh.triangle_count();
                }
                Primitive::Sphere(_) => self.points += 1,
                Primitive::Polyline(_) => self.lines += 1,
            }
        }
    }
}

/// One document, decoded and projected in a background task.
#[derive(Debug)]
pub struct ParsedLayer {
    pub name: String,
    pub features: usize,
    pub skipped: usize,
    pub primitives: Vec<Primitive>,
}

impl ParsedLayer {
    /// Scene-space bounds of the extruded polygons.
    fn extruded_bounds(&self) -> Option<Aabb3> {
        self.primitives
            .iter()
            .filter_map(|primitive| match primitive {
                Primitive::Extruded(polygon) => polygon.scene_bounds(),
                _ => None,
            })
            .reduce(|a, b| a.union(&b))
    }
}

/// Decode, parse and project one uploaded document.
///
/// Errors are ready to show to the user.
pub fn parse_layer(file: UploadedFile) -> Result<ParsedLayer, String> {
    let text = String::from_utf8(file.bytes)
        .map_err(|e| format!("{}: not UTF-8 text: {e}", file.name))?;
    let collection = parse_document(&text).map_err(|e| format!("{}: {e}", file.name))?;
    let primitives = project_collection(&collection, &mut rand::rng());
    Ok(ParsedLayer {
        name: file.name,
        features: collection.features.len(),
        skipped: collection.skipped,
        primitives,
    })
}

/// Channel carrying parsed documents from background tasks to the frame loop.
#[derive(Resource)]
pub struct ParsedLayers {
    tx: async_channel::Sender<Result<ParsedLayer, String>>,
    rx: async_channel::Receiver<Result<ParsedLayer, String>>,
}

impl Default for ParsedLayers {
    fn default() -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self { tx, rx }
    }
}

impl ParsedLayers {
    pub fn sender(&self) -> async_channel::Sender<Result<ParsedLayer, String>> {
        self.tx.clone()
    }

    fn drain(&self) -> Vec<Result<ParsedLayer, String>> {
        std::iter::from_fn(|| self.rx.try_recv().ok()).collect()
    }
}

/// Whether an upload should be parsed as GeoJSON.
fn is_geojson(file: &UploadedFile) -> bool {
    UploadKind::GeoJson.matches(Path::new(&file.name))
}

/// Marker for the root entity of one loaded document.
#[derive(Component)]
pub struct GeoJsonLayer;

/// Spawn the user anchor with its camera, and the lights.
fn setup_vr_scene(mut commands: Commands) {
    commands
        .spawn((
            Name::new("User anchor"),
            UserAnchorRoot,
            anchor_transform(&default()),
            Visibility::default(),
        ))
        .with_children(|anchor| {
            anchor.spawn((
                Camera3d::default(),
                Projection::Perspective(PerspectiveProjection {
                    fov: CAMERA_FOV,
                    near: 0.1,
                    far: 1000.0,
                    ..Default::default()
                }),
                Transform::from_translation(EYE_POSITION),
            ));
        });

    // Sky and ground light, a white key from above and a dim grey fill from below.
    commands.spawn((
        DirectionalLight {
            color: Color::WHITE,
            illuminance: 6_000.0,
            ..default()
        },
        Transform::from_xyz(0.0, 20.0, 0.0).looking_at(Vec3::ZERO, Vec3::Z),
    ));
    commands.spawn((
        DirectionalLight {
            color: Color::srgb_u8(0x44, 0x44, 0x44),
            illuminance: 6_000.0,
            ..default()
        },
        Transform::from_xyz(0.0, -20.0, 0.0).looking_at(Vec3::ZERO, Vec3::Z),
    ));

    tracing::info!("GeoJSON scene ready - open .geojson files to add layers");
}

/// Hand each uploaded `.geojson` file to a background task for parsing.
#[allow(clippy::needless_pass_by_value)]
fn parse_geojson_uploads(
    channel: Res<UploadChannel>,
    parsed: Res<ParsedLayers>,
    spawner: TaskSpawner,
) {
    for file in channel.drain() {
        if !is_geojson(&file) {
            tracing::debug!(name = %file.name, "ignoring non-GeoJSON upload");
            continue;
        }
        let tx = parsed.sender();
        spawner.spawn(async move {
            let layer = parse_layer(file);
            if tx.send(layer).await.is_err() {
                tracing::warn!("Layer channel closed; dropping parsed document");
            }
        });
    }
}

/// Build meshes for parsed documents and spawn a layer for each.
///
/// Documents without primitives leave the scene untouched.
#[allow(clippy::needless_pass_by_value)]
fn spawn_parsed_layers(
    mut commands: Commands,
    parsed: Res<ParsedLayers>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut stats: ResMut<SceneStats>,
    mut notices: ResMut<Notices>,
) {
    for result in parsed.drain() {
        let layer = match result {
            Ok(layer) => layer,
            Err(message) => {
                notices.error(&message);
                continue;
            }
        };

        stats.record(layer.features, layer.skipped, &layer.primitives);
        tracing::info!(
            "Loaded {}: {} features ({} skipped), {} primitives",
            layer.name,
            layer.features,
            layer.skipped,
            layer.primitives.len()
        );
        if let Some(bounds) = layer.extruded_bounds() {
            tracing::debug!(min = ?bounds.min, max = ?bounds.max, "extruded extent");
        }
        if layer.primitives.is_empty() {
            notices.info(format!("{} has no drawable features", layer.name));
            continue;
        }

        commands
            .spawn((
                Name::new(layer.name),
                GeoJsonLayer,
                Transform::default(),
                Visibility::default(),
            ))
            .with_children(|parent| {
                for primitive in layer.primitives {
                    match primitive {
                        Primitive::Extruded(polygon) => {
                            parent.spawn(extruded_bundle(&polygon, &mut meshes, &mut materials));
                        }
                        Primitive::Sphere(point) => {
                            parent.spawn(sphere_bundle(&point, &mut meshes, &mut materials));
                        }
                        Primitive::Polyline(line) => {
                            parent.spawn(polyline_bundle(&line, &mut meshes, &mut materials));
                        }
                    }
                }
            });
    }
}

fn color(rgb: Rgb) -> Color {
    let [r, g, b] = rgb.to_bytes();
    Color::srgb_u8(r, g, b)
}

fn extruded_bundle(
    polygon: &ExtrudedPolygon,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) -> impl Bundle {
    (
        Mesh3d(meshes.add(extruded_mesh(&polygon.mesh))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: color(polygon.color),
            ..default()
        })),
        Transform::from_translation(polygon.origin).with_rotation(extrusion_rotation()),
    )
}

fn sphere_bundle(
    point: &PointMarker,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) -> impl Bundle {
    let mesh = Sphere::new(point.radius)
        .mesh()
        .uv(POINT_SEGMENTS, POINT_SEGMENTS);
    (
        Mesh3d(meshes.add(mesh)),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: color(point.color),
            ..default()
        })),
        Transform::from_translation(point.center),
    )
}

fn polyline_bundle(
    line: &Polyline,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) -> impl Bundle {
    (
        Mesh3d(meshes.add(polyline_mesh(&line.vertices))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: color(line.color),
            unlit: true,
            ..default()
        })),
        Transform::default(),
    )
}

/// Convert an extruded outline to a Bevy triangle mesh.
pub fn extruded_mesh(extruded: &ExtrudedMesh) -> Mesh {
    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, extruded.positions.clone());
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, extruded.normals.clone());
    mesh.insert_indices(Indices::U32(extruded.indices.clone()));
    mesh
}

/// Build a line strip through the given vertices.
pub fn polyline_mesh(vertices: &[Vec3]) -> Mesh {
    let positions: Vec<[f32; 3]> = vertices.iter().map(|v| v.to_array()).collect();
    let mut mesh = Mesh::new(PrimitiveTopology::LineStrip, RenderAssetUsages::default());
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh
}
