//! Single-model glTF viewer.
//!
//! Uploads are written into the in-memory `upload://` asset source and loaded
//! through Bevy's glTF loader. The scene is spawned hidden; once its instance
//! is ready the previous model is disposed and the new one is shown,
//! normalized and framed by the orbit camera.

use bevy::asset::RecursiveDependencyLoadState;
use bevy::ecs::message::MessageReader;
use bevy::ecs::system::SystemParam;
use bevy::gltf::GltfAssetLabel;
use bevy::mesh::VertexAttributeValues;
use bevy::prelude::*;
use bevy::scene::SceneInstanceReady;
use geoxr_core::bounds::{Aabb3, CameraFit, FitSettings, Placement};
use geoxr_core::model::{ModelResources, ModelViewerState, SceneBackend, TextureSlot};

use crate::launch_params::LaunchParams;
use crate::orbit::{OrbitCamera, OrbitCameraPlugin};
use crate::ui::Notices;
use crate::upload::{UploadAssets, UploadChannel};

/// Vertical field of view of the viewing camera (75°).
pub const CAMERA_FOV: f32 = 75.0 * std::f32::consts::PI / 180.0;

/// Background colour of the model viewer.
const BACKGROUND: Color = Color::srgb_u8(0xdd, 0xdd, 0xdd);

/// Plugin for the model viewer.
pub struct ModelViewerPlugin;

impl Plugin for ModelViewerPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(OrbitCameraPlugin)
            .init_resource::<ModelViewer>()
            .init_resource::<PendingModel>()
            .add_message::<ClearModel>()
            .insert_resource(ClearColor(BACKGROUND))
            .add_systems(Startup, setup_model_scene)
            .add_systems(Update, (receive_model_uploads, poll_model_load).chain())
            .add_systems(Update, clear_model)
            .add_observer(on_model_scene_ready);
    }
}

/// A model that has been spawned into the world.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModel {
    /// Root entity of the instanced scene.
    pub root: Entity,
    pub scene: Handle<Scene>,
    /// Name of the backing file in the upload store.
    pub asset_name: String,
    /// Name of the file as the user picked it.
    pub file_name: String,
}

/// Request to remove the displayed model.
#[derive(Message, Debug, Clone, Copy)]
pub struct ClearModel;

/// The model viewer's load/replace state.
#[derive(Resource, Deref, DerefMut)]
pub struct ModelViewer(pub ModelViewerState<LoadedModel>);

impl FromWorld for ModelViewer {
    fn from_world(world: &mut World) -> Self {
        let settings = world
            .get_resource::<LaunchParams>()
            .map_or_else(FitSettings::default, |params| FitSettings {
                target_size: params.target_size,
                padding: params.padding,
            });
        Self(ModelViewerState::new(settings))
    }
}

/// An upload that is being parsed or instanced.
#[derive(Debug)]
struct PendingLoad {
    asset_name: String,
    file_name: String,
    scene: Handle<Scene>,
    /// Set once the scene asset is loaded and its root spawned.
    root: Option<Entity>,
}

#[derive(Resource, Default)]
struct PendingModel(Option<PendingLoad>);

/// Marker for the root entity of a model.
#[derive(Component)]
pub struct ModelRoot;

/// Set up the camera and lights.
fn setup_model_scene(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: CAMERA_FOV,
            near: 0.1,
            far: 1000.0,
            ..Default::default()
        }),
        OrbitCamera::default(),
        Transform::default(),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(10.0, 10.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    // Soft fill from the opposite side so unlit faces stay readable.
    commands.spawn((
        DirectionalLight {
            illuminance: 3_000.0,
            ..default()
        },
        Transform::from_xyz(-10.0, 5.0, -10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    tracing::info!("Model viewer ready - open or drop a .gltf/.glb file");
}

/// Accept uploaded files and start loading them.
#[allow(clippy::needless_pass_by_value)]
fn receive_model_uploads(
    channel: Res<UploadChannel>,
    uploads: Res<UploadAssets>,
    asset_server: Res<AssetServer>,
    mut viewer: ResMut<ModelViewer>,
    mut pending: ResMut<PendingModel>,
    mut notices: ResMut<Notices>,
) {
    for file in channel.drain() {
        let Some(upload) = viewer.begin_upload(&file.name, file.bytes, &mut notices) else {
            continue;
        };

        let asset_name = upload.asset_name();
        uploads.insert(&asset_name, upload.payload.into_bytes());
        let scene = asset_server
            .load(GltfAssetLabel::Scene(0).from_asset(UploadAssets::asset_path(&asset_name)));

        tracing::info!("Loading {} as {}", upload.file_name, asset_name);
        pending.0 = Some(PendingLoad {
            asset_name,
            file_name: upload.file_name,
            scene,
            root: None,
        });
    }
}

/// Spawn the scene once parsed, or report the parse failure.
#[allow(clippy::needless_pass_by_value)]
fn poll_model_load(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    uploads: Res<UploadAssets>,
    mut viewer: ResMut<ModelViewer>,
    mut pending: ResMut<PendingModel>,
    mut notices: ResMut<Notices>,
) {
    let Some(load) = pending.0.as_mut() else {
        return;
    };
    if load.root.is_some() {
        return;
    }

    match asset_server.get_recursive_dependency_load_state(&load.scene) {
        Some(RecursiveDependencyLoadState::Loaded) => {
            // Hidden until the previous model has been disposed.
            let root = commands
                .spawn((
                    ModelRoot,
                    Name::new(load.file_name.clone()),
                    SceneRoot(load.scene.clone()),
                    Transform::default(),
                    Visibility::Hidden,
                ))
                .id();
            load.root = Some(root);
        }
        Some(RecursiveDependencyLoadState::Failed(error)) => {
            uploads.remove(&load.asset_name);
            pending.0 = None;
            viewer.fail_load(error.to_string(), &mut notices);
        }
        _ => {}
    }
}

/// Swap in a model whose scene has finished instancing.
fn on_model_scene_ready(
    trigger: On<SceneInstanceReady>,
    mut pending: ResMut<PendingModel>,
    mut viewer: ResMut<ModelViewer>,
    mut notices: ResMut<Notices>,
    mut scene: BevyScene,
) {
    let Some(load) = pending.0.as_ref() else {
        return;
    };
    if load.root != Some(trigger.event_target()) {
        return;
    }
    let Some(load) = pending.0.take() else {
        return;
    };
    let Some(root) = load.root else {
        return;
    };

    let model = LoadedModel {
        root,
        scene: load.scene,
        asset_name: load.asset_name,
        file_name: load.file_name,
    };
    match viewer.complete_load(&mut scene, model) {
        Some(fit) => tracing::info!(
            "Model framed at distance {:.2} around {:?}",
            fit.distance,
            fit.target
        ),
        None => notices.info("The model has no geometry to frame"),
    }
}

fn clear_model(
    mut requests: MessageReader<ClearModel>,
    mut viewer: ResMut<ModelViewer>,
    mut scene: BevyScene,
) {
    if requests.read().count() == 0 {
        return;
    }
    if let Some(report) = viewer.clear(&mut scene) {
        tracing::info!(
            "Model cleared: disposed {} meshes, {} materials, {} textures",
            report.meshes,
            report.materials,
            report.textures
        );
    }
}

/// Bevy implementation of the renderer operations the model viewer needs.
#[derive(SystemParam)]
pub struct BevyScene<'w, 's> {
    commands: Commands<'w, 's>,
    children: Query<'w, 's, &'static Children>,
    parents: Query<'w, 's, &'static ChildOf>,
    nodes: Query<
        'w,
        's,
        (
            Option<&'static Transform>,
            Option<&'static Mesh3d>,
            Option<&'static MeshMaterial3d<StandardMaterial>>,
        ),
    >,
    cameras: Query<'w, 's, (&'static mut OrbitCamera, &'static Projection)>,
    meshes: ResMut<'w, Assets<Mesh>>,
    materials: ResMut<'w, Assets<StandardMaterial>>,
    images: ResMut<'w, Assets<Image>>,
    scenes: ResMut<'w, Assets<Scene>>,
    uploads: Res<'w, UploadAssets>,
}

impl BevyScene<'_, '_> {
    /// The root and all of its descendants.
    fn subtree(&self, root: Entity) -> impl Iterator<Item = Entity> + '_ {
        std::iter::once(root).chain(self.children.iter_descendants(root))
    }

    /// Transform from `entity`'s space to the root's local space.
    ///
    /// Composed from local transforms, since global transforms are not
    /// propagated yet when a scene instance becomes ready.
    fn matrix_to_root(&self, root: Entity, entity: Entity) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = entity;
        while current != root {
            if let Ok((Some(transform), _, _)) = self.nodes.get(current) {
                matrix = local_matrix(transform) * matrix;
            }
            let Ok(child_of) = self.parents.get(current) else {
                break;
            };
            current = child_of.parent();
        }
        matrix
    }

    fn mesh_bounds(&self, mesh: &Mesh3d, matrix: Mat4) -> Option<Aabb3> {
        let positions = self
            .meshes
            .get(&mesh.0)?
            .attribute(Mesh::ATTRIBUTE_POSITION)
            .and_then(VertexAttributeValues::as_float3)?;
        Aabb3::from_points(
            positions
                .iter()
                .map(|p| matrix.transform_point3(Vec3::from_array(*p))),
        )
    }
}

fn local_matrix(transform: &Transform) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        transform.scale,
        transform.rotation,
        transform.translation,
    )
}

impl SceneBackend for BevyScene<'_, '_> {
    type Model = LoadedModel;
    type Mesh = AssetId<Mesh>;
    type Material = AssetId<StandardMaterial>;
    type Texture = AssetId<Image>;

    fn attach(&mut self, model: &LoadedModel) {
        self.commands.entity(model.root).insert(Visibility::Inherited);
    }

    fn detach(&mut self, model: &LoadedModel) {
        if let Ok(mut entity) = self.commands.get_entity(model.root) {
            entity.despawn();
        }
    }

    fn resources(
        &self,
        model: &LoadedModel,
    ) -> ModelResources<AssetId<Mesh>, AssetId<StandardMaterial>> {
        let mut resources = ModelResources::default();
        for entity in self.subtree(model.root) {
            let Ok((_, mesh, material)) = self.nodes.get(entity) else {
                continue;
            };
            if let Some(mesh) = mesh {
                resources.meshes.push(mesh.0.id());
            }
            if let Some(material) = material {
                resources.materials.push(material.0.id());
            }
        }
        resources
    }

    fn material_texture(
        &self,
        material: &AssetId<StandardMaterial>,
        slot: TextureSlot,
    ) -> Option<AssetId<Image>> {
        let material = self.materials.get(*material)?;
        let texture = match slot {
            TextureSlot::BaseColor => &material.base_color_texture,
            TextureSlot::MetallicRoughness => &material.metallic_roughness_texture,
            TextureSlot::Normal => &material.normal_map_texture,
            TextureSlot::Occlusion => &material.occlusion_texture,
            TextureSlot::Emissive => &material.emissive_texture,
        };
        texture.as_ref().map(Handle::id)
    }

    fn dispose_mesh(&mut self, mesh: AssetId<Mesh>) {
        self.meshes.remove(mesh);
    }

    fn dispose_material(&mut self, material: AssetId<StandardMaterial>) {
        self.materials.remove(material);
    }

    fn dispose_texture(&mut self, texture: AssetId<Image>) {
        self.images.remove(texture);
    }

    fn release(&mut self, model: LoadedModel) {
        self.scenes.remove(&model.scene);
        self.uploads.remove(&model.asset_name);
    }

    fn bounds(&self, model: &LoadedModel) -> Option<Aabb3> {
        self.subtree(model.root)
            .filter_map(|entity| {
                let (_, mesh, _) = self.nodes.get(entity).ok()?;
                self.mesh_bounds(mesh?, self.matrix_to_root(model.root, entity))
            })
            .reduce(|a, b| a.union(&b))
    }

    fn place(&mut self, model: &LoadedModel, placement: Placement) {
        self.commands.entity(model.root).insert(
            Transform::from_translation(placement.translation)
                .with_scale(Vec3::splat(placement.scale)),
        );
    }

    fn camera_fov(&self) -> f32 {
        match self.cameras.single() {
            Ok((_, Projection::Perspective(perspective))) => perspective.fov,
            _ => CAMERA_FOV,
        }
    }

    fn frame_camera(&mut self, fit: CameraFit) {
        for (mut orbit, _) in &mut self.cameras {
            orbit.frame(fit.target, fit.distance);
        }
    }
}
