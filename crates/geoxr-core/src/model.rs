//! Model upload and replacement.
//!
//! The model viewer shows at most one model. A new upload goes through three
//! steps:
//!
//! 1. [`ModelViewerState::begin_upload`] sniffs the extension and decodes the
//!    payload. Unsupported files are rejected here with no state change.
//! 2. The renderer parses the payload (asynchronously, outside the frame
//!    loop) and reports back with either [`ModelViewerState::fail_load`] or
//!    [`ModelViewerState::complete_load`].
//! 3. On success the previous model is detached and every GPU resource it
//!    owned is disposed before the new model is attached, placed and framed.
//!    A failed parse leaves the previous model exactly as it was.
//!
//! [`SceneBackend`] is the seam to the renderer. Texture disposal goes through
//! the fixed list of [`TextureSlot`]s rather than inspecting materials
//! dynamically.

use crate::bounds::{Aabb3, CameraFit, FitSettings, fit_camera, normalize};
use crate::error::LoadError;
use crate::notice::Notifications;

/// Container format of an uploaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// Binary glTF (`.glb`).
    Binary,
    /// JSON glTF (`.gltf`).
    Text,
}

impl ModelFormat {
    /// Pick the format from a file name's extension (case insensitive).
    pub fn from_file_name(file_name: &str) -> Result<Self, LoadError> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".glb") {
            Ok(ModelFormat::Binary)
        } else if lower.ends_with(".gltf") {
            Ok(ModelFormat::Text)
        } else {
            Err(LoadError::UnsupportedFormat {
                file_name: file_name.to_string(),
            })
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ModelFormat::Binary => "glb",
            ModelFormat::Text => "gltf",
        }
    }
}

/// Decoded upload content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelPayload {
    Binary(Vec<u8>),
    Text(String),
}

impl ModelPayload {
    /// Read raw file bytes as the format their name calls for.
    ///
    /// `.glb` files are kept as bytes; `.gltf` files must be UTF-8 text.
    pub fn read(file_name: &str, bytes: Vec<u8>) -> Result<Self, LoadError> {
        match ModelFormat::from_file_name(file_name)? {
            ModelFormat::Binary => Ok(ModelPayload::Binary(bytes)),
            ModelFormat::Text => String::from_utf8(bytes).map(ModelPayload::Text).map_err(|e| {
                LoadError::ParseFailure {
                    file_name: file_name.to_string(),
                    message: format!("not valid UTF-8 text: {e}"),
                }
            }),
        }
    }

    pub fn format(&self) -> ModelFormat {
        match self {
            ModelPayload::Binary(_) => ModelFormat::Binary,
            ModelPayload::Text(_) => ModelFormat::Text,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ModelPayload::Binary(bytes) => bytes.len(),
            ModelPayload::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ModelPayload::Binary(bytes) => bytes,
            ModelPayload::Text(text) => text.into_bytes(),
        }
    }
}

/// An accepted upload waiting to be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    /// Sequence number of this upload, unique per viewer.
    pub id: u64,
    /// Name of the uploaded file.
    pub file_name: String,
    pub payload: ModelPayload,
}

impl PendingUpload {
    /// A collision-free asset name for this upload.
    pub fn asset_name(&self) -> String {
        format!("model-{}.{}", self.id, self.payload.format().extension())
    }
}

/// Texture slots of a PBR material, in disposal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    BaseColor,
    MetallicRoughness,
    Normal,
    Occlusion,
    Emissive,
}

impl TextureSlot {
    /// Every slot a material can own a texture in.
    pub const ALL: [TextureSlot; 5] = [
        TextureSlot::BaseColor,
        TextureSlot::MetallicRoughness,
        TextureSlot::Normal,
        TextureSlot::Occlusion,
        TextureSlot::Emissive,
    ];
}

/// Meshes and materials reachable from a model subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResources<Mesh, Material> {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
}

impl<Mesh, Material> Default for ModelResources<Mesh, Material> {
    fn default() -> Self {
        Self {
            meshes: Vec::new(),
            materials: Vec::new(),
        }
    }
}

/// Counts of what [`dispose_model`] released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposalReport {
    pub meshes: usize,
    pub materials: usize,
    pub textures: usize,
}

/// Renderer operations the model viewer needs.
pub trait SceneBackend {
    /// Handle to a parsed model subtree.
    type Model;
    /// Handle to a geometry buffer.
    type Mesh: PartialEq;
    /// Handle to a material.
    type Material: PartialEq;
    /// Handle to a texture.
    type Texture: PartialEq;

    /// Make the model part of the displayed scene.
    fn attach(&mut self, model: &Self::Model);
    /// Remove the model from the displayed scene.
    fn detach(&mut self, model: &Self::Model);

    /// Meshes and materials owned by the model's subtree.
    fn resources(&self, model: &Self::Model) -> ModelResources<Self::Mesh, Self::Material>;
    /// The texture a material holds in `slot`, if any.
    fn material_texture(&self, material: &Self::Material, slot: TextureSlot)
    -> Option<Self::Texture>;

    fn dispose_mesh(&mut self, mesh: Self::Mesh);
    fn dispose_material(&mut self, material: Self::Material);
    fn dispose_texture(&mut self, texture: Self::Texture);
    /// Drop whatever the model handle itself still keeps alive.
    fn release(&mut self, model: Self::Model);

    /// Model-space bounds of the subtree, or `None` if it has no geometry.
    fn bounds(&self, model: &Self::Model) -> Option<Aabb3>;
    /// Apply a normalizing placement to the model root.
    fn place(&mut self, model: &Self::Model, placement: crate::bounds::Placement);
    /// Vertical field of view of the viewing camera, in radians.
    fn camera_fov(&self) -> f32;
    /// Move the viewing camera.
    fn frame_camera(&mut self, fit: CameraFit);
}

/// Detach `model` and dispose every resource it owns.
///
/// Shared meshes, materials and textures are disposed once.
pub fn dispose_model<B: SceneBackend>(backend: &mut B, model: B::Model) -> DisposalReport {
    let resources = backend.resources(&model);
    backend.detach(&model);

    let mut report = DisposalReport::default();

    let mut textures: Vec<B::Texture> = Vec::new();
    for material in &resources.materials {
        for slot in TextureSlot::ALL {
            if let Some(texture) = backend.material_texture(material, slot)
                && !textures.contains(&texture)
            {
                textures.push(texture);
            }
        }
    }

    for mesh in dedup(resources.meshes) {
        backend.dispose_mesh(mesh);
        report.meshes += 1;
    }
    for texture in textures {
        backend.dispose_texture(texture);
        report.textures += 1;
    }
    for material in dedup(resources.materials) {
        backend.dispose_material(material);
        report.materials += 1;
    }

    backend.release(model);
    report
}

fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

/// The model viewer's load/replace state.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelViewerState<M> {
    current: Option<M>,
    pending: Option<String>,
    next_id: u64,
    /// Placement and framing settings.
    pub settings: FitSettings,
}

impl<M> Default for ModelViewerState<M> {
    fn default() -> Self {
        Self::new(FitSettings::default())
    }
}

impl<M> ModelViewerState<M> {
    pub fn new(settings: FitSettings) -> Self {
        Self {
            current: None,
            pending: None,
            next_id: 0,
            settings,
        }
    }

    /// The model currently displayed.
    pub fn current(&self) -> Option<&M> {
        self.current.as_ref()
    }

    /// Name of the file being parsed, if any.
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Accept an uploaded file for parsing.
    ///
    /// Returns `None` and records a notification when the file is rejected
    /// (unsupported extension, undecodable text, or another load still
    /// running); the viewer state is unchanged in that case.
    pub fn begin_upload(
        &mut self,
        file_name: &str,
        bytes: Vec<u8>,
        notices: &mut Notifications,
    ) -> Option<PendingUpload> {
        if self.pending.is_some() {
            notices.error(&LoadError::LoadInProgress {
                file_name: file_name.to_string(),
            });
            return None;
        }

        let payload = match ModelPayload::read(file_name, bytes) {
            Ok(payload) => payload,
            Err(e) => {
                notices.error(&e);
                return None;
            }
        };

        let id = self.next_id;
        self.next_id += 1;
        self.pending = Some(file_name.to_string());

        tracing::info!(
            file_name,
            format = ?payload.format(),
            bytes = payload.len(),
            "accepted model upload"
        );

        Some(PendingUpload {
            id,
            file_name: file_name.to_string(),
            payload,
        })
    }

    /// Report that the pending upload could not be parsed.
    ///
    /// The displayed model is left untouched.
    pub fn fail_load(&mut self, message: impl Into<String>, notices: &mut Notifications) {
        let file_name = self.pending.take().unwrap_or_default();
        notices.error(&LoadError::ParseFailure {
            file_name,
            message: message.into(),
        });
    }

    /// Replace the displayed model with a freshly parsed one.
    ///
    /// Disposes the previous model, attaches `model`, normalizes its placement
    /// and frames the camera on it. Returns the camera fit, or `None` when the
    /// model has no geometry to frame.
    pub fn complete_load<B>(&mut self, backend: &mut B, model: M) -> Option<CameraFit>
    where
        B: SceneBackend<Model = M>,
    {
        let file_name = self.pending.take();

        if let Some(previous) = self.current.take() {
            let report = dispose_model(backend, previous);
            tracing::debug!(?report, "disposed previous model");
        }

        backend.attach(&model);

        let fit = backend.bounds(&model).map(|bounds| {
            let placement = normalize(&bounds, self.settings.target_size);
            backend.place(&model, placement);

            let placed = bounds.transformed(&placement.matrix());
            let fit = fit_camera(&placed, backend.camera_fov(), self.settings.padding);
            backend.frame_camera(fit);
            fit
        });

        if fit.is_none() {
            tracing::warn!(?file_name, "loaded model has no geometry to frame");
        } else {
            tracing::info!(?file_name, "model loaded");
        }

        self.current = Some(model);
        fit
    }

    /// Remove and dispose the displayed model, if any.
    pub fn clear<B>(&mut self, backend: &mut B) -> Option<DisposalReport>
    where
        B: SceneBackend<Model = M>,
    {
        self.current
            .take()
            .map(|previous| dispose_model(backend, previous))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use glam::Vec3;

    use super::*;
    use crate::bounds::Placement;

    /// Resources a fake model owns: mesh ids, and materials with their
    /// (slot, texture id) pairs.
    #[derive(Clone, Default)]
    struct FakeModelData {
        meshes: Vec<u32>,
        materials: Vec<(u32, Vec<(TextureSlot, u32)>)>,
        bounds: Option<Aabb3>,
    }

    /// Counting stand-in for the renderer.
    #[derive(Default)]
    struct FakeScene {
        models: HashMap<u32, FakeModelData>,
        attached: Vec<u32>,
        live_meshes: Vec<u32>,
        live_materials: Vec<u32>,
        live_textures: Vec<u32>,
        disposed: usize,
        released: Vec<u32>,
        placements: Vec<(u32, Placement)>,
        camera: Option<CameraFit>,
    }

    impl FakeScene {
        /// "Parse" a model: its resources become live GPU handles.
        fn parse(&mut self, id: u32, data: FakeModelData) -> u32 {
            self.live_meshes.extend(&data.meshes);
            for (material, textures) in &data.materials {
                self.live_materials.push(*material);
                self.live_textures.extend(textures.iter().map(|(_, t)| *t));
            }
            self.models.insert(id, data);
            id
        }

        fn live_handles(&self) -> usize {
            self.live_meshes.len() + self.live_materials.len() + self.live_textures.len()
        }
    }

    fn remove(list: &mut Vec<u32>, id: u32) {
        let before = list.len();
        list.retain(|&x| x != id);
        assert!(list.len() < before, "disposed {id} which was not live");
    }

    impl SceneBackend for FakeScene {
        type Model = u32;
        type Mesh = u32;
        type Material = u32;
        type Texture = u32;

        fn attach(&mut self, model: &u32) {
            self.attached.push(*model);
        }

        fn detach(&mut self, model: &u32) {
            self.attached.retain(|m| m != model);
        }

        fn resources(&self, model: &u32) -> ModelResources<u32, u32> {
            let data = &self.models[model];
            ModelResources {
                meshes: data.meshes.clone(),
                materials: data.materials.iter().map(|(m, _)| *m).collect(),
            }
        }

        fn material_texture(&self, material: &u32, slot: TextureSlot) -> Option<u32> {
            self.models
                .values()
                .flat_map(|data| &data.materials)
                .find(|(m, _)| m == material)
                .and_then(|(_, textures)| textures.iter().find(|(s, _)| *s == slot))
                .map(|(_, t)| *t)
        }

        fn dispose_mesh(&mut self, mesh: u32) {
            remove(&mut self.live_meshes, mesh);
            self.disposed += 1;
        }

        fn dispose_material(&mut self, material: u32) {
            remove(&mut self.live_materials, material);
            self.disposed += 1;
        }

        fn dispose_texture(&mut self, texture: u32) {
            remove(&mut self.live_textures, texture);
            self.disposed += 1;
        }

        fn release(&mut self, model: u32) {
            self.released.push(model);
        }

        fn bounds(&self, model: &u32) -> Option<Aabb3> {
            self.models[model].bounds
        }

        fn place(&mut self, model: &u32, placement: Placement) {
            self.placements.push((*model, placement));
        }

        fn camera_fov(&self) -> f32 {
            std::f32::consts::FRAC_PI_2
        }

        fn frame_camera(&mut self, fit: CameraFit) {
            self.camera = Some(fit);
        }
    }

    fn model_a() -> FakeModelData {
        FakeModelData {
            meshes: vec![1, 2, 2],
            materials: vec![
                (10, vec![(TextureSlot::BaseColor, 100), (TextureSlot::Normal, 101)]),
                (11, vec![(TextureSlot::BaseColor, 100), (TextureSlot::Emissive, 102)]),
            ],
            bounds: Some(Aabb3::new(Vec3::ZERO, Vec3::new(3.0, 4.0, 0.0))),
        }
    }

    fn model_b() -> FakeModelData {
        FakeModelData {
            meshes: vec![3],
            materials: vec![(12, vec![(TextureSlot::Occlusion, 103)])],
            bounds: Some(Aabb3::new(Vec3::splat(-1.0), Vec3::splat(1.0))),
        }
    }

    #[test]
    fn test_format_sniffing() {
        assert_eq!(ModelFormat::from_file_name("car.glb"), Ok(ModelFormat::Binary));
        assert_eq!(ModelFormat::from_file_name("CAR.GLTF"), Ok(ModelFormat::Text));
        assert!(matches!(
            ModelFormat::from_file_name("car.obj"),
            Err(LoadError::UnsupportedFormat { .. })
        ));
        assert!(ModelFormat::from_file_name("glb").is_err());
    }

    #[test]
    fn test_payload_reading() {
        let payload = ModelPayload::read("a.gltf", b"{}".to_vec()).unwrap();
        assert_eq!(payload, ModelPayload::Text("{}".to_string()));

        let payload = ModelPayload::read("a.glb", vec![0xff, 0x00]).unwrap();
        assert_eq!(payload.format(), ModelFormat::Binary);
        assert_eq!(payload.into_bytes(), vec![0xff, 0x00]);

        assert!(matches!(
            ModelPayload::read("a.gltf", vec![0xff, 0xfe]),
            Err(LoadError::ParseFailure { .. })
        ));
    }

    #[test]
    fn test_unsupported_upload_changes_nothing() {
        let mut scene = FakeScene::default();
        let mut state = ModelViewerState::default();
        let mut notices = Notifications::default();

        let a = scene.parse(1, model_a());
        state.begin_upload("a.glb", vec![1], &mut notices).unwrap();
        state.complete_load(&mut scene, a);

        let before = state.clone();
        let live_before = scene.live_handles();

        assert!(state.begin_upload("notes.txt", vec![1, 2, 3], &mut notices).is_none());

        assert_eq!(state, before);
        assert_eq!(scene.live_handles(), live_before);
        assert_eq!(notices.len(), 1);
        assert!(notices.entries()[0].message.contains("notes.txt"));
    }

    #[test]
    fn test_replacing_disposes_previous_model() {
        let mut scene = FakeScene::default();
        let mut state = ModelViewerState::default();
        let mut notices = Notifications::default();

        state.begin_upload("a.glb", vec![0], &mut notices).unwrap();
        let a = scene.parse(1, model_a());
        state.complete_load(&mut scene, a);
        assert_eq!(scene.attached, vec![1]);

        state.begin_upload("b.gltf", b"{}".to_vec(), &mut notices).unwrap();
        let b = scene.parse(2, model_b());
        state.complete_load(&mut scene, b);

        // Exactly one model left, and nothing of model A is still alive.
        assert_eq!(scene.attached, vec![2]);
        assert_eq!(state.current(), Some(&2));
        assert_eq!(scene.released, vec![1]);
        assert_eq!(scene.live_meshes, vec![3]);
        assert_eq!(scene.live_materials, vec![12]);
        assert_eq!(scene.live_textures, vec![103]);
        // Meshes 1, 2; materials 10, 11; textures 100, 101, 102.
        assert_eq!(scene.disposed, 7);
        assert!(notices.is_empty());
    }

    #[test]
    fn test_failed_parse_keeps_previous_model() {
        let mut scene = FakeScene::default();
        let mut state = ModelViewerState::default();
        let mut notices = Notifications::default();

        state.begin_upload("a.glb", vec![0], &mut notices).unwrap();
        let a = scene.parse(1, model_a());
        state.complete_load(&mut scene, a);
        let live_before = scene.live_handles();

        state.begin_upload("broken.glb", vec![0], &mut notices).unwrap();
        assert!(state.is_loading());
        state.fail_load("unexpected end of file", &mut notices);

        assert!(!state.is_loading());
        assert_eq!(state.current(), Some(&1));
        assert_eq!(scene.attached, vec![1]);
        assert_eq!(scene.live_handles(), live_before);
        assert_eq!(scene.disposed, 0);
        assert_eq!(notices.len(), 1);
        assert!(notices.entries()[0].message.contains("broken.glb"));
    }

    #[test]
    fn test_second_upload_waits_for_first() {
        let mut state: ModelViewerState<u32> = ModelViewerState::default();
        let mut notices = Notifications::default();

        let first = state.begin_upload("a.glb", vec![0], &mut notices).unwrap();
        assert!(state.begin_upload("b.glb", vec![0], &mut notices).is_none());
        assert_eq!(state.pending(), Some("a.glb"));
        assert_eq!(notices.len(), 1);

        let mut scene = FakeScene::default();
        let a = scene.parse(1, model_a());
        state.complete_load(&mut scene, a);

        let second = state.begin_upload("b.glb", vec![0], &mut notices).unwrap();
        assert_ne!(first.asset_name(), second.asset_name());
    }

    #[test]
    fn test_model_is_normalized_and_framed() {
        let mut scene = FakeScene::default();
        let mut state = ModelViewerState::default();
        let mut notices = Notifications::default();

        state.begin_upload("a.glb", vec![0], &mut notices).unwrap();
        let a = scene.parse(1, model_a());
        let fit = state.complete_load(&mut scene, a).unwrap();

        // Bounds 3x4x0 have a diagonal of 5, scaled to 10.
        let (_, placement) = scene.placements[0];
        assert!((placement.scale - 2.0).abs() < 1e-6);
        assert!((placement.apply(Vec3::new(1.5, 2.0, 0.0))).length() < 1e-5);

        // Placed box is 6x8; a 90° fov needs distance 4, padded by 1.2.
        assert!((fit.distance - 4.8).abs() < 1e-4);
        assert_eq!(scene.camera, Some(fit));
    }

    #[test]
    fn test_model_without_geometry_is_kept_unframed() {
        let mut scene = FakeScene::default();
        let mut state = ModelViewerState::default();
        let mut notices = Notifications::default();

        state.begin_upload("empty.gltf", b"{}".to_vec(), &mut notices).unwrap();
        let empty = scene.parse(
            5,
            FakeModelData {
                bounds: None,
                ..FakeModelData::default()
            },
        );
        assert!(state.complete_load(&mut scene, empty).is_none());
        assert_eq!(scene.attached, vec![5]);
        assert!(scene.camera.is_none());

        let report = state.clear(&mut scene).unwrap();
        assert_eq!(report, DisposalReport::default());
        assert!(scene.attached.is_empty());
    }
}
