//! File intake for both viewers.
//!
//! Files reach the app from four places, all funnelled into one
//! [`UploadChannel`]:
//! - `rfd` file and folder dialogs opened from the UI
//! - files dropped onto the window (native)
//! - paths given on the command line (native)
//! - `upload_file` calls from the host page (WASM)
//!
//! Reads happen in background tasks and never block the frame loop.

use std::path::{Path, PathBuf};

use bevy::asset::io::AssetSourceBuilder;
use bevy::asset::io::memory::{Dir, MemoryAssetReader};
#[cfg(not(target_family = "wasm"))]
use bevy::ecs::message::MessageReader;
use bevy::prelude::*;
#[cfg(not(target_family = "wasm"))]
use bevy::window::FileDragAndDrop;

use crate::async_runtime::TaskSpawner;
use crate::launch_params::LaunchParams;

/// Asset source name under which uploaded models are served.
pub const UPLOAD_SOURCE: &str = "upload";

/// A file read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// File name without directories.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Read a file from disk, keeping only its file name.
    #[cfg(not(target_family = "wasm"))]
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            name: file_name(path),
            bytes: tokio::fs::read(path).await?,
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// What a viewer accepts, used for dialog filters and folder scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Model,
    GeoJson,
}

impl UploadKind {
    pub fn filter_name(self) -> &'static str {
        match self {
            UploadKind::Model => "glTF model",
            UploadKind::GeoJson => "GeoJSON",
        }
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            UploadKind::Model => &["gltf", "glb"],
            UploadKind::GeoJson => &["geojson"],
        }
    }

    /// Whether a path has one of this kind's extensions (case insensitive).
    pub fn matches(self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions()
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
    }
}

/// Channel carrying uploaded files from background tasks to the frame loop.
#[derive(Resource)]
pub struct UploadChannel {
    tx: async_channel::Sender<UploadedFile>,
    rx: async_channel::Receiver<UploadedFile>,
}

impl Default for UploadChannel {
    fn default() -> Self {
        #[cfg(target_family = "wasm")]
        let (tx, rx) = host::channel();
        #[cfg(not(target_family = "wasm"))]
        let (tx, rx) = async_channel::unbounded();
        Self { tx, rx }
    }
}

impl UploadChannel {
    pub fn sender(&self) -> async_channel::Sender<UploadedFile> {
        self.tx.clone()
    }

    /// Take every file that has arrived since the last call.
    pub fn drain(&self) -> Vec<UploadedFile> {
        std::iter::from_fn(|| self.rx.try_recv().ok()).collect()
    }
}

/// Plugin wiring file intake for one kind of viewer.
pub struct UploadPlugin {
    pub kind: UploadKind,
}

/// The kind of file the running viewer accepts.
#[derive(Resource, Debug, Clone, Copy)]
pub struct AcceptedUploads(pub UploadKind);

impl Plugin for UploadPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<UploadChannel>()
            .insert_resource(AcceptedUploads(self.kind))
            .add_systems(Startup, preload_launch_files);

        #[cfg(not(target_family = "wasm"))]
        app.add_systems(Update, read_dropped_files);
    }
}

/// In-memory directory backing the `upload://` asset source.
#[derive(Resource, Clone)]
pub struct UploadAssets(pub Dir);

impl UploadAssets {
    /// Store bytes under `name`, replacing any previous file of that name.
    pub fn insert(&self, name: &str, bytes: Vec<u8>) {
        self.0.insert_asset(Path::new(name), bytes);
    }

    pub fn remove(&self, name: &str) {
        let _ = self.0.remove_asset(Path::new(name));
    }

    /// Asset path of a stored file.
    pub fn asset_path(name: &str) -> String {
        format!("{UPLOAD_SOURCE}://{name}")
    }
}

/// Register the `upload://` asset source.
///
/// Must run before `DefaultPlugins` adds the asset server.
pub fn register_upload_source(app: &mut App) {
    let dir = Dir::default();
    let reader_dir = dir.clone();
    app.register_asset_source(
        UPLOAD_SOURCE,
        AssetSourceBuilder::new(move || {
            Box::new(MemoryAssetReader {
                root: reader_dir.clone(),
            })
        }),
    );
    app.insert_resource(UploadAssets(dir));
}

/// Open a file dialog and send the picked files to `tx`.
///
/// GeoJSON allows multiple selection; models are picked one at a time.
pub fn open_file_dialog(
    spawner: &TaskSpawner,
    kind: UploadKind,
    tx: async_channel::Sender<UploadedFile>,
) {
    spawner.spawn(async move {
        let dialog = rfd::AsyncFileDialog::new().add_filter(kind.filter_name(), kind.extensions());
        let handles = match kind {
            UploadKind::Model => dialog.pick_file().await.into_iter().collect(),
            UploadKind::GeoJson => dialog.pick_files().await.unwrap_or_default(),
        };

        for handle in handles {
            let file = UploadedFile {
                name: handle.file_name(),
                bytes: handle.read().await,
            };
            tracing::debug!(name = %file.name, bytes = file.bytes.len(), "picked file");
            if tx.send(file).await.is_err() {
                return;
            }
        }
    });
}

/// Open a folder dialog and send every matching file inside it to `tx`.
#[cfg(not(target_family = "wasm"))]
pub fn open_folder_dialog(
    spawner: &TaskSpawner,
    kind: UploadKind,
    tx: async_channel::Sender<UploadedFile>,
) {
    spawner.spawn(async move {
        let Some(folder) = rfd::AsyncFileDialog::new().pick_folder().await else {
            return;
        };

        let paths = match folder_files(folder.path(), kind).await {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!("Failed to read folder {}: {}", folder.path().display(), e);
                return;
            }
        };
        tracing::info!(
            "Found {} {} files in {}",
            paths.len(),
            kind.filter_name(),
            folder.path().display()
        );

        send_paths(paths, &tx).await;
    });
}

/// Files directly inside `folder` that match `kind`, sorted by name.
#[cfg(not(target_family = "wasm"))]
async fn folder_files(folder: &Path, kind: UploadKind) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(folder).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_file = tokio::fs::metadata(&path)
            .await
            .is_ok_and(|meta| meta.is_file());
        if is_file && kind.matches(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(not(target_family = "wasm"))]
async fn send_paths(paths: Vec<PathBuf>, tx: &async_channel::Sender<UploadedFile>) {
    for path in paths {
        match UploadedFile::read(&path).await {
            Ok(file) => {
                if tx.send(file).await.is_err() {
                    return;
                }
            }
            Err(e) => tracing::warn!("Failed to read {}: {}", path.display(), e),
        }
    }
}

/// Queue the files named on the command line.
#[allow(clippy::needless_pass_by_value)]
fn preload_launch_files(
    params: Option<Res<LaunchParams>>,
    accepted: Res<AcceptedUploads>,
    channel: Res<UploadChannel>,
    spawner: TaskSpawner,
) {
    let Some(params) = params else {
        return;
    };

    let paths: Vec<PathBuf> = match accepted.0 {
        UploadKind::Model => params.model.iter().cloned().collect(),
        UploadKind::GeoJson => params.geojson.clone(),
    };
    if paths.is_empty() {
        return;
    }

    #[cfg(not(target_family = "wasm"))]
    {
        tracing::info!("Preloading {} file(s) from the command line", paths.len());
        let tx = channel.sender();
        spawner.spawn(async move {
            send_paths(paths, &tx).await;
        });
    }

    #[cfg(target_family = "wasm")]
    {
        let _ = (channel, spawner);
        tracing::warn!("Ignoring {} launch path(s) on the web", paths.len());
    }
}

/// Read files dropped onto the window.
#[cfg(not(target_family = "wasm"))]
#[allow(clippy::needless_pass_by_value)]
fn read_dropped_files(
    mut drops: MessageReader<FileDragAndDrop>,
    channel: Res<UploadChannel>,
    spawner: TaskSpawner,
) {
    let paths: Vec<PathBuf> = drops
        .read()
        .filter_map(|event| match event {
            FileDragAndDrop::DroppedFile { path_buf, .. } => Some(path_buf.clone()),
            _ => None,
        })
        .collect();
    if paths.is_empty() {
        return;
    }

    tracing::info!("Received {} dropped file(s)", paths.len());
    let tx = channel.sender();
    spawner.spawn(async move {
        send_paths(paths, &tx).await;
    });
}

/// Entry points for the page hosting the WASM build.
#[cfg(target_family = "wasm")]
mod host {
    use std::sync::LazyLock;

    use wasm_bindgen::prelude::*;

    use super::UploadedFile;

    type Pair = (
        async_channel::Sender<UploadedFile>,
        async_channel::Receiver<UploadedFile>,
    );

    static HOST_UPLOADS: LazyLock<Pair> = LazyLock::new(async_channel::unbounded);

    pub(super) fn channel() -> Pair {
        HOST_UPLOADS.clone()
    }

    /// Hand a file picked or dropped in the page to the viewer.
    #[wasm_bindgen]
    pub fn upload_file(name: String, bytes: Vec<u8>) {
        if HOST_UPLOADS.0.try_send(UploadedFile { name, bytes }).is_err() {
            tracing::warn!("Upload channel closed; dropping file");
        }
    }
}
