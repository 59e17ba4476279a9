//! Egui overlay: upload buttons, notifications and debug info.

use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{EguiContexts, EguiPlugin, EguiPrimaryContextPass, egui};
use geoxr_core::manipulation::{Gesture, Hand};
use geoxr_core::notice::{Notifications, Severity};

use crate::async_runtime::TaskSpawner;
use crate::geojson_scene::SceneStats;
use crate::model_viewer::{ClearModel, LoadedModel, ModelViewer};
use crate::upload::{self, UploadChannel, UploadKind};
use crate::xr_input::{AnchorState, EmulatorSettings, ResetAnchor};

/// Notifications shown to the user.
#[derive(Resource, Default, Deref, DerefMut)]
pub struct Notices(pub Notifications);

/// Plugin for the overlay of one viewer.
pub struct ViewerUiPlugin {
    pub kind: UploadKind,
}

impl Plugin for ViewerUiPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(EguiPlugin::default())
            .add_plugins(FrameTimeDiagnosticsPlugin::default())
            .init_resource::<Notices>()
            .add_systems(EguiPrimaryContextPass, notifications_window);

        match self.kind {
            UploadKind::Model => app.add_systems(EguiPrimaryContextPass, model_panel),
            UploadKind::GeoJson => app.add_systems(EguiPrimaryContextPass, scene_panel),
        };
    }
}

fn fps(diagnostics: &DiagnosticsStore) -> f64 {
    diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(bevy::diagnostic::Diagnostic::smoothed)
        .unwrap_or(0.0)
}

/// List pending notifications, each with a dismiss button.
fn notifications_window(mut contexts: EguiContexts, mut notices: ResMut<Notices>) -> Result {
    if notices.is_empty() {
        return Ok(());
    }
    let ctx = contexts.ctx_mut()?;

    let mut dismissed = None;
    let mut clear = false;
    egui::Window::new("Notifications")
        .anchor(egui::Align2::RIGHT_TOP, [-10.0, 10.0])
        .resizable(false)
        .show(ctx, |ui| {
            for (index, notice) in notices.entries().iter().enumerate() {
                ui.horizontal(|ui| {
                    let color = match notice.severity {
                        Severity::Info => egui::Color32::LIGHT_GRAY,
                        Severity::Error => egui::Color32::RED,
                    };
                    ui.colored_label(color, &notice.message);
                    if ui.small_button("✕").clicked() {
                        dismissed = Some(index);
                    }
                });
            }
            if notices.len() > 1 && ui.button("Clear all").clicked() {
                clear = true;
            }
        });

    if clear {
        notices.clear();
    } else if let Some(index) = dismissed {
        notices.dismiss(index);
    }

    Ok(())
}

/// Model viewer panel.
#[allow(clippy::needless_pass_by_value)]
fn model_panel(
    mut contexts: EguiContexts,
    diagnostics: Res<DiagnosticsStore>,
    viewer: Res<ModelViewer>,
    channel: Res<UploadChannel>,
    mut clear: MessageWriter<ClearModel>,
    spawner: TaskSpawner,
) -> Result {
    let ctx = contexts.ctx_mut()?;

    egui::Window::new("Model")
        .default_pos([10.0, 10.0])
        .show(ctx, |ui| {
            ui.label(format!("FPS: {:.0}", fps(&diagnostics)));
            ui.separator();

            // One load at a time.
            let loading = viewer.is_loading();
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(!loading, egui::Button::new("Open model…"))
                    .clicked()
                {
                    upload::open_file_dialog(&spawner, UploadKind::Model, channel.sender());
                }
                let showing = viewer.current().is_some();
                if ui
                    .add_enabled(showing && !loading, egui::Button::new("Clear"))
                    .clicked()
                {
                    clear.write(ClearModel);
                }
            });

            ui.horizontal(|ui| {
                if loading {
                    ui.spinner();
                }
                ui.label(status_line(viewer.pending(), viewer.current()));
            });

            ui.separator();
            ui.label("Drag to orbit, scroll to zoom.");
            #[cfg(not(target_family = "wasm"))]
            ui.label("Drop a .gltf or .glb file on the window to open it.");
        });

    Ok(())
}

/// GeoJSON scene panel.
#[allow(clippy::needless_pass_by_value, clippy::too_many_arguments)]
fn scene_panel(
    mut contexts: EguiContexts,
    diagnostics: Res<DiagnosticsStore>,
    stats: Res<SceneStats>,
    anchor: Res<AnchorState>,
    emulator: Option<Res<EmulatorSettings>>,
    channel: Res<UploadChannel>,
    mut reset: MessageWriter<ResetAnchor>,
    spawner: TaskSpawner,
) -> Result {
    let ctx = contexts.ctx_mut()?;

    egui::Window::new("GeoJSON")
        .default_pos([10.0, 10.0])
        .show(ctx, |ui| {
            ui.label(format!("FPS: {:.0}", fps(&diagnostics)));
            ui.separator();

            ui.horizontal(|ui| {
                if ui.button("Open files…").clicked() {
                    upload::open_file_dialog(&spawner, UploadKind::GeoJson, channel.sender());
                }
                #[cfg(not(target_family = "wasm"))]
                if ui.button("Open folder…").clicked() {
                    upload::open_folder_dialog(&spawner, UploadKind::GeoJson, channel.sender());
                }
            });

            ui.label(format!(
                "Files: {}, features: {} ({} skipped)",
                stats.files, stats.features, stats.skipped_features
            ));
            ui.label(format!(
                "Shapes: {} extruded ({} triangles), {} points, {} lines",
                stats.extruded, stats.triangles, stats.points, stats.lines
            ));

            ui.separator();

            let user = anchor.anchor;
            ui.label(format!(
                "Anchor: ({:.1}, {:.1}, {:.1})",
                user.position.x, user.position.y, user.position.z
            ));
            ui.label(format!(
                "Yaw: {:.1}°, scale: {:.3}",
                user.yaw.to_degrees(),
                user.scale
            ));
            ui.label(format!("Gesture: {}", gesture_label(&anchor.gesture)));
            ui.horizontal(|ui| {
                for hand in Hand::BOTH {
                    let grabbing = anchor.manipulator.controller(hand).is_grabbing;
                    let text = format!("{hand:?}: {}", if grabbing { "grab" } else { "-" });
                    ui.label(text);
                }
            });
            if ui.button("Reset view").clicked() {
                reset.write(ResetAnchor);
            }

            if let Some(emulator) = emulator {
                ui.separator();
                ui.label("Controller emulator:");
                ui.label(format!(
                    "{:?}/{:?} grip, {:?}{:?}{:?}{:?} move, {:?}/{:?} spread, {:?}/{:?} twist",
                    emulator.left_grip,
                    emulator.right_grip,
                    emulator.forward,
                    emulator.left,
                    emulator.back,
                    emulator.right,
                    emulator.spread,
                    emulator.squeeze,
                    emulator.twist_left,
                    emulator.twist_right,
                ));
            }
        });

    Ok(())
}

/// What the model panel says about the current load.
fn status_line(pending: Option<&str>, current: Option<&LoadedModel>) -> String {
    match (pending, current) {
        (Some(name), _) => format!("Loading {name}…"),
        (None, Some(model)) => format!("Showing {}", model.file_name),
        (None, None) => "No model loaded".to_string(),
    }
}

fn gesture_label(gesture: &Gesture) -> String {
    match gesture {
        Gesture::Idle => "idle".to_string(),
        Gesture::Pan { hand, .. } => format!("pan ({hand:?})"),
        Gesture::TwoHanded {
            scale_factor,
            yaw_delta,
            ..
        } => format!(
            "two-handed (×{scale_factor:.3}, {:+.2}°)",
            yaw_delta.to_degrees()
        ),
    }
}
