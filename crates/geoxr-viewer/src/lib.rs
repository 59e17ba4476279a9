//! Bevy front ends for the geoxr viewers.
//!
//! Two binaries share this library:
//! - `model-viewer`: opens a single glTF model at a time, normalized and framed
//!   by an orbit camera
//! - `geojson-vr`: renders GeoJSON layers around a user anchor that is moved
//!   with two-handed controller gestures
//!
//! The logic that does not need a renderer lives in `geoxr-core`.

pub mod async_runtime;
pub mod geojson_scene;
pub mod launch_params;
pub mod model_viewer;
pub mod orbit;
pub mod ui;
pub mod upload;
pub mod xr_input;

use bevy::prelude::*;

use crate::async_runtime::AsyncRuntimePlugin;
use crate::launch_params::LaunchParams;
use crate::ui::ViewerUiPlugin;
use crate::upload::{UploadKind, UploadPlugin};

/// Initialize tracing: stdout with an env filter on native, the browser
/// console on WASM.
pub fn init_tracing() {
    #[cfg(not(target_family = "wasm"))]
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    #[cfg(target_family = "wasm")]
    {
        console_error_panic_hook::set_once();
        tracing_wasm::set_as_global_default();
    }
}

/// Build an app with the window, default plugins, async runtime and file
/// intake shared by both viewers.
pub fn viewer_app(title: &str, kind: UploadKind, params: LaunchParams) -> App {
    let mut app = App::new();
    app.insert_resource(params);

    // The upload source has to exist before the asset server is built.
    upload::register_upload_source(&mut app);

    #[allow(unused_mut)]
    let mut window = Window {
        title: title.to_string(),
        resolution: (1600, 900).into(),
        position: WindowPosition::Centered(MonitorSelection::Primary),
        ..Default::default()
    };

    // WASM: Fit canvas to parent element and prevent browser event handling.
    #[cfg(target_family = "wasm")]
    {
        window.fit_canvas_to_parent = true;
        window.prevent_default_event_handling = true;
    }

    app.add_plugins(
        DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(window),
                ..Default::default()
            })
            // Tracing is set up by `init_tracing`.
            .disable::<bevy::log::LogPlugin>(),
    );

    // Add async runtime (Tokio on native, no-op on WASM).
    app.add_plugins(AsyncRuntimePlugin)
        .add_plugins(UploadPlugin { kind })
        .add_plugins(ViewerUiPlugin { kind });

    app
}
