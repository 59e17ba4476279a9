//! GeoJSON scene navigated with two-handed controller gestures.

use geoxr_viewer::geojson_scene::GeoJsonScenePlugin;
use geoxr_viewer::upload::UploadKind;
use geoxr_viewer::xr_input::XrInputPlugin;
use geoxr_viewer::{init_tracing, launch_params, viewer_app};

fn main() {
    init_tracing();

    let params = launch_params::parse();
    let emulate = params.emulate_controllers;
    viewer_app("geojson-vr", UploadKind::GeoJson, params)
        .add_plugins(XrInputPlugin { emulate })
        .add_plugins(GeoJsonScenePlugin)
        .run();
}
