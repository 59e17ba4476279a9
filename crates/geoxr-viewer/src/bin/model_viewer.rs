//! Desktop/browser viewer for a single glTF model.

use geoxr_viewer::model_viewer::ModelViewerPlugin;
use geoxr_viewer::upload::UploadKind;
use geoxr_viewer::{init_tracing, launch_params, viewer_app};

fn main() {
    init_tracing();

    let params = launch_params::parse();
    viewer_app("model-viewer", UploadKind::Model, params)
        .add_plugins(ModelViewerPlugin)
        .run();
}
