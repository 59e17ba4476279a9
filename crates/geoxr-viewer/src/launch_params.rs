//! Launch parameter parsing for the viewers.
//!
//! On native, parameters are parsed from command-line arguments using clap.
//! On WASM, defaults are used (CLI argument parsing is not available).

use std::path::PathBuf;

use bevy::prelude::*;
use geoxr_core::bounds::{DEFAULT_FIT_PADDING, DEFAULT_TARGET_SIZE};

/// Launch parameters shared by both viewers.
#[derive(Resource, Debug, Clone)]
pub struct LaunchParams {
    /// Model to load at startup (model viewer).
    pub model: Option<PathBuf>,
    /// GeoJSON files to load at startup (VR scene).
    pub geojson: Vec<PathBuf>,
    /// Diagonal length loaded models are scaled to.
    pub target_size: f32,
    /// Multiplier on the camera fit distance.
    pub padding: f32,
    /// Drive the VR scene with the keyboard controller emulator.
    pub emulate_controllers: bool,
}

impl Default for LaunchParams {
    fn default() -> Self {
        Self {
            model: None,
            geojson: Vec::new(),
            target_size: DEFAULT_TARGET_SIZE,
            padding: DEFAULT_FIT_PADDING,
            emulate_controllers: !cfg!(target_family = "wasm"),
        }
    }
}

#[cfg(not(target_family = "wasm"))]
mod native {
    use clap::Parser;

    use super::*;

    /// Parse a strictly positive, finite number.
    fn parse_positive(s: &str) -> Result<f32, String> {
        let value = s
            .parse::<f32>()
            .map_err(|e| format!("invalid number: {e}"))?;
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(format!("expected a positive number, got {value}"))
        }
    }

    #[derive(Parser)]
    #[command(about = "glTF and GeoJSON viewer with two-handed navigation")]
    struct CliArgs {
        /// glTF model (.gltf or .glb) to open at startup.
        #[arg(long)]
        model: Option<PathBuf>,

        /// GeoJSON file to add to the scene at startup (repeatable).
        #[arg(long)]
        geojson: Vec<PathBuf>,

        /// Diagonal length loaded models are scaled to.
        #[arg(long, default_value_t = DEFAULT_TARGET_SIZE, value_parser = parse_positive)]
        target_size: f32,

        /// Multiplier on the distance needed to frame a model.
        #[arg(long, default_value_t = DEFAULT_FIT_PADDING, value_parser = parse_positive)]
        padding: f32,

        /// Disable the keyboard controller emulator.
        #[arg(long)]
        no_emulator: bool,
    }

    pub fn parse() -> LaunchParams {
        let args = CliArgs::parse();
        LaunchParams {
            model: args.model,
            geojson: args.geojson,
            target_size: args.target_size,
            padding: args.padding,
            emulate_controllers: !args.no_emulator,
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_positive() {
            assert_eq!(parse_positive("2.5"), Ok(2.5));
            assert!(parse_positive("0").is_err());
            assert!(parse_positive("-1").is_err());
            assert!(parse_positive("inf").is_err());
            assert!(parse_positive("big").is_err());
        }

        #[test]
        fn test_cli_args() {
            let args = CliArgs::try_parse_from([
                "geojson-vr",
                "--geojson",
                "a.geojson",
                "--geojson",
                "b.geojson",
                "--no-emulator",
            ])
            .unwrap();
            assert_eq!(args.geojson.len(), 2);
            assert!(args.no_emulator);
            assert!(args.model.is_none());
            assert_eq!(args.target_size, DEFAULT_TARGET_SIZE);

            assert!(CliArgs::try_parse_from(["model-viewer", "--padding", "0"]).is_err());
        }
    }
}

/// Parse launch parameters from CLI args (native) or use defaults (WASM).
pub fn parse() -> LaunchParams {
    #[cfg(not(target_family = "wasm"))]
    {
        native::parse()
    }
    #[cfg(target_family = "wasm")]
    {
        LaunchParams::default()
    }
}
