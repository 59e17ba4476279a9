//! Convert pipe and manhole CSV files into one GLB model.
//!
//! Run with: `cargo run -p geoxr-pipes --bin pipe-glb -- --pipes pipes.csv`

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use geoxr_pipes::network::{Network, read_manholes, read_pipes};
use geoxr_pipes::{PipeError, glb};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(about = "Create a 3D model from pipes and manholes CSV files")]
struct Args {
    /// Pipes CSV: x1,y1,z1,x2,y2,z2,diameter and an optional color.
    #[arg(long, default_value = "pipes.csv")]
    pipes: PathBuf,
    /// Manholes CSV: x,y,diameter,base_elevation,top_elevation and optional
    /// id and color.
    #[arg(long, default_value = "manholes.csv")]
    manholes: PathBuf,
    /// Where to write the GLB file.
    #[arg(long, default_value = "output.glb")]
    output: PathBuf,
}

fn open(path: &Path) -> Result<File, PipeError> {
    File::open(path).map_err(|source| PipeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn run(args: &Args) -> Result<(), PipeError> {
    let pipes = read_pipes(open(&args.pipes)?)?;
    let manholes = read_manholes(open(&args.manholes)?)?;
    tracing::info!(
        "Read {} pipes from {} and {} manholes from {}",
        pipes.len(),
        args.pipes.display(),
        manholes.len(),
        args.manholes.display()
    );

    let network = Network::build(&pipes, &manholes);
    let bytes = glb::to_glb(&network.mesh)?;
    std::fs::write(&args.output, &bytes).map_err(|source| PipeError::Io {
        path: args.output.clone(),
        source,
    })?;

    tracing::info!(
        "GLB file {} has been created with {} pipes and {} manholes ({} triangles, {} bytes)",
        args.output.display(),
        network.pipes,
        network.manholes,
        network.mesh.triangle_count(),
        bytes.len()
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
