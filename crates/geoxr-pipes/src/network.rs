//! Pipes and manholes read from CSV.
//!
//! Pipes CSV columns: `x1,y1,z1,x2,y2,z2,diameter` and an optional `color`.
//! Manholes CSV columns: `x,y,diameter,base_elevation,top_elevation` and
//! optional `id` and `color`. Coordinates are z-up.
//!
//! A row with a missing or non-numeric value, or with geometry that cannot be
//! built, is skipped with a warning. An unparseable colour only drops the
//! colour.

use std::io;

use glam::{DMat4, DQuat, DVec3};
use serde::Deserialize;

use crate::color::Rgba8;
use crate::error::PipeError;
use crate::mesh::{ColoredMesh, cylinder, tube};

/// Wall thickness of every pipe.
pub const WALL_THICKNESS: f64 = 0.05;

/// A straight pipe segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipe {
    pub start: DVec3,
    pub end: DVec3,
    pub diameter: f64,
    pub color: Rgba8,
}

impl Pipe {
    /// Hollow tube from `start` to `end`, or `None` for a zero-length pipe.
    pub fn mesh(&self) -> Option<ColoredMesh> {
        let axis = self.end - self.start;
        let length = axis.length();
        if length <= 0.0 || !length.is_finite() {
            return None;
        }

        let outer = self.diameter / 2.0;
        let mut mesh = tube(outer, outer - WALL_THICKNESS, length, self.color);
        let rotation = DQuat::from_rotation_arc(DVec3::Z, axis / length);
        mesh.transform(&DMat4::from_rotation_translation(rotation, self.start));
        Some(mesh)
    }
}

/// A vertical manhole shaft.
#[derive(Debug, Clone, PartialEq)]
pub struct Manhole {
    pub id: Option<String>,
    pub x: f64,
    pub y: f64,
    pub diameter: f64,
    pub base_elevation: f64,
    pub top_elevation: f64,
    pub color: Rgba8,
}

impl Manhole {
    /// Solid cylinder from base to top, or `None` unless top is above base.
    pub fn mesh(&self) -> Option<ColoredMesh> {
        let height = self.top_elevation - self.base_elevation;
        if height <= 0.0 || !height.is_finite() {
            return None;
        }

        let mut mesh = cylinder(self.diameter / 2.0, height, self.color);
        mesh.transform(&DMat4::from_translation(DVec3::new(
            self.x,
            self.y,
            self.base_elevation,
        )));
        Some(mesh)
    }

    fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("manhole {id}"),
            None => format!("manhole at ({}, {})", self.x, self.y),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PipeRecord {
    x1: Option<f64>,
    y1: Option<f64>,
    z1: Option<f64>,
    x2: Option<f64>,
    y2: Option<f64>,
    z2: Option<f64>,
    diameter: Option<f64>,
    color: Option<String>,
}

impl PipeRecord {
    fn to_pipe(&self, row: usize) -> Result<Pipe, String> {
        let start = DVec3::new(
            required(self.x1, "x1")?,
            required(self.y1, "y1")?,
            required(self.z1, "z1")?,
        );
        let end = DVec3::new(
            required(self.x2, "x2")?,
            required(self.y2, "y2")?,
            required(self.z2, "z2")?,
        );
        Ok(Pipe {
            start,
            end,
            diameter: positive(self.diameter, "diameter")?,
            color: row_color(self.color.as_deref(), &format!("pipe at row {row}")),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ManholeRecord {
    id: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
    diameter: Option<f64>,
    base_elevation: Option<f64>,
    top_elevation: Option<f64>,
    color: Option<String>,
}

impl ManholeRecord {
    fn to_manhole(&self, row: usize) -> Result<Manhole, String> {
        let label = match &self.id {
            Some(id) => format!("manhole {id}"),
            None => format!("manhole at row {row}"),
        };
        Ok(Manhole {
            id: self.id.clone(),
            x: required(self.x, "x")?,
            y: required(self.y, "y")?,
            diameter: positive(self.diameter, "diameter")?,
            base_elevation: required(self.base_elevation, "base_elevation")?,
            top_elevation: required(self.top_elevation, "top_elevation")?,
            color: row_color(self.color.as_deref(), &label),
        })
    }
}

fn required(value: Option<f64>, column: &str) -> Result<f64, String> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(format!("{column} is {v}")),
        None => Err(format!("missing {column}")),
    }
}

fn positive(value: Option<f64>, column: &str) -> Result<f64, String> {
    let v = required(value, column)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(format!("{column} must be positive, got {v}"))
    }
}

fn row_color(text: Option<&str>, what: &str) -> Rgba8 {
    let Some(text) = text else {
        return Rgba8::DEFAULT;
    };
    Rgba8::parse_hex(text).unwrap_or_else(|| {
        tracing::warn!("Invalid color {text:?} for {what}; using the default");
        Rgba8::DEFAULT
    })
}

fn csv_reader<R: io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Read pipes, skipping rows that cannot become a pipe.
pub fn read_pipes<R: io::Read>(reader: R) -> Result<Vec<Pipe>, PipeError> {
    let mut reader = csv_reader(reader);
    reader.headers()?;

    let mut pipes = Vec::new();
    for (row, result) in reader.deserialize::<PipeRecord>().enumerate() {
        match result.map_err(|e| e.to_string()).and_then(|r| r.to_pipe(row)) {
            Ok(pipe) => pipes.push(pipe),
            Err(reason) => tracing::warn!("Skipping pipe at row {row}: {reason}"),
        }
    }
    Ok(pipes)
}

/// Read manholes, skipping rows that cannot become a manhole.
pub fn read_manholes<R: io::Read>(reader: R) -> Result<Vec<Manhole>, PipeError> {
    let mut reader = csv_reader(reader);
    reader.headers()?;

    let mut manholes = Vec::new();
    for (row, result) in reader.deserialize::<ManholeRecord>().enumerate() {
        match result
            .map_err(|e| e.to_string())
            .and_then(|r| r.to_manhole(row))
        {
            Ok(manhole) => manholes.push(manhole),
            Err(reason) => tracing::warn!("Skipping manhole at row {row}: {reason}"),
        }
    }
    Ok(manholes)
}

/// Every pipe and manhole merged into one mesh.
#[derive(Debug, Default)]
pub struct Network {
    pub mesh: ColoredMesh,
    pub pipes: usize,
    pub manholes: usize,
}

impl Network {
    /// Mesh every object, skipping ones with degenerate geometry.
    pub fn build(pipes: &[Pipe], manholes: &[Manhole]) -> Self {
        let mut network = Self::default();
        for (row, pipe) in pipes.iter().enumerate() {
            match pipe.mesh() {
                Some(mesh) => {
                    network.mesh.append(mesh);
                    network.pipes += 1;
                }
                None => tracing::warn!("Skipping pipe {row}: start and end are the same point"),
            }
        }
        for manhole in manholes {
            match manhole.mesh() {
                Some(mesh) => {
                    network.mesh.append(mesh);
                    network.manholes += 1;
                }
                None => tracing::warn!(
                    "Skipping {}: top elevation must be above base elevation",
                    manhole.label()
                ),
            }
        }
        network
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn pipe(start: DVec3, end: DVec3, diameter: f64) -> Pipe {
        Pipe {
            start,
            end,
            diameter,
            color: Rgba8::DEFAULT,
        }
    }

    #[test]
    fn test_read_pipes_skips_bad_rows() {
        let csv = "\
x1,y1,z1,x2,y2,z2,diameter,color
0,0,0,10,0,0,0.3,#ff0000
0,0,0,0,5,0,0.2,
1,1,1,oops,0,0,0.2,#00ff00
1,1,1,2,2,2,,#00ff00
1,1,1,2,2,2,0.2,chartreuse
";
        let pipes = read_pipes(csv.as_bytes()).unwrap();

        assert_eq!(pipes.len(), 3);
        assert_eq!(pipes[0].color, Rgba8([255, 0, 0, 255]));
        assert_eq!(pipes[0].end, DVec3::new(10.0, 0.0, 0.0));
        assert_eq!(pipes[1].color, Rgba8::DEFAULT);
        // A bad colour keeps the row.
        assert_eq!(pipes[2].color, Rgba8::DEFAULT);
        assert_eq!(pipes[2].diameter, 0.2);
    }

    #[test]
    fn test_read_pipes_without_color_column() {
        let pipes = read_pipes("x1,y1,z1,x2,y2,z2,diameter\n0,0,0,1,1,1,0.5\n".as_bytes()).unwrap();
        assert_eq!(pipes.len(), 1);
        assert_eq!(pipes[0].color, Rgba8::DEFAULT);
    }

    #[test]
    fn test_read_manholes_skips_bad_rows() {
        let csv = "\
id,x,y,diameter,base_elevation,top_elevation,color
MH1,5,5,1.2,-3,0,#0000ff80
MH2,6,5,1.2,,0,
MH3,7,5,-1,-3,0,
,8,5,1.0,-2,0,
";
        let manholes = read_manholes(csv.as_bytes()).unwrap();

        assert_eq!(manholes.len(), 2);
        assert_eq!(manholes[0].id.as_deref(), Some("MH1"));
        assert_eq!(manholes[0].color, Rgba8([0, 0, 255, 128]));
        assert_eq!(manholes[1].id, None);
        assert_eq!(manholes[1].x, 8.0);
    }

    #[test]
    fn test_pipe_runs_from_start_to_end() {
        let start = DVec3::new(100.0, 200.0, -2.0);
        let end = DVec3::new(110.0, 200.0, -2.0);
        let mesh = pipe(start, end, 0.6).mesh().unwrap();

        let (min, max) = mesh.bounds().unwrap();
        assert!((min - DVec3::new(100.0, 199.7, -2.3)).length() < 1e-9);
        assert!((max - DVec3::new(110.0, 200.3, -1.7)).length() < 1e-9);
    }

    #[test]
    fn test_downward_pipe_points_down() {
        let start = DVec3::new(0.0, 0.0, 0.0);
        let end = DVec3::new(0.0, 0.0, -4.0);
        let (min, max) = pipe(start, end, 0.5).mesh().unwrap().bounds().unwrap();

        assert!((min.z + 4.0).abs() < 1e-9);
        assert!(max.z.abs() < 1e-9);
    }

    #[test]
    fn test_zero_length_pipe_has_no_mesh() {
        assert!(pipe(DVec3::ONE, DVec3::ONE, 0.5).mesh().is_none());
    }

    #[test]
    fn test_manhole_spans_base_to_top() {
        let manhole = Manhole {
            id: None,
            x: 5.0,
            y: -3.0,
            diameter: 1.2,
            base_elevation: -4.0,
            top_elevation: 0.5,
            color: Rgba8::DEFAULT,
        };
        let (min, max) = manhole.mesh().unwrap().bounds().unwrap();
        assert!((min - DVec3::new(4.4, -3.6, -4.0)).length() < 1e-9);
        assert!((max - DVec3::new(5.6, -2.4, 0.5)).length() < 1e-9);

        let upside_down = Manhole {
            top_elevation: -5.0,
            ..manhole
        };
        assert!(upside_down.mesh().is_none());
    }

    #[test]
    fn test_network_counts_built_objects() {
        let pipes = [
            pipe(DVec3::ZERO, DVec3::X, 0.3),
            pipe(DVec3::X, DVec3::X, 0.3),
        ];
        let network = Network::build(&pipes, &[]);

        assert_eq!(network.pipes, 1);
        assert_eq!(network.manholes, 0);
        assert_eq!(
            network.mesh.vertex_count(),
            pipes[0].mesh().unwrap().vertex_count()
        );
    }

    proptest! {
        #[test]
        fn prop_pipe_hugs_its_segment(
            start in prop::array::uniform3(-1000.0f64..1000.0),
            end in prop::array::uniform3(-1000.0f64..1000.0),
            diameter in 0.05f64..2.0,
        ) {
            let (start, end) = (DVec3::from_array(start), DVec3::from_array(end));
            prop_assume!(start.distance(end) > 0.01);
            let mesh = pipe(start, end, diameter).mesh().unwrap();

            let axis = (end - start).normalize();
            let length = start.distance(end);
            for p in &mesh.positions {
                let along = (*p - start).dot(axis);
                let off_axis = (*p - start - axis * along).length();
                prop_assert!(along > -1e-6 && along < length + 1e-6);
                prop_assert!(off_axis < diameter / 2.0 + 1e-6);
            }
        }
    }
}
