//! Binary glTF 2.0 writer for a single coloured mesh.
//!
//! The file holds one node with one primitive. Positions are stored relative
//! to the mesh's minimum corner and the node's translation puts them back, so
//! `f32` vertex data keeps centimetre detail at survey coordinates. Input is
//! z-up and is written y-up as glTF requires, mapping `(x, y, z)` to
//! `(x, z, -y)`.

use glam::{DVec3, Vec3};
use serde_json::json;

use crate::error::PipeError;
use crate::mesh::ColoredMesh;

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const FLOAT: u32 = 5126;
const UNSIGNED_BYTE: u32 = 5121;
const UNSIGNED_INT: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

fn y_up(v: DVec3) -> DVec3 {
    DVec3::new(v.x, v.z, -v.y)
}

/// Encode `mesh` as a GLB file.
pub fn to_glb(mesh: &ColoredMesh) -> Result<Vec<u8>, PipeError> {
    let Some((min, max)) = mesh.bounds().filter(|_| !mesh.is_empty()) else {
        return Err(PipeError::NoGeometry);
    };
    let origin = y_up(DVec3::new(min.x, max.y, min.z));

    let positions: Vec<[f32; 3]> = mesh
        .positions
        .iter()
        .map(|p| (y_up(*p) - origin).as_vec3().to_array())
        .collect();
    let normals: Vec<[f32; 3]> = mesh
        .normals
        .iter()
        .map(|n| y_up(*n).as_vec3().to_array())
        .collect();
    let colors: Vec<[u8; 4]> = mesh.colors.iter().map(|c| c.0).collect();

    let local_min = positions
        .iter()
        .fold(Vec3::splat(f32::MAX), |acc, p| acc.min(Vec3::from_array(*p)));
    let local_max = positions
        .iter()
        .fold(Vec3::splat(f32::MIN), |acc, p| acc.max(Vec3::from_array(*p)));

    let views: [&[u8]; 4] = [
        bytemuck::cast_slice(&positions),
        bytemuck::cast_slice(&normals),
        bytemuck::cast_slice(&colors),
        bytemuck::cast_slice(&mesh.indices),
    ];
    let mut bin = Vec::with_capacity(views.iter().map(|v| v.len()).sum());
    let mut buffer_views = Vec::new();
    for (i, view) in views.iter().enumerate() {
        let target = if i == 3 {
            ELEMENT_ARRAY_BUFFER
        } else {
            ARRAY_BUFFER
        };
        buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": bin.len(),
            "byteLength": view.len(),
            "target": target,
        }));
        bin.extend_from_slice(view);
    }

    let vertex_count = positions.len();
    let alpha_mode = if mesh.colors.iter().any(|c| !c.is_opaque()) {
        "BLEND"
    } else {
        "OPAQUE"
    };
    let document = json!({
        "asset": { "version": "2.0", "generator": "geoxr-pipes" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "translation": origin.to_array() }],
        "meshes": [{
            "primitives": [{
                "attributes": { "POSITION": 0, "NORMAL": 1, "COLOR_0": 2 },
                "indices": 3,
                "material": 0,
                "mode": 4,
            }],
        }],
        "materials": [{
            "pbrMetallicRoughness": {
                "baseColorFactor": [1.0, 1.0, 1.0, 1.0],
                "metallicFactor": 0.0,
                "roughnessFactor": 0.8,
            },
            "alphaMode": alpha_mode,
        }],
        "accessors": [
            {
                "bufferView": 0,
                "componentType": FLOAT,
                "count": vertex_count,
                "type": "VEC3",
                "min": local_min.to_array(),
                "max": local_max.to_array(),
            },
            { "bufferView": 1, "componentType": FLOAT, "count": vertex_count, "type": "VEC3" },
            {
                "bufferView": 2,
                "componentType": UNSIGNED_BYTE,
                "normalized": true,
                "count": vertex_count,
                "type": "VEC4",
            },
            {
                "bufferView": 3,
                "componentType": UNSIGNED_INT,
                "count": mesh.indices.len(),
                "type": "SCALAR",
            },
        ],
        "bufferViews": buffer_views,
        "buffers": [{ "byteLength": bin.len() }],
    });

    let mut json = document.to_string().into_bytes();
    pad(&mut json, b' ');
    pad(&mut bin, 0);

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&chunk_len(total).to_le_bytes());
    for (kind, data) in [(CHUNK_JSON, &json), (CHUNK_BIN, &bin)] {
        glb.extend_from_slice(&chunk_len(data.len()).to_le_bytes());
        glb.extend_from_slice(&kind.to_le_bytes());
        glb.extend_from_slice(data);
    }
    Ok(glb)
}

/// Pad to a multiple of four bytes.
fn pad(bytes: &mut Vec<u8>, fill: u8) {
    bytes.resize(bytes.len().next_multiple_of(4), fill);
}

fn chunk_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::color::Rgba8;
    use crate::mesh::cylinder;

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    /// Split a GLB into its JSON document and binary chunk.
    fn split(glb: &[u8]) -> (Value, &[u8]) {
        let json_len = read_u32(glb, 12) as usize;
        assert_eq!(read_u32(glb, 16), CHUNK_JSON);
        let json = serde_json::from_slice(&glb[20..20 + json_len]).unwrap();

        let bin_at = 20 + json_len;
        let bin_len = read_u32(glb, bin_at) as usize;
        assert_eq!(read_u32(glb, bin_at + 4), CHUNK_BIN);
        (json, &glb[bin_at + 8..bin_at + 8 + bin_len])
    }

    #[test]
    fn test_header_and_chunks() {
        let glb = to_glb(&cylinder(1.0, 2.0, Rgba8::DEFAULT)).unwrap();

        assert_eq!(read_u32(&glb, 0), GLB_MAGIC);
        assert_eq!(&glb[0..4], b"glTF");
        assert_eq!(read_u32(&glb, 4), 2);
        assert_eq!(read_u32(&glb, 8) as usize, glb.len());
        assert_eq!(glb.len() % 4, 0);

        let (json, bin) = split(&glb);
        assert_eq!(json["asset"]["version"], "2.0");
        assert_eq!(json["buffers"][0]["byteLength"].as_u64(), Some(bin.len() as u64));
    }

    #[test]
    fn test_accessors_describe_the_mesh() {
        let mesh = cylinder(0.5, 3.0, Rgba8([255, 0, 0, 255]));
        let glb = to_glb(&mesh).unwrap();
        let (json, bin) = split(&glb);

        let accessors = json["accessors"].as_array().unwrap();
        assert_eq!(accessors[0]["count"].as_u64(), Some(mesh.vertex_count() as u64));
        assert_eq!(accessors[3]["count"].as_u64(), Some(mesh.indices.len() as u64));
        assert_eq!(json["materials"][0]["alphaMode"], "OPAQUE");

        // Colours sit in the third view, one RGBA quad per vertex.
        let view = &json["bufferViews"][2];
        let offset = view["byteOffset"].as_u64().unwrap() as usize;
        assert_eq!(&bin[offset..offset + 4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_positions_are_local_and_y_up() {
        let mut mesh = cylinder(0.5, 3.0, Rgba8::DEFAULT);
        let offset = DVec3::new(500_000.0, 4_000_000.0, 10.0);
        mesh.transform(&glam::DMat4::from_translation(offset));
        let (json, _) = split(&to_glb(&mesh).unwrap());

        // z-up (x, y, z) becomes y-up (x, z, -y).
        let translation: Vec<f64> = json["nodes"][0]["translation"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        let expected = [499_999.5, 10.0, -4_000_000.5];
        for (actual, expected) in translation.iter().zip(expected) {
            assert!((actual - expected).abs() < 1e-6, "{translation:?}");
        }

        let min = &json["accessors"][0]["min"];
        let max = &json["accessors"][0]["max"];
        assert!(min[0].as_f64().unwrap().abs() < 1e-6);
        assert!(min[2].as_f64().unwrap().abs() < 1e-6);
        assert!((max[0].as_f64().unwrap() - 1.0).abs() < 1e-6);
        // Height along +Y, footprint towards +Z from the translated corner.
        assert!((max[1].as_f64().unwrap() - 3.0).abs() < 1e-6);
        assert!((max[2].as_f64().unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_translucent_colors_blend() {
        let (json, _) = split(&to_glb(&cylinder(1.0, 1.0, Rgba8([0, 0, 255, 128]))).unwrap());
        assert_eq!(json["materials"][0]["alphaMode"], "BLEND");
    }

    #[test]
    fn test_empty_mesh_is_an_error() {
        assert!(matches!(
            to_glb(&ColoredMesh::default()),
            Err(PipeError::NoGeometry)
        ));
    }
}
