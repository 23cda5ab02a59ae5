//! glTF 2.0 / GLB model loading
//!
//! `gltf::import` resolves buffers and decodes images; this module converts
//! the document into a `ModelAsset`.

use anyhow::{Context, Result, ensure};
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use gltf::animation::util::ReadOutputs;
use gltf::image::Format;
use std::path::Path;

use super::animation::{AnimationClip, Channel, ChannelValues, Interpolation};
use super::{ImageData, Material, Mesh, ModelAsset, Node, Primitive, Skin, compute_normals};

/// Load a model from a `.glb` or `.gltf` file
pub fn load_model(path: &Path) -> Result<ModelAsset> {
    let (document, buffers, images) =
        gltf::import(path).with_context(|| format!("Failed to import {}", path.display()))?;
    convert(&document, &buffers, &images).with_context(|| format!("Failed to convert {}", path.display()))
}

/// Load a model from in-memory GLB or self-contained glTF bytes
#[cfg(test)]
pub fn load_model_slice(bytes: &[u8]) -> Result<ModelAsset> {
    let (document, buffers, images) = gltf::import_slice(bytes).context("Failed to import glTF data")?;
    convert(&document, &buffers, &images)
}

fn convert(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    images: &[gltf::image::Data],
) -> Result<ModelAsset> {
    let nodes: Vec<Node> = document.nodes().map(convert_node).collect();
    let roots = scene_roots(document, &nodes);

    let meshes = document
        .meshes()
        .map(|mesh| convert_mesh(&mesh, buffers))
        .collect::<Result<Vec<_>>>()?;

    let skins = document.skins().map(|skin| convert_skin(&skin, buffers)).collect();
    let materials = document.materials().map(|m| convert_material(&m)).collect();
    let images = images.iter().map(convert_image).collect();

    let animations = document
        .animations()
        .map(|anim| convert_animation(&anim, buffers))
        .collect();

    Ok(ModelAsset {
        nodes,
        roots,
        meshes,
        skins,
        materials,
        images,
        animations,
    })
}

fn convert_node(node: gltf::Node) -> Node {
    let (translation, rotation, scale) = node.transform().decomposed();
    Node {
        name: node.name().map(str::to_string),
        translation: Vec3::from(translation),
        rotation: Quat::from_array(rotation).normalize(),
        scale: Vec3::from(scale),
        children: node.children().map(|c| c.index()).collect(),
        mesh: node.mesh().map(|m| m.index()),
        skin: node.skin().map(|s| s.index()),
    }
}

/// Roots of the default scene, else the first scene, else every parentless node
fn scene_roots(document: &gltf::Document, nodes: &[Node]) -> Vec<usize> {
    if let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) {
        return scene.nodes().map(|n| n.index()).collect();
    }

    let mut has_parent = vec![false; nodes.len()];
    for node in nodes {
        for &child in &node.children {
            if let Some(flag) = has_parent.get_mut(child) {
                *flag = true;
            }
        }
    }
    (0..nodes.len()).filter(|&i| !has_parent[i]).collect()
}

fn convert_mesh(mesh: &gltf::Mesh, buffers: &[gltf::buffer::Data]) -> Result<Mesh> {
    let mut primitives = Vec::new();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!(
                "Skipping {:?} primitive in mesh {}",
                primitive.mode(),
                mesh.name().unwrap_or("<unnamed>")
            );
            continue;
        }
        primitives.push(
            convert_primitive(&primitive, buffers)
                .with_context(|| format!("Mesh {} primitive {}", mesh.index(), primitive.index()))?,
        );
    }

    Ok(Mesh {
        name: mesh.name().map(str::to_string),
        primitives,
    })
}

fn convert_primitive(primitive: &gltf::Primitive, buffers: &[gltf::buffer::Data]) -> Result<Primitive> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data[..]));

    let positions: Vec<Vec3> = reader
        .read_positions()
        .context("Primitive has no positions")?
        .map(Vec3::from)
        .collect();
    let count = positions.len();

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..count as u32).collect(),
    };
    ensure!(
        indices.iter().all(|&i| (i as usize) < count),
        "Index out of range for {} vertices",
        count
    );

    let normals = match reader.read_normals() {
        Some(normals) => {
            let normals: Vec<Vec3> = normals.map(Vec3::from).collect();
            if normals.len() == count {
                normals
            } else {
                compute_normals(&positions, &indices)
            }
        }
        None => compute_normals(&positions, &indices),
    };

    let uvs = match reader.read_tex_coords(0) {
        Some(coords) => {
            let uvs: Vec<Vec2> = coords.into_f32().map(Vec2::from).collect();
            if uvs.len() == count { uvs } else { vec![Vec2::ZERO; count] }
        }
        None => vec![Vec2::ZERO; count],
    };

    let joints: Vec<[u16; 4]> = reader
        .read_joints(0)
        .map(|joints| joints.into_u16().collect())
        .unwrap_or_default();
    let weights: Vec<Vec4> = reader
        .read_weights(0)
        .map(|weights| weights.into_f32().map(Vec4::from).collect())
        .unwrap_or_default();
    let (joints, weights) = if joints.len() == count && weights.len() == count {
        (joints, weights)
    } else {
        if !joints.is_empty() || !weights.is_empty() {
            log::warn!("Ignoring skin attributes that do not cover all {} vertices", count);
        }
        (Vec::new(), Vec::new())
    };

    Ok(Primitive {
        positions,
        normals,
        uvs,
        joints,
        weights,
        indices,
        material: primitive.material().index(),
    })
}

fn convert_skin(skin: &gltf::Skin, buffers: &[gltf::buffer::Data]) -> Skin {
    let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(|data| &data[..]));
    let joints: Vec<usize> = skin.joints().map(|joint| joint.index()).collect();
    let inverse_bind_matrices = match reader.read_inverse_bind_matrices() {
        Some(matrices) => matrices.map(|m| Mat4::from_cols_array_2d(&m)).collect(),
        None => vec![Mat4::IDENTITY; joints.len()],
    };

    Skin {
        joints,
        inverse_bind_matrices,
    }
}

fn convert_material(material: &gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    Material {
        base_color: Vec4::from(pbr.base_color_factor()),
        base_color_image: pbr.base_color_texture().map(|info| info.texture().source().index()),
        double_sided: material.double_sided(),
    }
}

/// Expand any 8- or 16-bit image to RGBA8
fn convert_image(image: &gltf::image::Data) -> ImageData {
    let pixel_count = (image.width * image.height) as usize;
    let (channels, bytes_per_channel) = match image.format {
        Format::R8 => (1, 1),
        Format::R8G8 => (2, 1),
        Format::R8G8B8 => (3, 1),
        Format::R8G8B8A8 => (4, 1),
        Format::R16 => (1, 2),
        Format::R16G16 => (2, 2),
        Format::R16G16B16 => (3, 2),
        Format::R16G16B16A16 => (4, 2),
        other => {
            log::warn!("Unsupported image format {:?}, using white", other);
            return ImageData::white();
        }
    };

    let stride = channels * bytes_per_channel;
    if image.pixels.len() < pixel_count * stride {
        log::warn!("Truncated {}x{} image, using white", image.width, image.height);
        return ImageData::white();
    }

    let mut pixels = Vec::with_capacity(pixel_count * 4);
    for texel in image.pixels.chunks_exact(stride).take(pixel_count) {
        // 16-bit channels are little endian; keep the high byte
        let channel = |c: usize| texel[c * bytes_per_channel + bytes_per_channel - 1];
        let rgba = match channels {
            1 => [channel(0), channel(0), channel(0), 255],
            2 => [channel(0), channel(0), channel(0), channel(1)],
            3 => [channel(0), channel(1), channel(2), 255],
            _ => [channel(0), channel(1), channel(2), channel(3)],
        };
        pixels.extend_from_slice(&rgba);
    }

    ImageData {
        width: image.width,
        height: image.height,
        pixels,
    }
}

fn convert_animation(animation: &gltf::Animation, buffers: &[gltf::buffer::Data]) -> AnimationClip {
    let mut channels = Vec::new();

    for channel in animation.channels() {
        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|data| &data[..]));

        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let times: Vec<f32> = inputs.collect();

        let values = match reader.read_outputs() {
            Some(ReadOutputs::Translations(it)) => ChannelValues::Translations(it.map(Vec3::from).collect()),
            Some(ReadOutputs::Rotations(it)) => {
                ChannelValues::Rotations(it.into_f32().map(Quat::from_array).collect())
            }
            Some(ReadOutputs::Scales(it)) => ChannelValues::Scales(it.map(Vec3::from).collect()),
            Some(ReadOutputs::MorphTargetWeights(_)) => {
                log::warn!(
                    "Skipping morph target channel in animation {}",
                    animation.name().unwrap_or("<unnamed>")
                );
                continue;
            }
            None => continue,
        };

        let interpolation = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Step => Interpolation::Step,
            gltf::animation::Interpolation::Linear => Interpolation::Linear,
            gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
        };

        channels.push(Channel {
            node: channel.target().node().index(),
            interpolation,
            times,
            values,
        });
    }

    AnimationClip::new(animation.name().map(str::to_string), channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One triangle in the y=0 plane without normals or indices, plus a
    /// two-key translation animation on its node.
    const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ { "nodes": [0] } ],
        "nodes": [ { "name": "tri", "mesh": 0, "translation": [0.0, 1.0, 0.0] } ],
        "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 }, "material": 0 } ] } ],
        "materials": [ { "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.5, 0.25, 1.0] } } ],
        "animations": [ {
            "name": "bob",
            "channels": [ { "sampler": 0, "target": { "node": 0, "path": "translation" } } ],
            "samplers": [ { "input": 1, "output": 2, "interpolation": "LINEAR" } ]
        } ],
        "buffers": [ {
            "byteLength": 68,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAAAAAAIC/AAAAAAAAgD8AAAAAAAAAAAAAAAAAAAAAAAAAQAAAAAA="
        } ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 44, "byteLength": 24 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, -1.0], "max": [1.0, 0.0, 0.0] },
            { "bufferView": 1, "componentType": 5126, "count": 2, "type": "SCALAR",
              "min": [0.0], "max": [1.0] },
            { "bufferView": 2, "componentType": 5126, "count": 2, "type": "VEC3" }
        ]
    }"#;

    #[test]
    fn test_load_embedded_triangle() {
        let asset = load_model_slice(TRIANGLE_GLTF.as_bytes()).unwrap();

        assert_eq!(asset.roots, vec![0]);
        assert_eq!(asset.nodes[0].name.as_deref(), Some("tri"));
        assert_eq!(asset.nodes[0].translation, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(asset.meshes.len(), 1);

        let primitive = &asset.meshes[0].primitives[0];
        assert_eq!(primitive.positions.len(), 3);
        // Non-indexed geometry gets sequential indices
        assert_eq!(primitive.indices, vec![0, 1, 2]);
        assert_eq!(primitive.uvs, vec![Vec2::ZERO; 3]);
        assert_eq!(primitive.material, Some(0));
        for n in &primitive.normals {
            assert!((*n - Vec3::Y).length() < 1e-5);
        }

        assert_eq!(asset.materials[0].base_color, Vec4::new(1.0, 0.5, 0.25, 1.0));
        assert!(asset.materials[0].base_color_image.is_none());
    }

    #[test]
    fn test_load_animation_channels() {
        let asset = load_model_slice(TRIANGLE_GLTF.as_bytes()).unwrap();

        assert_eq!(asset.animations.len(), 1);
        let clip = &asset.animations[0];
        assert_eq!(clip.name.as_deref(), Some("bob"));
        assert_eq!(clip.duration, 1.0);

        let channel = &clip.channels[0];
        assert_eq!(channel.node, 0);
        assert_eq!(channel.interpolation, Interpolation::Linear);
        match &channel.values {
            ChannelValues::Translations(values) => {
                assert_eq!(values, &vec![Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0)]);
            }
            other => panic!("expected translations, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(load_model_slice(&[]).is_err());
        assert!(load_model_slice(b"not a model").is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_model(Path::new("does/not/exist.glb")).unwrap_err();
        assert!(format!("{err:#}").contains("exist.glb"));
    }

    #[test]
    fn test_convert_rgb_image() {
        let image = gltf::image::Data {
            pixels: vec![10, 20, 30, 40, 50, 60],
            format: Format::R8G8B8,
            width: 2,
            height: 1,
        };

        let converted = convert_image(&image);

        assert_eq!(converted.pixels, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn test_convert_truncated_image_falls_back_to_white() {
        let image = gltf::image::Data {
            pixels: vec![1, 2, 3],
            format: Format::R8G8B8A8,
            width: 4,
            height: 4,
        };

        let converted = convert_image(&image);

        assert_eq!((converted.width, converted.height), (1, 1));
        assert_eq!(converted.pixels, vec![255; 4]);
    }

    /// Pack a JSON document and its binary buffer into a GLB container
    fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }

    /// Triangle bound to a single joint, stored in a GLB binary chunk
    fn skinned_triangle_glb() -> Vec<u8> {
        let mut bin = Vec::new();
        for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]] {
            for c in p {
                bin.extend_from_slice(&c.to_le_bytes());
            }
        }
        for _ in 0..3 {
            for j in [0u16; 4] {
                bin.extend_from_slice(&j.to_le_bytes());
            }
        }
        for _ in 0..3 {
            for w in [1.0f32, 0.0, 0.0, 0.0] {
                bin.extend_from_slice(&w.to_le_bytes());
            }
        }
        for c in Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)).to_cols_array() {
            bin.extend_from_slice(&c.to_le_bytes());
        }
        assert_eq!(bin.len(), 172);

        let json = r#"{
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [ { "nodes": [0, 1] } ],
            "nodes": [
                { "name": "body", "mesh": 0, "skin": 0 },
                { "name": "bone", "translation": [0.0, 1.0, 0.0] }
            ],
            "skins": [ { "joints": [1], "inverseBindMatrices": 3 } ],
            "meshes": [ { "primitives": [ {
                "attributes": { "POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2 }
            } ] } ],
            "buffers": [ { "byteLength": 172 } ],
            "bufferViews": [
                { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
                { "buffer": 0, "byteOffset": 36, "byteLength": 24 },
                { "buffer": 0, "byteOffset": 60, "byteLength": 48 },
                { "buffer": 0, "byteOffset": 108, "byteLength": 64 }
            ],
            "accessors": [
                { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                  "min": [0.0, 0.0, -1.0], "max": [1.0, 0.0, 0.0] },
                { "bufferView": 1, "componentType": 5123, "count": 3, "type": "VEC4" },
                { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4" },
                { "bufferView": 3, "componentType": 5126, "count": 1, "type": "MAT4" }
            ]
        }"#;

        glb(json, &bin)
    }

    #[test]
    fn test_load_glb_container() {
        let asset = load_model_slice(&skinned_triangle_glb()).unwrap();

        assert_eq!(asset.roots, vec![0, 1]);
        let primitive = &asset.meshes[0].primitives[0];
        assert_eq!(primitive.positions.len(), 3);
        assert_eq!(primitive.indices, vec![0, 1, 2]);
        for n in &primitive.normals {
            assert!((*n - Vec3::Y).length() < 1e-5);
        }
    }

    #[test]
    fn test_load_skin() {
        let asset = load_model_slice(&skinned_triangle_glb()).unwrap();

        assert_eq!(asset.nodes[0].skin, Some(0));
        assert_eq!(asset.skins.len(), 1);
        assert_eq!(asset.skins[0].joints, vec![1]);

        let primitive = &asset.meshes[0].primitives[0];
        assert!(primitive.is_skinned());
        assert_eq!(primitive.joints, vec![[0u16; 4]; 3]);
        assert_eq!(primitive.weights, vec![Vec4::X; 3]);

        // In the bind pose the joint cancels its inverse bind matrix
        let joints = asset.joint_matrices();
        let p = joints[0][0].transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
    }
}
