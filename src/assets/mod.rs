//! CPU-side model assets: scene graph, meshes, skins, materials and animation clips
//!
//! Decoding is done by the `gltf` crate (see `gltf_loader`); this module only
//! holds the result in a shape the renderer and animation player can use.

pub mod animation;
pub mod gltf_loader;
pub mod skin;

pub use animation::{AnimationClip, AnimationPlayer};
pub use gltf_loader::load_model;
pub use skin::Skin;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

/// A scene-graph node with its local transform
#[derive(Debug, Clone)]
pub struct Node {
    pub name: Option<String>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
    /// Index into `ModelAsset::skins` deforming this node's mesh
    pub skin: Option<usize>,
}

impl Node {
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Triangle list with per-vertex position, normal and uv.
///
/// `joints` and `weights` are either empty or one entry per vertex.
#[derive(Debug, Clone, Default)]
pub struct Primitive {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Indices into the owning skin's joint list
    pub joints: Vec<[u16; 4]>,
    pub weights: Vec<Vec4>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

impl Primitive {
    pub fn is_skinned(&self) -> bool {
        !self.joints.is_empty() && self.joints.len() == self.weights.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

/// Base color part of a metallic-roughness material
#[derive(Debug, Clone)]
pub struct Material {
    /// Linear RGBA factor
    pub base_color: Vec4,
    /// Index into `ModelAsset::images`
    pub base_color_image: Option<usize>,
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            base_color_image: None,
            double_sided: false,
        }
    }
}

/// RGBA8 pixels, row-major
#[derive(Debug, Clone)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// 1x1 white image used where a texture is absent or unusable
    pub fn white() -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![255; 4],
        }
    }
}

/// A decoded model: everything one glTF file contributes to the scene
#[derive(Debug, Clone, Default)]
pub struct ModelAsset {
    pub nodes: Vec<Node>,
    /// Root nodes of the scene that gets displayed
    pub roots: Vec<usize>,
    pub meshes: Vec<Mesh>,
    pub skins: Vec<Skin>,
    pub materials: Vec<Material>,
    pub images: Vec<ImageData>,
    pub animations: Vec<AnimationClip>,
}

/// A mesh placed in the world by one node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedMesh {
    pub mesh: usize,
    /// Model matrix for the draw. For skinned meshes this is only the
    /// instance placement; the joints carry the rest.
    pub world: Mat4,
    pub skin: Option<usize>,
}

impl ModelAsset {
    /// World matrix of every node reachable from the roots, relative to `root`.
    ///
    /// Unreachable nodes get `None`. A node reached twice is only visited once.
    fn walk(&self, root: Mat4) -> Vec<Option<Mat4>> {
        let mut world = vec![None; self.nodes.len()];
        let mut stack: Vec<(usize, Mat4)> = self.roots.iter().rev().map(|&r| (r, root)).collect();

        while let Some((index, parent)) = stack.pop() {
            let Some(node) = self.nodes.get(index) else {
                continue;
            };
            if world[index].is_some() {
                continue;
            }
            let matrix = parent * node.local_matrix();
            world[index] = Some(matrix);
            for &child in node.children.iter().rev() {
                stack.push((child, matrix));
            }
        }

        world
    }

    /// Every mesh-carrying node, with `root` (the instance placement) applied
    /// on top of the asset's own hierarchy
    pub fn mesh_instances(&self, root: Mat4) -> Vec<PlacedMesh> {
        self.walk(root)
            .into_iter()
            .enumerate()
            .filter_map(|(index, world)| {
                let world = world?;
                let node = &self.nodes[index];
                let mesh = node.mesh.filter(|&m| m < self.meshes.len())?;
                match node.skin.filter(|&s| s < self.skins.len()) {
                    // Skinned vertices are positioned by their joints
                    Some(skin) => Some(PlacedMesh {
                        mesh,
                        world: root,
                        skin: Some(skin),
                    }),
                    None => Some(PlacedMesh { mesh, world, skin: None }),
                }
            })
            .collect()
    }

    /// Joint matrices of every skin in the current pose, in asset space
    pub fn joint_matrices(&self) -> Vec<Vec<Mat4>> {
        let world: Vec<Mat4> = self
            .walk(Mat4::IDENTITY)
            .into_iter()
            .map(|m| m.unwrap_or(Mat4::IDENTITY))
            .collect();
        self.skins.iter().map(|skin| skin.joint_matrices(&world)).collect()
    }

    pub fn primitive_count(&self) -> usize {
        self.meshes.iter().map(|m| m.primitives.len()).sum()
    }
}

/// Area-weighted smooth normals for an indexed triangle list
pub fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        // Cross product length is twice the triangle area
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }

    normals
        .into_iter()
        .map(|n| {
            let n = n.normalize_or_zero();
            if n == Vec3::ZERO { Vec3::Y } else { n }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(translation: Vec3, children: Vec<usize>, mesh: Option<usize>) -> Node {
        Node {
            name: None,
            translation,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            children,
            mesh,
            skin: None,
        }
    }

    #[test]
    fn test_compute_normals_flat_quad() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(0.0, 0.0, -1.0),
        ];
        let indices = vec![0, 1, 2, 0, 2, 3];

        let normals = compute_normals(&positions, &indices);

        for n in normals {
            assert!((n - Vec3::Y).length() < 1e-5, "unexpected normal {n:?}");
        }
    }

    #[test]
    fn test_compute_normals_unreferenced_vertex() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::NEG_Z, Vec3::splat(5.0)];
        let normals = compute_normals(&positions, &[0, 1, 2]);
        assert_eq!(normals[3], Vec3::Y);
    }

    #[test]
    fn test_mesh_instances_accumulate_parents() {
        let asset = ModelAsset {
            nodes: vec![
                node(Vec3::new(1.0, 0.0, 0.0), vec![1], None),
                node(Vec3::new(0.0, 2.0, 0.0), vec![], Some(0)),
            ],
            roots: vec![0],
            meshes: vec![Mesh::default()],
            ..Default::default()
        };

        let placed = asset.mesh_instances(Mat4::from_translation(Vec3::new(-2.0, 0.0, 0.0)));

        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].mesh, 0);
        assert_eq!(placed[0].skin, None);
        let origin = placed[0].world.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(-1.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_mesh_instances_ignore_bad_indices() {
        let asset = ModelAsset {
            nodes: vec![node(Vec3::ZERO, vec![0, 7], Some(3))],
            roots: vec![0, 9],
            meshes: vec![Mesh::default()],
            ..Default::default()
        };

        // Self-reference, missing child, missing root and missing mesh are all skipped
        assert!(asset.mesh_instances(Mat4::IDENTITY).is_empty());
    }

    #[test]
    fn test_skinned_mesh_uses_placement_and_joint_pose() {
        let mut skinned = node(Vec3::new(5.0, 0.0, 0.0), vec![], Some(0));
        skinned.skin = Some(0);
        let asset = ModelAsset {
            nodes: vec![
                node(Vec3::ZERO, vec![1, 2], None),
                skinned,
                // Joint
                node(Vec3::new(0.0, 3.0, 0.0), vec![], None),
            ],
            roots: vec![0],
            meshes: vec![Mesh::default()],
            skins: vec![Skin {
                joints: vec![2],
                inverse_bind_matrices: vec![Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0))],
            }],
            ..Default::default()
        };

        let placement = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));
        let placed = asset.mesh_instances(placement);
        assert_eq!(placed.len(), 1);
        // The skinned node's own transform is ignored
        assert_eq!(placed[0].world, placement);
        assert_eq!(placed[0].skin, Some(0));

        let joints = asset.joint_matrices();
        let moved = joints[0][0].transform_point3(Vec3::new(0.0, 1.0, 0.0));
        assert!((moved - Vec3::new(0.0, 3.0, 0.0)).length() < 1e-5);
    }
}
