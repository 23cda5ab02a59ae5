//! Skeletal skins: joint nodes and their inverse bind matrices

use glam::Mat4;

#[derive(Debug, Clone, Default)]
pub struct Skin {
    /// Node index of each joint
    pub joints: Vec<usize>,
    /// One per joint; missing entries are identity
    pub inverse_bind_matrices: Vec<Mat4>,
}

impl Skin {
    /// `joint world * inverse bind` for every joint, given per-node world matrices
    pub fn joint_matrices(&self, world: &[Mat4]) -> Vec<Mat4> {
        self.joints
            .iter()
            .enumerate()
            .map(|(i, &node)| {
                let joint = world.get(node).copied().unwrap_or(Mat4::IDENTITY);
                let inverse_bind = self
                    .inverse_bind_matrices
                    .get(i)
                    .copied()
                    .unwrap_or(Mat4::IDENTITY);
                joint * inverse_bind
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_joint_matrices_apply_inverse_bind() {
        let skin = Skin {
            joints: vec![1, 0],
            inverse_bind_matrices: vec![Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0))],
        };
        let world = [Mat4::IDENTITY, Mat4::from_translation(Vec3::new(1.0, 2.0, 0.0))];

        let matrices = skin.joint_matrices(&world);

        assert_eq!(matrices.len(), 2);
        let p = matrices[0].transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
        // Missing inverse bind matrix is identity
        assert_eq!(matrices[1], Mat4::IDENTITY);
    }
}
