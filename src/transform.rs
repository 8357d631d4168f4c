// SPDX-License-Identifier: MPL-2.0

use std::cell::Cell;

use glam::{Mat3, Mat4, Vec3};

/// The placement of an object in world space.
#[derive(Clone, Debug)]
pub struct Transform {
    /// The position of the object in world space.
    position: Vec3,
    /// Euler rotation, in radians, about the X, Y and Z axes.
    rotation: Vec3,
    /// Per-axis scale factors. A scale of 1 represents the original mesh size.
    scale: Vec3,
    /// The model matrix from a previous call to [`model_matrix`](Self::model_matrix), if no
    /// component has been borrowed mutably since.
    cached_matrix: Cell<Option<Mat4>>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            cached_matrix: Cell::new(None),
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn position_mut(&mut self) -> &mut Vec3 {
        self.invalidate_cache();
        &mut self.position
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn rotation_mut(&mut self) -> &mut Vec3 {
        self.invalidate_cache();
        &mut self.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn scale_mut(&mut self) -> &mut Vec3 {
        self.invalidate_cache();
        &mut self.scale
    }

    pub fn is_cached(&self) -> bool {
        self.cached_matrix.get().is_some()
    }

    fn invalidate_cache(&self) {
        self.cached_matrix.set(None);
    }

    /// The mesh-to-world matrix for this transform.
    ///
    /// This will return a cached copy if one is available.
    pub fn model_matrix(&self) -> Mat4 {
        if let Some(matrix) = self.cached_matrix.get() {
            return matrix;
        }

        let matrix = self.create_model_matrix();
        self.cached_matrix.set(Some(matrix));

        matrix
    }

    /// The matrix that carries mesh-space normals into world space: the inverse transpose of the
    /// model matrix's upper 3x3. Unlike the model matrix, it keeps normals perpendicular to their
    /// surface under non-uniform scale.
    pub fn normal_matrix(&self) -> Mat3 {
        Mat3::from_mat4(self.model_matrix()).inverse().transpose()
    }

    fn create_model_matrix(&self) -> Mat4 {
        // Post-multiplication: the scale is applied first, then the rotation, then the
        // translation.
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_z(self.rotation.z)
            * Mat4::from_scale(self.scale)
    }
}
