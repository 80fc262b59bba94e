//! Math utilities and types
//!
//! Provides the 3D math types used by transforms and the GPU transform layout.

pub use nalgebra::{
    Vector3,
    Matrix4,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Compose a local matrix as translation * rotation * scale
pub fn compose_trs(position: &Vec3, rotation: &Quat, scale: &Vec3) -> Mat4 {
    Mat4::new_translation(position)
        * rotation.to_homogeneous()
        * Mat4::new_nonuniform_scaling(scale)
}

/// Convert a matrix into column-major arrays suitable for GPU upload
pub fn to_cols_array(matrix: &Mat4) -> [[f32; 4]; 4] {
    let mut cols = [[0.0; 4]; 4];
    for (c, col) in cols.iter_mut().enumerate() {
        for (r, value) in col.iter_mut().enumerate() {
            *value = matrix[(r, c)];
        }
    }
    cols
}

/// Rebuild a matrix from column-major arrays
pub fn from_cols_array(cols: &[[f32; 4]; 4]) -> Mat4 {
    Mat4::from_fn(|r, c| cols[c][r])
}
