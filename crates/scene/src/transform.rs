//! Transform component for scene entities.
//!
//! This module provides the [`Transform`] struct for representing position,
//! rotation, and scale of an entity, and the normal-matrix helper shared with
//! the uniform packer.
//!
//! # Example
//!
//! ```
//! use prism_scene::Transform;
//! use glam::Vec3;
//!
//! let transform = Transform::new()
//!     .with_position(Vec3::new(1.0, 0.0, 0.0))
//!     .with_scale(Vec3::new(1.0, 2.0, 1.0));
//!
//! let world = transform.world_matrix();
//! assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(1.0, 0.0, 0.0));
//! ```

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Determinant below which a model matrix is treated as singular.
const SINGULAR_EPSILON: f32 = 1e-6;

/// Computes the normal matrix (inverse transpose) of a model matrix.
///
/// Normals transformed by the model matrix itself are skewed by non-uniform
/// scale; the inverse transpose keeps them perpendicular to the surface.
///
/// # Non-invertible matrices
///
/// If the model matrix is not invertible (e.g., contains zero scale), the
/// identity matrix is returned so no NaN/Inf reaches the shaders.
pub fn normal_matrix(model: Mat4) -> Mat4 {
    if model.determinant().abs() < SINGULAR_EPSILON {
        Mat4::IDENTITY
    } else {
        model.inverse().transpose()
    }
}

/// Position, rotation and scale of an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Position in world space
    pub position: Vec3,
    /// Rotation as a quaternion
    pub rotation: Quat,
    /// Scale factor per axis
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transform with the given position.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Create a transform with the given rotation.
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Create a transform with the given scale.
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Create a transform with a uniform scale.
    pub fn with_uniform_scale(self, scale: f32) -> Self {
        self.with_scale(Vec3::splat(scale))
    }

    /// Rotation as XYZ Euler angles in degrees, the form editors expose.
    pub fn euler_degrees(&self) -> Vec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
    }

    /// Set the rotation from XYZ Euler angles in degrees.
    pub fn set_euler_degrees(&mut self, degrees: Vec3) {
        self.rotation = Quat::from_euler(
            EulerRot::XYZ,
            degrees.x.to_radians(),
            degrees.y.to_radians(),
            degrees.z.to_radians(),
        );
    }

    /// Rotate around the world Y axis.
    pub fn rotate_y(&mut self, radians: f32) {
        self.rotation = Quat::from_rotation_y(radians) * self.rotation;
    }

    /// Get the world transformation matrix (scale, then rotate, then translate).
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Get the normal matrix of [`world_matrix`](Self::world_matrix).
    pub fn normal_matrix(&self) -> Mat4 {
        normal_matrix(self.world_matrix())
    }

    /// Get the forward direction vector.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < EPSILON
    }

    #[test]
    fn test_transform_default() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.world_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_transform_builder() {
        let t = Transform::new()
            .with_position(Vec3::new(1.0, 2.0, 3.0))
            .with_uniform_scale(2.0);

        assert_eq!(t.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.scale, Vec3::splat(2.0));
    }

    #[test]
    fn test_world_matrix_order() {
        let t = Transform::new()
            .with_position(Vec3::new(10.0, 0.0, 0.0))
            .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2))
            .with_uniform_scale(2.0);

        // (1, 0, 0) scaled to (2, 0, 0), rotated to (0, 0, -2), moved by +10 X
        let p = t.world_matrix().transform_point3(Vec3::X);
        assert!(approx_eq_vec3(p, Vec3::new(10.0, 0.0, -2.0)), "got {p:?}");
    }

    #[test]
    fn test_normal_matrix_identity() {
        assert_eq!(Transform::default().normal_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_normal_matrix_with_non_uniform_scale() {
        let t = Transform::new().with_scale(Vec3::new(1.0, 2.0, 1.0));
        let model = t.world_matrix();
        let normal = t.normal_matrix();

        assert_eq!(normal, model.inverse().transpose());
        assert_ne!(normal, model);

        // A 45 degree surface normal stays perpendicular to the stretched surface
        let n = normal.transform_vector3(Vec3::new(1.0, 1.0, 0.0)).normalize();
        let tangent = model.transform_vector3(Vec3::new(1.0, -1.0, 0.0));
        assert!(n.dot(tangent).abs() < EPSILON);
        let naive = model.transform_vector3(Vec3::new(1.0, 1.0, 0.0));
        assert!(naive.dot(tangent).abs() > 0.1);
    }

    #[test]
    fn test_normal_matrix_non_invertible() {
        let t = Transform::new().with_scale(Vec3::ZERO);
        let normal = t.normal_matrix();

        assert_eq!(normal, Mat4::IDENTITY);
        assert!(!normal.is_nan());
    }

    #[test]
    fn test_euler_round_trip() {
        let mut t = Transform::new();
        t.set_euler_degrees(Vec3::new(0.0, 30.0, 0.0));
        let expected = Vec3::new(-0.5, 0.0, -(3.0f32.sqrt() / 2.0));
        assert!(approx_eq_vec3(t.forward(), expected), "got {:?}", t.forward());
        let degrees = t.euler_degrees();
        assert!((degrees - Vec3::new(0.0, 30.0, 0.0)).abs().max_element() < 1e-3);
    }

    #[test]
    fn test_rotate_y() {
        let mut t = Transform::new();
        t.rotate_y(std::f32::consts::PI);
        assert!(approx_eq_vec3(t.forward(), Vec3::Z));
    }
}
