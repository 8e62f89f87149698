use glam::{Affine3A, EulerRot, Mat4, Quat, Vec3};

/// Position / rotation / scale with a cached local matrix.
#[derive(Debug, Clone)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,

    local_matrix: Affine3A,
    last_position: Vec3,
    last_rotation: Quat,
    last_scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            local_matrix: Affine3A::IDENTITY,
            last_position: Vec3::ZERO,
            last_rotation: Quat::IDENTITY,
            last_scale: Vec3::ONE,
        }
    }

    /// Recomputes the local matrix if any component changed.
    /// Returns whether it changed.
    pub fn update_local_matrix(&mut self) -> bool {
        let changed = self.position != self.last_position
            || self.rotation != self.last_rotation
            || self.scale != self.last_scale;

        if changed {
            self.local_matrix =
                Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position);
            self.last_position = self.position;
            self.last_rotation = self.rotation;
            self.last_scale = self.scale;
        }
        changed
    }

    pub fn set_rotation_euler(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Quat::from_euler(EulerRot::XYZ, x, y, z);
    }

    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.scale = Vec3::splat(scale);
    }

    /// Model matrix, refreshed if stale.
    pub fn matrix(&mut self) -> Mat4 {
        self.update_local_matrix();
        Mat4::from(self.local_matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_tracks_component_changes() {
        let mut transform = Transform::new();
        assert!(!transform.update_local_matrix());

        transform.set_uniform_scale(0.1);
        transform.position = Vec3::new(0.0, 1.0, 0.0);
        let m = transform.matrix();
        assert!((m.transform_point3(Vec3::X) - Vec3::new(0.1, 1.0, 0.0)).length() < 1e-6);
        assert!(!transform.update_local_matrix());
    }
}
