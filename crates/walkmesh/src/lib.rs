//! Walk-mesh navigation: math re-exports, WalkMesh, WalkPoint.
//!
//! Constrains an agent's movement to a triangulated surface embedded in 3D
//! space, crossing triangle seams with the correct reorientation.

pub use glam::{Quat, UVec3, Vec3, uvec3, vec3};

pub mod geometry;
pub mod mesh;

pub use mesh::{MAX_CROSSINGS, MeshError, Walk, WalkMesh, WalkPoint};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_point_world_position_is_the_weighted_corner_sum() {
        let mesh = WalkMesh::new(
            vec![vec3(0.0, 0.0, 0.0), vec3(2.0, 0.0, 0.0), vec3(0.0, 2.0, 0.0)],
            vec![Vec3::Z; 3],
            vec![uvec3(0, 1, 2)],
        )
        .unwrap();
        let centroid = WalkPoint::new(uvec3(0, 1, 2), Vec3::splat(1.0 / 3.0));
        let world = mesh.to_world(&centroid);
        assert!(world.distance(vec3(2.0 / 3.0, 2.0 / 3.0, 0.0)) < 1e-6);
    }

    #[test]
    fn shared_read_only_access_is_allowed() {
        fn assert_sync<T: Sync + Send>() {}
        assert_sync::<WalkMesh>();
    }
}
