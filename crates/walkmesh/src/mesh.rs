//! Walk mesh: an immutable triangulated surface an agent can move across.
//!
//! Movement is expressed in barycentric coordinates so an agent can never
//! leave the surface: [`WalkMesh::walk_in_triangle`] clips a world-space
//! step at the first edge it crosses, and [`WalkMesh::cross_edge`] hops to
//! the neighboring triangle and reports the rotation that keeps the rest of
//! the step tangent to the new plane.

use std::collections::HashMap;

use glam::{Quat, UVec3, Vec3};
use thiserror::Error;

use crate::geometry::{barycentric_weights, closest_point_on_segment};

/// Most edge hops [`WalkMesh::walk`] resolves for a single displacement.
pub const MAX_CROSSINGS: usize = 16;

/// A location on a walk mesh: a triangle of the mesh (possibly cyclically
/// permuted) plus barycentric weights within that triangle.
///
/// `weights.z == 0.0` means the point lies exactly on the directed edge
/// `(indices.x, indices.y)`; that is the form [`WalkMesh::cross_edge`]
/// expects, and the form [`WalkMesh::walk_in_triangle`] produces whenever a
/// step reaches an edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WalkPoint {
    pub indices: UVec3,
    pub weights: Vec3,
}

impl WalkPoint {
    pub fn new(indices: UVec3, weights: Vec3) -> Self {
        Self { indices, weights }
    }
}

/// Rejected inputs to [`WalkMesh::new`].
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("{vertices} vertices but {normals} normals")]
    CountMismatch { vertices: usize, normals: usize },
    #[error("triangle {triangle} references vertex {index}, but there are only {count} vertices")]
    IndexOutOfBounds {
        triangle: usize,
        index: u32,
        count: usize,
    },
    #[error("triangle {0} has zero area")]
    DegenerateTriangle(usize),
    #[error("triangle {0}'s winding disagrees with its vertex normals")]
    InconsistentNormals(usize),
    #[error("directed edge ({a}, {b}) is owned by more than one triangle")]
    DuplicateEdge { a: u32, b: u32 },
}

/// Result of a bounded multi-crossing [`WalkMesh::walk`].
#[derive(Clone, Copy, Debug)]
pub struct Walk {
    pub end: WalkPoint,
    /// Composed reorientation from every seam crossed along the way; apply
    /// it to the agent's facing (and to any carried direction vectors).
    pub rotation: Quat,
    /// True when a boundary edge stopped the walk before the step ran out.
    pub blocked: bool,
}

/// Immutable triangulated surface with per-vertex normals and a
/// directed-edge adjacency map.
#[derive(Clone, Debug)]
pub struct WalkMesh {
    vertices: Vec<Vec3>,
    normals: Vec<Vec3>,
    triangles: Vec<UVec3>,
    /// Directed edge (a, b) -> third vertex of the triangle that owns it.
    /// The reverse edge (b, a) names the triangle on the other side; its
    /// absence marks a boundary edge.
    next_vertex: HashMap<(u32, u32), u32>,
}

impl WalkMesh {
    /// Build a walk mesh from validated buffers.
    ///
    /// Rejects mismatched buffer sizes, out-of-range indices, zero-area
    /// triangles, triangles whose geometric normal disagrees with any of
    /// their vertex normals, and directed edges shared by more than one
    /// triangle (non-manifold or inconsistently wound input).
    pub fn new(
        vertices: Vec<Vec3>,
        normals: Vec<Vec3>,
        triangles: Vec<UVec3>,
    ) -> Result<Self, MeshError> {
        if vertices.len() != normals.len() {
            return Err(MeshError::CountMismatch {
                vertices: vertices.len(),
                normals: normals.len(),
            });
        }

        for (triangle, tri) in triangles.iter().enumerate() {
            for index in [tri.x, tri.y, tri.z] {
                if index as usize >= vertices.len() {
                    return Err(MeshError::IndexOutOfBounds {
                        triangle,
                        index,
                        count: vertices.len(),
                    });
                }
            }
        }

        let mut next_vertex = HashMap::with_capacity(triangles.len() * 3);
        for tri in &triangles {
            for (a, b, c) in [
                (tri.x, tri.y, tri.z),
                (tri.y, tri.z, tri.x),
                (tri.z, tri.x, tri.y),
            ] {
                if next_vertex.insert((a, b), c).is_some() {
                    return Err(MeshError::DuplicateEdge { a, b });
                }
            }
        }

        // Vertex normals must agree with the winding of every triangle that
        // touches them; anything else makes nearest-point results ambiguous.
        for (triangle, tri) in triangles.iter().enumerate() {
            let a = vertices[tri.x as usize];
            let b = vertices[tri.y as usize];
            let c = vertices[tri.z as usize];
            let out = (b - a)
                .cross(c - a)
                .try_normalize()
                .ok_or(MeshError::DegenerateTriangle(triangle))?;
            let consistent = [tri.x, tri.y, tri.z]
                .into_iter()
                .all(|i| out.dot(normals[i as usize]) > 0.0);
            if !consistent {
                return Err(MeshError::InconsistentNormals(triangle));
            }
        }

        Ok(Self {
            vertices,
            normals,
            triangles,
            next_vertex,
        })
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn triangles(&self) -> &[UVec3] {
        &self.triangles
    }

    fn corners(&self, indices: UVec3) -> [Vec3; 3] {
        [
            self.vertices[indices.x as usize],
            self.vertices[indices.y as usize],
            self.vertices[indices.z as usize],
        ]
    }

    fn face_normal(&self, indices: UVec3) -> Vec3 {
        let [a, b, c] = self.corners(indices);
        (b - a).cross(c - a).normalize()
    }

    /// World position of a walk point: its triangle's corners weighted by
    /// its barycentric coordinates.
    pub fn to_world(&self, point: &WalkPoint) -> Vec3 {
        let [a, b, c] = self.corners(point.indices);
        point.weights.x * a + point.weights.y * b + point.weights.z * c
    }

    /// Closest point on the surface to an arbitrary world position.
    ///
    /// Brute force over every triangle; walk meshes are small and this runs
    /// once per agent placement, not per frame. Panics on an empty mesh.
    pub fn nearest_walk_point(&self, world_point: Vec3) -> WalkPoint {
        assert!(
            !self.triangles.is_empty(),
            "nearest_walk_point on an empty walk mesh"
        );

        let mut closest = WalkPoint::new(UVec3::ZERO, Vec3::ZERO);
        let mut closest_dist2 = f32::INFINITY;

        for &tri in &self.triangles {
            let [a, b, c] = self.corners(tri);
            let coords = barycentric_weights(a, b, c, world_point);

            if coords.min_element() >= 0.0 {
                // projection lands inside this triangle
                let on_plane = coords.x * a + coords.y * b + coords.z * c;
                let dist2 = world_point.distance_squared(on_plane);
                if dist2 < closest_dist2 {
                    closest_dist2 = dist2;
                    closest = WalkPoint::new(tri, coords);
                }
            } else {
                // closest point is on an edge or vertex; the off-edge vertex
                // rides along in the third slot so the labeling stays valid
                for (p, q, r) in [
                    (tri.x, tri.y, tri.z),
                    (tri.y, tri.z, tri.x),
                    (tri.z, tri.x, tri.y),
                ] {
                    let (on_edge, t) = closest_point_on_segment(
                        self.vertices[p as usize],
                        self.vertices[q as usize],
                        world_point,
                    );
                    let dist2 = world_point.distance_squared(on_edge);
                    if dist2 < closest_dist2 {
                        closest_dist2 = dist2;
                        closest =
                            WalkPoint::new(UVec3::new(p, q, r), Vec3::new(1.0 - t, t, 0.0));
                    }
                }
            }
        }

        closest
    }

    /// Advance `start` by the world-space `step`, clipped to `start`'s
    /// triangle. Returns the end point and the fraction of `step` consumed.
    ///
    /// A fraction below 1 means the path reached an edge: the end point has
    /// `weights.z` forced to exactly 0 and its indices cyclically permuted
    /// so the crossed edge is the `(x, y)` pair, ready for [`Self::cross_edge`].
    /// The caller owns the remaining `(1 - fraction) * step`.
    ///
    /// `start` must lie inside (or on the boundary of) its triangle; a
    /// start already outside produces a non-positive crossing time, which
    /// panics.
    pub fn walk_in_triangle(&self, start: &WalkPoint, step: Vec3) -> (WalkPoint, f32) {
        let [a, b, c] = self.corners(start.indices);
        let dest = self.to_world(start) + step;
        let dest_bary = barycentric_weights(a, b, c, dest);

        // The first weight to reach zero decides which edge the path leaves
        // through. A weight moving from 0 to 0 divides to NaN and loses the
        // comparison, which is what we want: sliding along an edge is not a
        // crossing.
        let mut min_time = f32::INFINITY;
        let mut crossed = None;
        for axis in 0..3 {
            let dest_w = dest_bary[axis];
            if dest_w > 0.0 {
                continue;
            }
            let start_w = start.weights[axis];
            let time = -start_w / (dest_w - start_w);
            if time < min_time {
                min_time = time;
                crossed = Some(axis);
            }
        }

        let time = min_time.min(1.0);
        assert!(time > 0.0, "walk_in_triangle from a point outside its triangle");
        let weights = start.weights + time * (dest_bary - start.weights);

        // Relabel so the crossed edge lands in the (x, y) slots, with the
        // opposite weight exactly zero rather than floating-point residue.
        let end = match crossed {
            Some(0) => WalkPoint::new(
                UVec3::new(start.indices.y, start.indices.z, start.indices.x),
                Vec3::new(weights.y, weights.z, 0.0),
            ),
            Some(1) => WalkPoint::new(
                UVec3::new(start.indices.z, start.indices.x, start.indices.y),
                Vec3::new(weights.z, weights.x, 0.0),
            ),
            Some(2) => WalkPoint::new(start.indices, Vec3::new(weights.x, weights.y, 0.0)),
            Some(_) => unreachable!(),
            None => WalkPoint::new(start.indices, weights),
        };
        (end, time)
    }

    /// Hop a point sitting on the `(x, y)` edge over to the neighboring
    /// triangle.
    ///
    /// Returns the same world position re-expressed in the neighbor's
    /// basis, plus the shortest-arc rotation taking the old triangle's
    /// geometric normal to the new one; carry that rotation onto any
    /// remaining step so it stays tangent to the new plane. Returns `None`
    /// on a boundary edge, in which case the caller keeps its point and
    /// goes no further in that direction.
    ///
    /// `start.weights.z` must be exactly 0 (the point is on the edge).
    pub fn cross_edge(&self, start: &WalkPoint) -> Option<(WalkPoint, Quat)> {
        assert!(
            start.weights.z == 0.0,
            "cross_edge on a point not lying on its (x, y) edge"
        );

        let &opposite = self.next_vertex.get(&(start.indices.y, start.indices.x))?;
        let twin = UVec3::new(start.indices.y, start.indices.x, opposite);

        let [a, b, c] = self.corners(twin);
        let weights = barycentric_weights(a, b, c, self.to_world(start));
        let rotation =
            Quat::from_rotation_arc(self.face_normal(start.indices), self.face_normal(twin));
        Some((WalkPoint::new(twin, weights), rotation))
    }

    /// Consume a whole displacement, hopping edges as needed, up to
    /// [`MAX_CROSSINGS`] hops.
    ///
    /// Each crossing rotates the unconsumed remainder of `step` into the
    /// new triangle's plane. The walk stops early at a boundary edge
    /// (`blocked`), or when the hop cap is hit on a pathological mesh.
    pub fn walk(&self, start: &WalkPoint, step: Vec3) -> Walk {
        let mut at = *start;
        let mut remain = step;
        let mut rotation = Quat::IDENTITY;
        let mut blocked = false;

        for _ in 0..MAX_CROSSINGS {
            if remain.length_squared() == 0.0 {
                break;
            }
            let (end, time) = self.walk_in_triangle(&at, remain);
            at = end;
            if time >= 1.0 {
                break;
            }
            remain *= 1.0 - time;
            match self.cross_edge(&at) {
                Some((next, turn)) => {
                    at = next;
                    remain = turn * remain;
                    rotation = turn * rotation;
                }
                None => {
                    blocked = true;
                    break;
                }
            }
        }

        Walk {
            end: at,
            rotation,
            blocked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{uvec3, vec3};

    fn flat_triangle() -> WalkMesh {
        WalkMesh::new(
            vec![vec3(0.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0)],
            vec![Vec3::Z; 3],
            vec![uvec3(0, 1, 2)],
        )
        .unwrap()
    }

    /// Unit square in z = 0, split along the (1, 2) diagonal.
    fn flat_quad() -> WalkMesh {
        WalkMesh::new(
            vec![
                vec3(0.0, 0.0, 0.0),
                vec3(1.0, 0.0, 0.0),
                vec3(0.0, 1.0, 0.0),
                vec3(1.0, 1.0, 0.0),
            ],
            vec![Vec3::Z; 4],
            vec![uvec3(0, 1, 2), uvec3(1, 3, 2)],
        )
        .unwrap()
    }

    /// Two slopes meeting at a ridge along y; the faces meet at 90 degrees.
    fn tent() -> WalkMesh {
        WalkMesh::new(
            vec![
                vec3(-1.0, 0.0, 0.0),
                vec3(0.0, 0.0, 1.0),
                vec3(0.0, 1.0, 1.0),
                vec3(1.0, 0.0, 0.0),
            ],
            vec![Vec3::Z; 4],
            vec![uvec3(0, 1, 2), uvec3(2, 1, 3)],
        )
        .unwrap()
    }

    #[test]
    fn rejects_mismatched_normal_count() {
        let err = WalkMesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Vec3::Z; 2],
            vec![uvec3(0, 1, 2)],
        )
        .unwrap_err();
        assert!(matches!(err, MeshError::CountMismatch { .. }));
    }

    #[test]
    fn rejects_out_of_range_triangle() {
        let err = WalkMesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Vec3::Z; 3],
            vec![uvec3(0, 1, 7)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MeshError::IndexOutOfBounds {
                triangle: 0,
                index: 7,
                ..
            }
        ));
    }

    #[test]
    fn rejects_degenerate_triangle() {
        let err = WalkMesh::new(
            vec![Vec3::ZERO, Vec3::X, vec3(2.0, 0.0, 0.0)],
            vec![Vec3::Z; 3],
            vec![uvec3(0, 1, 2)],
        )
        .unwrap_err();
        assert!(matches!(err, MeshError::DegenerateTriangle(0)));
    }

    #[test]
    fn rejects_normals_facing_away_from_winding() {
        let err = WalkMesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Vec3::NEG_Z; 3],
            vec![uvec3(0, 1, 2)],
        )
        .unwrap_err();
        assert!(matches!(err, MeshError::InconsistentNormals(0)));
    }

    #[test]
    fn rejects_duplicate_directed_edge() {
        // both triangles own the directed edge (0, 1)
        let err = WalkMesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y, vec3(0.5, -0.1, 0.5)],
            vec![Vec3::Z; 4],
            vec![uvec3(0, 1, 2), uvec3(0, 1, 3)],
        )
        .unwrap_err();
        assert!(matches!(err, MeshError::DuplicateEdge { a: 0, b: 1 }));
    }

    #[test]
    fn nearest_projects_onto_the_face() {
        let mesh = flat_triangle();
        let at = mesh.nearest_walk_point(vec3(0.2, 0.2, 5.0));
        assert_eq!(at.indices, uvec3(0, 1, 2));
        assert!((at.weights.x - 0.6).abs() < 1e-6);
        assert!((at.weights.y - 0.2).abs() < 1e-6);
        assert!((at.weights.z - 0.2).abs() < 1e-6);
        let dist2 = vec3(0.2, 0.2, 5.0).distance_squared(mesh.to_world(&at));
        assert!((dist2 - 25.0).abs() < 1e-4);
    }

    #[test]
    fn nearest_at_a_vertex_is_exact() {
        let mesh = flat_triangle();
        let at = mesh.nearest_walk_point(vec3(1.0, 0.0, 0.0));
        assert_eq!(mesh.to_world(&at), vec3(1.0, 0.0, 0.0));
        let zeros = [at.weights.x, at.weights.y, at.weights.z]
            .iter()
            .filter(|&&w| w == 0.0)
            .count();
        assert_eq!(zeros, 2);
        assert!((at.weights.x + at.weights.y + at.weights.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn nearest_clamps_to_the_closest_edge() {
        let mesh = flat_triangle();
        let at = mesh.nearest_walk_point(vec3(2.0, -1.0, 0.0));
        // closest surface point is the vertex (1, 0, 0); first labeling wins
        assert_eq!(at.indices, uvec3(0, 1, 2));
        assert_eq!(at.weights, vec3(0.0, 1.0, 0.0));
    }

    #[test]
    #[should_panic(expected = "empty walk mesh")]
    fn nearest_panics_on_empty_mesh() {
        let mesh = WalkMesh::new(vec![], vec![], vec![]).unwrap();
        mesh.nearest_walk_point(Vec3::ZERO);
    }

    #[test]
    fn zero_step_stays_put() {
        let mesh = flat_triangle();
        let start = WalkPoint::new(uvec3(0, 1, 2), vec3(0.25, 0.25, 0.5));
        let (end, time) = mesh.walk_in_triangle(&start, Vec3::ZERO);
        assert_eq!(time, 1.0);
        assert_eq!(end.indices, start.indices);
        assert_eq!(end.weights, start.weights);
    }

    #[test]
    fn interior_step_consumes_the_whole_fraction() {
        let mesh = flat_triangle();
        let start = WalkPoint::new(uvec3(0, 1, 2), vec3(0.5, 0.25, 0.25));
        let (end, time) = mesh.walk_in_triangle(&start, vec3(0.1, 0.1, 0.0));
        assert_eq!(time, 1.0);
        assert_eq!(end.indices, start.indices);
        assert!((end.weights.y - 0.35).abs() < 1e-6);
        assert!((end.weights.z - 0.35).abs() < 1e-6);
        assert!((end.weights.x - 0.3).abs() < 1e-6);
    }

    #[test]
    fn crossing_step_clips_and_relabels() {
        let mesh = flat_triangle();
        let start = WalkPoint::new(uvec3(0, 1, 2), vec3(0.6, 0.2, 0.2));
        let (end, time) = mesh.walk_in_triangle(&start, vec3(1.0, 1.0, 0.0));
        // weight x hits zero at t = 0.6 / 2.0
        assert!((time - 0.3).abs() < 1e-6);
        assert_eq!(end.indices, uvec3(1, 2, 0));
        assert_eq!(end.weights.z, 0.0);
        assert!((end.weights.x - 0.5).abs() < 1e-6);
        assert!((end.weights.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn step_exactly_onto_an_edge_lands_with_zero_weight() {
        let mesh = flat_triangle();
        let start = WalkPoint::new(uvec3(0, 1, 2), vec3(0.5, 0.25, 0.25));
        // destination is (0.5, 0, 0): exactly on the (0, 1) edge
        let (end, time) = mesh.walk_in_triangle(&start, vec3(0.25, -0.25, 0.0));
        assert!((time - 1.0).abs() < 1e-6);
        assert_eq!(end.weights.z, 0.0);
        assert_eq!(end.indices, uvec3(0, 1, 2));
        let world = mesh.to_world(&end);
        assert!(world.distance(vec3(0.5, 0.0, 0.0)) < 1e-6);
    }

    #[test]
    #[should_panic(expected = "outside its triangle")]
    fn outward_step_from_outside_panics() {
        let mesh = flat_triangle();
        let start = WalkPoint::new(uvec3(0, 1, 2), vec3(-0.1, 0.55, 0.55));
        mesh.walk_in_triangle(&start, vec3(1.0, 1.0, 0.0));
    }

    #[test]
    fn cross_edge_round_trips_across_a_flat_seam() {
        let mesh = flat_quad();
        let start = WalkPoint::new(uvec3(1, 2, 0), vec3(0.5, 0.5, 0.0));
        let (end, rotation) = mesh.cross_edge(&start).unwrap();

        assert_eq!(end.indices, uvec3(2, 1, 3));
        assert!(mesh.to_world(&end).distance(mesh.to_world(&start)) < 1e-6);
        // coplanar faces: no reorientation
        assert!(rotation.dot(Quat::IDENTITY).abs() > 1.0 - 1e-6);

        let (back, rotation_back) = mesh.cross_edge(&end).unwrap();
        assert_eq!(back.indices, uvec3(1, 2, 0));
        assert!(mesh.to_world(&back).distance(mesh.to_world(&start)) < 1e-6);
        assert!((rotation_back * rotation).dot(Quat::IDENTITY).abs() > 1.0 - 1e-6);
    }

    #[test]
    fn cross_edge_rotates_across_a_fold() {
        let mesh = tent();
        // midpoint of the ridge, expressed on the left face
        let start = WalkPoint::new(uvec3(1, 2, 0), vec3(0.5, 0.5, 0.0));
        let (end, rotation) = mesh.cross_edge(&start).unwrap();
        assert_eq!(end.indices, uvec3(2, 1, 3));
        assert!(mesh.to_world(&end).distance(vec3(0.0, 0.5, 1.0)) < 1e-6);

        let left = vec3(-1.0, 0.0, 1.0).normalize();
        let right = vec3(1.0, 0.0, 1.0).normalize();
        assert!((rotation * left).distance(right) < 1e-6);
    }

    #[test]
    fn cross_edge_misses_on_a_boundary() {
        let mesh = flat_triangle();
        let start = WalkPoint::new(uvec3(0, 1, 2), vec3(0.5, 0.5, 0.0));
        assert!(mesh.cross_edge(&start).is_none());
    }

    #[test]
    #[should_panic(expected = "not lying on its (x, y) edge")]
    fn cross_edge_off_the_edge_panics() {
        let mesh = flat_quad();
        let start = WalkPoint::new(uvec3(0, 1, 2), vec3(0.4, 0.3, 0.3));
        mesh.cross_edge(&start);
    }

    #[test]
    fn walk_carries_the_step_over_a_fold() {
        let mesh = tent();
        let start = mesh.nearest_walk_point(vec3(-0.5, 0.5, 0.5));
        assert!(mesh.to_world(&start).distance(vec3(-0.5, 0.5, 0.5)) < 1e-6);

        // tangent to the left face, uphill toward the ridge; a third of the
        // step is left over at the seam and descends the right face
        let walk = mesh.walk(&start, vec3(0.75, 0.0, 0.75));
        assert!(!walk.blocked);
        assert!(mesh.to_world(&walk.end).distance(vec3(0.25, 0.5, 0.75)) < 1e-5);

        let left_normal = vec3(-1.0, 0.0, 1.0).normalize();
        let right_normal = vec3(1.0, 0.0, 1.0).normalize();
        assert!((walk.rotation * left_normal).distance(right_normal) < 1e-5);
    }

    #[test]
    fn walk_stops_at_a_boundary() {
        let mesh = flat_quad();
        let start = mesh.nearest_walk_point(vec3(0.5, 0.25, 0.0));
        let walk = mesh.walk(&start, vec3(0.0, -5.0, 0.0));
        assert!(walk.blocked);
        assert_eq!(walk.end.weights.z, 0.0);
        let world = mesh.to_world(&walk.end);
        assert!(world.distance(vec3(0.5, 0.0, 0.0)) < 1e-5);
        // no crossings happened, so no reorientation either
        assert!(walk.rotation.dot(Quat::IDENTITY).abs() > 1.0 - 1e-6);
    }

    #[test]
    fn walk_with_zero_step_is_a_no_op() {
        let mesh = flat_quad();
        let start = WalkPoint::new(uvec3(0, 1, 2), vec3(0.4, 0.3, 0.3));
        let walk = mesh.walk(&start, Vec3::ZERO);
        assert!(!walk.blocked);
        assert_eq!(walk.end.indices, start.indices);
        assert_eq!(walk.end.weights, start.weights);
    }
}
