use glam::Vec3;

/// Project `point` onto the plane of triangle (a, b, c) and return the
/// barycentric weights (u, v, w) of the projection, with u + v + w = 1.
///
/// Solved with Cramer's rule over the edge dot products. The triangle must
/// have non-zero area; a degenerate triangle divides by zero here, which is
/// why [`crate::WalkMesh`] rejects such triangles at construction.
#[inline]
pub fn barycentric_weights(a: Vec3, b: Vec3, c: Vec3, point: Vec3) -> Vec3 {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = point - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Vec3::new(1.0 - v - w, v, w)
}

/// Closest point to `point` on the segment a..b, plus the clamped
/// interpolation parameter t in [0, 1] (0 = a, 1 = b).
#[inline]
pub fn closest_point_on_segment(a: Vec3, b: Vec3, point: Vec3) -> (Vec3, f32) {
    let along = (point - a).dot(b - a);
    let max = (b - a).dot(b - a);
    if along <= 0.0 {
        (a, 0.0)
    } else if along >= max {
        (b, 1.0)
    } else {
        let t = along / max;
        (a.lerp(b, t), t)
    }
}
