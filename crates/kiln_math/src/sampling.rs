//! Hemisphere sampling and shading-frame helpers.

use std::f32::consts::PI;

use crate::Vec3;

/// Map two uniform numbers in `[0, 1)` to a cosine-weighted direction on the
/// `+Z` hemisphere.
#[inline]
pub fn sample_hemisphere_cosine(u1: f32, u2: f32) -> Vec3 {
    let r = u1.sqrt();
    let theta = 2.0 * PI * u2;

    Vec3::new(r * theta.cos(), r * theta.sin(), (1.0 - u1).max(0.0).sqrt())
}

/// Build two tangents completing `n` (unit length) into an orthonormal basis.
///
/// Branchless construction from Duff et al., "Building an Orthonormal
/// Basis, Revisited" (JCGT 2017).
#[inline]
pub fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    let sign = 1.0f32.copysign(n.z);
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;

    let b1 = Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
    let b2 = Vec3::new(b, sign + n.y * n.y * a, -n.y);
    (b1, b2)
}

/// Flip `v` so it lies in the same hemisphere as `reference`.
#[inline]
pub fn face_forward(v: Vec3, reference: Vec3) -> Vec3 {
    if v.dot(reference) < 0.0 {
        -v
    } else {
        v
    }
}
