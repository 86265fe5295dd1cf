//! Boundary conversions between contract carriers and nalgebra types.

use contracts::{Quat, Vec3};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Contract vector → nalgebra.
#[inline]
pub fn to_vector(v: Vec3) -> Vector3<f64> {
    Vector3::new(v.x, v.y, v.z)
}

/// Contract quaternion → unit quaternion (renormalizes).
#[inline]
pub fn to_quat(q: Quat) -> UnitQuaternion<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z))
}

/// Unit quaternion → contract carrier, hemisphere-normalized to w >= 0.
#[inline]
pub fn quat_to_contract(q: &UnitQuaternion<f64>) -> Quat {
    let inner = q.quaternion();
    Quat::new(inner.w, inner.i, inner.j, inner.k).positive_hemisphere()
}
