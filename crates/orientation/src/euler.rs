//! Euler decomposition in joint-specific orders.
//!
//! Angles are intrinsic rotations about the axes named by the order, applied
//! left to right: `Xzy` means `R = Rx(θx)·Rz(θz)·Ry(θy)`. Decomposition
//! returns the triple keyed by axis role, not by sequence position:
//! `(x_deg, z_deg, y_deg)` = (flexion, abduction, rotation).

use contracts::EulerOrder;
use nalgebra::{UnitQuaternion, Vector3};

/// Decompose a rotation into `(about_x, about_z, about_y)` degrees for the
/// given order.
pub fn decompose(q: &UnitQuaternion<f64>, order: EulerOrder) -> (f64, f64, f64) {
    let m = q.to_rotation_matrix().into_inner();
    let r = |row: usize, col: usize| m[(row, col)];

    let (x, z, y) = match order {
        // R = Rx·Ry·Rz
        EulerOrder::Xyz => {
            let yy = r(0, 2).clamp(-1.0, 1.0).asin();
            let xx = (-r(1, 2)).atan2(r(2, 2));
            let zz = (-r(0, 1)).atan2(r(0, 0));
            (xx, zz, yy)
        }
        // R = Rx·Rz·Ry
        EulerOrder::Xzy => {
            let zz = (-r(0, 1)).clamp(-1.0, 1.0).asin();
            let xx = r(2, 1).atan2(r(1, 1));
            let yy = r(0, 2).atan2(r(0, 0));
            (xx, zz, yy)
        }
        // R = Rz·Rx·Ry
        EulerOrder::Zxy => {
            let xx = r(2, 1).clamp(-1.0, 1.0).asin();
            let zz = (-r(0, 1)).atan2(r(1, 1));
            let yy = (-r(2, 0)).atan2(r(2, 2));
            (xx, zz, yy)
        }
        // R = Ry·Rx·Rz
        EulerOrder::Yxz => {
            let xx = (-r(1, 2)).clamp(-1.0, 1.0).asin();
            let yy = r(0, 2).atan2(r(2, 2));
            let zz = r(1, 0).atan2(r(1, 1));
            (xx, zz, yy)
        }
    };

    (x.to_degrees(), z.to_degrees(), y.to_degrees())
}

/// Compose a rotation from `(about_x, about_z, about_y)` degrees in the
/// given order. Inverse of [`decompose`] away from the singularity.
pub fn euler_to_quat(x_deg: f64, z_deg: f64, y_deg: f64, order: EulerOrder) -> UnitQuaternion<f64> {
    let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), x_deg.to_radians());
    let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), y_deg.to_radians());
    let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), z_deg.to_radians());

    match order {
        EulerOrder::Xyz => rx * ry * rz,
        EulerOrder::Xzy => rx * rz * ry,
        EulerOrder::Zxy => rz * rx * ry,
        EulerOrder::Yxz => ry * rx * rz,
    }
}
