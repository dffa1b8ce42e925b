/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Conversions from the device's right-handed tracking space into the
//! engine's left-handed, Z-up world space.

use euclid::{Angle, Rotation3D, Transform3D, Vector3D};
use hmd_api::{Device, Engine, Eye};

pub type EngineRotation = Rotation3D<f64, Engine, Engine>;
pub type EngineVector = Vector3D<f64, Engine>;

/// An orientation and a position in engine space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnginePose {
    pub orientation: EngineRotation,
    pub position: EngineVector,
}

impl Default for EnginePose {
    fn default() -> Self {
        EnginePose::identity()
    }
}

impl EnginePose {
    pub fn identity() -> EnginePose {
        EnginePose {
            orientation: Rotation3D::identity(),
            position: Vector3D::zero(),
        }
    }

    pub fn new(orientation: EngineRotation, position: EngineVector) -> EnginePose {
        EnginePose {
            orientation,
            position,
        }
    }

    /// The same pose with its position scaled from metres to world units.
    pub fn scaled(&self, world_to_meters: f64) -> EnginePose {
        EnginePose {
            orientation: self.orientation,
            position: self.position * world_to_meters,
        }
    }
}

/// The recentring transform applied to every reported pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BaseTransform {
    pub orientation: EngineRotation,
    pub offset: EngineVector,
}

impl Default for BaseTransform {
    fn default() -> Self {
        BaseTransform {
            orientation: Rotation3D::identity(),
            offset: Vector3D::zero(),
        }
    }
}

impl BaseTransform {
    /// Expresses a world-scaled pose relative to this base.
    pub fn relative(&self, pose: &EnginePose) -> EnginePose {
        let inverse = self.orientation.inverse();
        EnginePose {
            orientation: canonical(pose.orientation.then(&inverse).normalize()),
            position: inverse.transform_vector3d(pose.position - self.offset),
        }
    }

    /// A base orientation that only keeps the yaw of `orientation`, minus
    /// `yaw_offset` degrees.
    pub fn yaw_only(orientation: &EngineRotation, yaw_offset: f64) -> EngineRotation {
        let mut yaw = yaw_degrees(orientation);
        if yaw_offset != 0. {
            yaw = normalize_degrees(yaw - yaw_offset);
        }
        Rotation3D::around_z(Angle::degrees(yaw))
    }
}

/// The heading of an engine orientation around the up axis, in degrees.
pub fn yaw_degrees(orientation: &EngineRotation) -> f64 {
    let (x, y, z, w) = (orientation.i, orientation.j, orientation.k, orientation.r);
    let yaw_y = 2. * (w * z + x * y);
    let yaw_x = 1. - 2. * (y * y + z * z);
    yaw_y.atan2(yaw_x).to_degrees()
}

fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.);
    if wrapped > 180. { wrapped - 360. } else { wrapped }
}

/// Flips a quaternion into the hemisphere with a non-negative real part.
fn canonical(rotation: EngineRotation) -> EngineRotation {
    if rotation.r < 0. {
        Rotation3D::quaternion(-rotation.i, -rotation.j, -rotation.k, -rotation.r)
    } else {
        rotation
    }
}

/// The upper-left 3x3 block of a transform, row by row.
fn rotation_rows<Src, Dst>(matrix: &Transform3D<f64, Src, Dst>) -> [[f64; 3]; 3] {
    [
        [matrix.m11, matrix.m12, matrix.m13],
        [matrix.m21, matrix.m22, matrix.m23],
        [matrix.m31, matrix.m32, matrix.m33],
    ]
}

fn transposed(rows: [[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.; 3]; 3];
    for (row, values) in rows.iter().enumerate() {
        for (col, value) in values.iter().enumerate() {
            out[col][row] = *value;
        }
    }
    out
}

/// Extracts the rotation of a matrix whose rows are the rotated basis
/// vectors. Matrices with a degenerate axis yield the identity.
fn rotation_from_rows(m: [[f64; 3]; 3]) -> (f64, f64, f64, f64) {
    const SMALL: f64 = 1.0e-8;
    if m.iter()
        .any(|row| row.iter().map(|value| value * value).sum::<f64>() <= SMALL)
    {
        return (0., 0., 0., 1.);
    }

    let trace = m[0][0] + m[1][1] + m[2][2];
    if trace > 0. {
        let inv_s = 1. / (trace + 1.).sqrt();
        let w = 0.5 / inv_s;
        let s = 0.5 * inv_s;
        return (
            (m[1][2] - m[2][1]) * s,
            (m[2][0] - m[0][2]) * s,
            (m[0][1] - m[1][0]) * s,
            w,
        );
    }

    let mut i = 0;
    if m[1][1] > m[0][0] {
        i = 1;
    }
    if m[2][2] > m[i][i] {
        i = 2;
    }
    const NEXT: [usize; 3] = [1, 2, 0];
    let j = NEXT[i];
    let k = NEXT[j];

    let inv_s = 1. / (m[i][i] - m[j][j] - m[k][k] + 1.).sqrt();
    let s = 0.5 * inv_s;
    let mut q = [0.; 4];
    q[i] = 0.5 / inv_s;
    q[3] = (m[j][k] - m[k][j]) * s;
    q[j] = (m[i][j] + m[j][i]) * s;
    q[k] = (m[i][k] + m[k][i]) * s;
    (q[0], q[1], q[2], q[3])
}

/// Reorders a device-space quaternion into engine axes.
fn engine_rotation((x, y, z, w): (f64, f64, f64, f64)) -> EngineRotation {
    Rotation3D::quaternion(-z, x, y, -w)
}

/// The head pose in metres between two eye view matrices: the translations
/// are averaged, the orientation is taken from the left eye.
pub fn head_pose_from_views(
    left: &Transform3D<f64, Device, Eye>,
    right: &Transform3D<f64, Device, Eye>,
) -> EnginePose {
    let x = (left.m41 + right.m41) * 0.5;
    let y = (left.m42 + right.m42) * 0.5;
    let z = (left.m43 + right.m43) * 0.5;
    let location = Vector3D::new(z, -x, -y);

    let orientation = canonical(engine_rotation(rotation_from_rows(transposed(
        rotation_rows(left),
    ))));
    EnginePose::new(orientation, orientation.transform_vector3d(location))
}

/// The head pose in metres given the device's centre-eye view matrix.
pub fn head_pose_from_center_view(center: &Transform3D<f64, Device, Eye>) -> EnginePose {
    let location = Vector3D::new(-center.m43, center.m41, center.m42);
    let rows = match center.inverse() {
        Some(inverse) => transposed(rotation_rows(&inverse)),
        None => {
            log::warn!("Centre eye pose is not invertible");
            [[1., 0., 0.], [0., 1., 0.], [0., 0., 1.]]
        },
    };
    let orientation = canonical(engine_rotation(rotation_from_rows(rows)));
    EnginePose::new(orientation, location)
}

/// Converts a tracking provider's 3x4 device-to-absolute transform into a
/// world-scaled, base-relative engine pose. `flip` applies the correction
/// generic trackers need.
pub fn pose_from_device_transform(
    transform: &[[f32; 4]; 3],
    flip: bool,
    world_to_meters: f64,
    base: &BaseTransform,
) -> EnginePose {
    // The provider's rows are the matrix columns as the engine reads them.
    let mut rows = [[0.; 3]; 3];
    for (row, values) in rows.iter_mut().enumerate() {
        for (col, value) in values.iter_mut().enumerate() {
            *value = transform[col][row] as f64;
        }
    }
    let translation = [
        transform[0][3] as f64,
        transform[1][3] as f64,
        transform[2][3] as f64,
    ];
    if flip {
        let [first, second, third] = rows;
        let negate = |row: [f64; 3]| row.map(|value| -value);
        rows = [negate(first), negate(third), negate(second)];
    }

    let orientation = engine_rotation(rotation_from_rows(rows));
    let position = Vector3D::new(-translation[2], translation[0], translation[1]) * world_to_meters;
    base.relative(&EnginePose::new(orientation, position))
}

#[cfg(test)]
mod test {
    use euclid::{Angle, Rotation3D, Transform3D, Vector3D};
    use hmd_api::RawDevicePose;

    use super::{
        BaseTransform, EnginePose, head_pose_from_center_view, head_pose_from_views,
        pose_from_device_transform, yaw_degrees,
    };

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identity_views_give_identity_pose() {
        let identity = Transform3D::identity();
        let pose = head_pose_from_views(&identity, &identity);
        assert_eq!(pose.orientation, Rotation3D::identity());
        assert_eq!(pose.position, Vector3D::zero());
    }

    #[test]
    fn test_head_position_is_eye_midpoint() {
        let left = Transform3D::translation(0.032, 0., 0.5);
        let right = Transform3D::translation(-0.032, 0., 0.5);
        let pose = head_pose_from_views(&left, &right);
        assert!(approx(pose.position.x, 0.5));
        assert!(approx(pose.position.y, 0.));
        assert!(approx(pose.position.z, 0.));
    }

    #[test]
    fn test_identity_device_transform() {
        let pose = pose_from_device_transform(
            &RawDevicePose::IDENTITY,
            false,
            100.,
            &BaseTransform::default(),
        );
        assert_eq!(pose, EnginePose::identity());
    }

    #[test]
    fn test_device_translation_is_permuted_and_scaled() {
        let mut transform = RawDevicePose::IDENTITY;
        transform[0][3] = 1.;
        transform[1][3] = 2.;
        transform[2][3] = 3.;
        let pose = pose_from_device_transform(&transform, false, 100., &BaseTransform::default());
        assert_eq!(pose.position, Vector3D::new(-300., 100., 200.));
    }

    #[test]
    fn test_base_offset_is_subtracted() {
        let mut transform = RawDevicePose::IDENTITY;
        transform[0][3] = 1.;
        let base = BaseTransform {
            offset: Vector3D::new(0., 100., 0.),
            ..BaseTransform::default()
        };
        let pose = pose_from_device_transform(&transform, false, 100., &base);
        assert_eq!(pose.position, Vector3D::zero());
    }

    #[test]
    fn test_tracker_flip_swaps_and_negates_rows() {
        let quarter_turn = [
            [0.0, -1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ];
        let base = BaseTransform::default();

        let plain = pose_from_device_transform(&quarter_turn, false, 100., &base).orientation;
        let half = std::f64::consts::FRAC_1_SQRT_2;
        assert!(approx(plain.i, half) && approx(plain.j, 0.) && approx(plain.k, 0.));
        assert!(approx(plain.r, half));

        // Rows become (-x, -z, -y) of the unflipped rotation.
        let flipped = pose_from_device_transform(&quarter_turn, true, 100., &base).orientation;
        assert!(approx(flipped.i, -0.5) && approx(flipped.j, 0.5));
        assert!(approx(flipped.k, -0.5) && approx(flipped.r, 0.5));

        let identity_flipped =
            pose_from_device_transform(&RawDevicePose::IDENTITY, true, 100., &base).orientation;
        assert!(approx(identity_flipped.i, half) && approx(identity_flipped.j, 0.));
        assert!(approx(identity_flipped.k, half) && approx(identity_flipped.r, 0.));
    }

    #[test]
    fn test_center_view_identity() {
        let pose = head_pose_from_center_view(&Transform3D::identity());
        assert_eq!(pose, EnginePose::identity());
    }

    #[test]
    fn test_yaw_only_base_drops_offset() {
        let facing = Rotation3D::around_z(Angle::degrees(30.));
        let base = BaseTransform::yaw_only(&facing, 10.);
        assert!(approx(yaw_degrees(&base), 20.));
    }
}
