/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use euclid::Transform3D;

use crate::{Clip, Eye};

/// Half of the horizontal field of view used when there is no device.
pub const FALLBACK_HALF_FOV_X: f32 = 0.663048;
/// Half of the vertical field of view used when there is no device.
pub const FALLBACK_HALF_FOV_Y: f32 = 0.737469;

/// The extents of a symmetric-or-not frustum at unit distance, all positive
/// for a frustum that contains its own axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlignedView {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl AlignedView {
    pub fn new(left: f64, right: f64, top: f64, bottom: f64) -> AlignedView {
        AlignedView {
            left,
            right,
            top,
            bottom,
        }
    }

    /// Recovers the frustum tangents from an off-axis perspective projection.
    pub fn from_projection(projection: &Transform3D<f64, Eye, Clip>) -> AlignedView {
        let (x_scale, x_offset) = (projection.m11, projection.m31);
        let (y_scale, y_offset) = (projection.m22, projection.m32);
        AlignedView {
            left: (1. - x_offset) / x_scale,
            right: (1. + x_offset) / x_scale,
            top: (1. + y_offset) / y_scale,
            bottom: (1. - y_offset) / y_scale,
        }
    }

    /// The off-axis projection matrix with these extents, mapping depth the
    /// way the device does (the inverse of [`AlignedView::from_projection`]
    /// for the x and y terms).
    pub fn to_projection(&self, near: f64, far: f64) -> Transform3D<f64, Eye, Clip> {
        let width = self.left + self.right;
        let height = self.top + self.bottom;
        let depth = far - near;
        Transform3D::new(
            2. / width,
            0.,
            0.,
            0.,
            0.,
            2. / height,
            0.,
            0.,
            (self.right - self.left) / width,
            (self.top - self.bottom) / height,
            -(far + near) / depth,
            -1.,
            0.,
            0.,
            -2. * far * near / depth,
            0.,
        )
    }
}

/// Where a focus view sits within its context view, as fractions of the
/// context view's extent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FocusViewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for FocusViewport {
    fn default() -> Self {
        FocusViewport::FULL
    }
}

impl FocusViewport {
    pub const FULL: FocusViewport = FocusViewport {
        x: 0.,
        y: 0.,
        width: 1.,
        height: 1.,
    };

    /// Expresses the focus frustum's footprint as a fraction of the context
    /// frustum. An axis with a degenerate context extent occupies the full
    /// extent along that axis.
    pub fn from_aligned_views(context: &AlignedView, focus: &AlignedView) -> FocusViewport {
        let horizontal = context.left + context.right;
        let vertical = context.bottom + context.top;

        let (x, width) = if horizontal == 0. || !horizontal.is_finite() {
            (0., 1.)
        } else {
            (
                (context.left - focus.left) / horizontal,
                (focus.left + focus.right) / horizontal,
            )
        };
        let (y, height) = if vertical == 0. || !vertical.is_finite() {
            (0., 1.)
        } else {
            (
                (context.top - focus.top) / vertical,
                (focus.bottom + focus.top) / vertical,
            )
        };

        FocusViewport {
            x: x as f32,
            y: y as f32,
            width: width as f32,
            height: height as f32,
        }
    }
}

#[inline]
/// Converts a device projection into the engine's reversed-Z, infinite far
/// plane projection.
pub fn device_to_engine_projection(
    projection: &Transform3D<f64, Eye, Clip>,
    near_clip_plane: f32,
) -> Transform3D<f32, Eye, Clip> {
    Transform3D::new(
        projection.m11 as f32,
        0.,
        0.,
        0.,
        0.,
        projection.m22 as f32,
        0.,
        0.,
        -projection.m31 as f32,
        -projection.m32 as f32,
        0.,
        -projection.m34 as f32,
        0.,
        0.,
        near_clip_plane,
        0.,
    )
}

#[inline]
/// A reversed-Z perspective projection built from half fields of view.
pub fn reversed_z_perspective(
    half_fov_x: f32,
    half_fov_y: f32,
    mult_fov_x: f32,
    mult_fov_y: f32,
    min_z: f32,
    max_z: f32,
) -> Transform3D<f32, Eye, Clip> {
    let (z_scale, z_offset) = if min_z == max_z {
        (0., min_z)
    } else {
        (min_z / (min_z - max_z), -max_z * min_z / (min_z - max_z))
    };
    Transform3D::new(
        mult_fov_x / half_fov_x.tan(),
        0.,
        0.,
        0.,
        0.,
        mult_fov_y / half_fov_y.tan(),
        0.,
        0.,
        0.,
        0.,
        z_scale,
        1.,
        0.,
        0.,
        z_offset,
        0.,
    )
}

/// The projection used for the left context view when no device is present.
pub fn fallback_projection(near_clip_plane: f32) -> Transform3D<f32, Eye, Clip> {
    reversed_z_perspective(
        FALLBACK_HALF_FOV_X,
        FALLBACK_HALF_FOV_Y,
        1.,
        1.,
        near_clip_plane,
        near_clip_plane,
    )
}

#[cfg(test)]
mod test {
    use super::{AlignedView, FocusViewport};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_aligned_view_round_trips_through_projection() {
        let view = AlignedView::new(1.2, 0.8, 0.9, 1.1);
        let recovered = AlignedView::from_projection(&view.to_projection(0.1, 1000.));
        assert!(approx(recovered.left, 1.2));
        assert!(approx(recovered.right, 0.8));
        assert!(approx(recovered.top, 0.9));
        assert!(approx(recovered.bottom, 1.1));
    }

    #[test]
    fn test_centered_focus_view() {
        let context = AlignedView::new(1., 1., 1., 1.);
        let focus = AlignedView::new(0.5, 0.5, 0.5, 0.5);
        let viewport = FocusViewport::from_aligned_views(&context, &focus);
        assert_eq!(
            viewport,
            FocusViewport {
                x: 0.25,
                y: 0.25,
                width: 0.5,
                height: 0.5,
            }
        );
    }

    #[test]
    fn test_degenerate_context_occupies_full_extent() {
        let context = AlignedView::new(0., 0., 1., 1.);
        let focus = AlignedView::new(0.5, 0.5, 0.5, 0.5);
        let viewport = FocusViewport::from_aligned_views(&context, &focus);
        assert_eq!(viewport.x, 0.);
        assert_eq!(viewport.width, 1.);
        assert_eq!(viewport.y, 0.25);
        assert_eq!(viewport.height, 0.5);
    }
}
