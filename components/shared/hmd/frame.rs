/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use euclid::Transform3D;

use crate::{Clip, Device, Eye, VIEW_COUNT};

/// The view and projection of one rendered view, as reported by the device.
///
/// Matrices are row-major with the translation in the last row (`m41`,
/// `m42`, `m43`), matching euclid's row-vector convention.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewInfo {
    pub view_matrix: Transform3D<f64, Device, Eye>,
    pub projection_matrix: Transform3D<f64, Eye, Clip>,
}

impl Default for ViewInfo {
    fn default() -> Self {
        ViewInfo {
            view_matrix: Transform3D::identity(),
            projection_matrix: Transform3D::identity(),
        }
    }
}

/// Per-frame state filled in by the device on every wait-sync.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameInfo {
    /// One entry per view, ordered left context, right context, left focus,
    /// right focus.
    pub views: Vec<ViewInfo>,
    /// Monotonically increasing number of the frame being rendered.
    pub frame_number: i64,
    /// Predicted display time of the frame in nanoseconds.
    pub display_time: i64,
}

impl FrameInfo {
    pub fn new(view_count: usize) -> FrameInfo {
        FrameInfo {
            views: vec![ViewInfo::default(); view_count],
            frame_number: 0,
            display_time: 0,
        }
    }

    pub fn view(&self, index: usize) -> ViewInfo {
        self.views.get(index).copied().unwrap_or_default()
    }
}

impl Default for FrameInfo {
    fn default() -> Self {
        FrameInfo::new(VIEW_COUNT)
    }
}
