/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use crate::{LEFT_CONTEXT, LEFT_FOCUS, RIGHT_CONTEXT, RIGHT_FOCUS};

/// The pass the engine is rendering.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StereoPass {
    /// A single, non-stereo view
    Full,
    LeftEye,
    RightEye,
    LeftFocus,
    RightFocus,
}

impl StereoPass {
    /// The pass rendered by the given view when stereo is requested.
    /// Out-of-range indices fall back to the left eye.
    pub fn for_view_index(stereo_requested: bool, view_index: usize) -> StereoPass {
        if !stereo_requested {
            return StereoPass::Full;
        }
        match view_index {
            LEFT_CONTEXT => StereoPass::LeftEye,
            RIGHT_CONTEXT => StereoPass::RightEye,
            LEFT_FOCUS => StereoPass::LeftFocus,
            RIGHT_FOCUS => StereoPass::RightFocus,
            _ => StereoPass::LeftEye,
        }
    }

    /// The index of the device view this pass renders. A full pass renders
    /// the left context view.
    pub fn view_index(self) -> usize {
        match self {
            StereoPass::Full | StereoPass::LeftEye => LEFT_CONTEXT,
            StereoPass::RightEye => RIGHT_CONTEXT,
            StereoPass::LeftFocus => LEFT_FOCUS,
            StereoPass::RightFocus => RIGHT_FOCUS,
        }
    }

    /// The view whose hidden-area mesh applies, if any.
    pub fn stereo_view_index(self) -> Option<usize> {
        match self {
            StereoPass::Full => None,
            pass => Some(pass.view_index()),
        }
    }

    pub fn is_left(self) -> bool {
        matches!(self, StereoPass::LeftEye | StereoPass::LeftFocus)
    }
}
