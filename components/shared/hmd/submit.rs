/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The two encodings a frame can be handed to the compositor in.

use bitflags::bitflags;
use euclid::Transform3D;

use crate::{Clip, Device, Eye, NativeTexture, SwapChainId};

/// A pixel rectangle within a render target.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Viewport {
        Viewport {
            x,
            y,
            width,
            height,
        }
    }

    /// Scales every component by the given resolution fraction, truncating
    /// toward zero.
    pub fn scaled(&self, fraction: f32) -> Viewport {
        let scale = |value: i32| (value as f32 * fraction) as i32;
        Viewport {
            x: scale(self.x),
            y: scale(self.y),
            width: scale(self.width),
            height: scale(self.height),
        }
    }
}

/// Flat per-view submission used by the direct-submission backend: every
/// view samples its own rectangle of a single texture.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub struct SubmitInfo {
    pub textures: Vec<Option<NativeTexture>>,
    pub viewports: Vec<Viewport>,
}

impl SubmitInfo {
    pub fn new(viewports: Vec<Viewport>) -> SubmitInfo {
        SubmitInfo {
            textures: vec![None; viewports.len()],
            viewports,
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
    pub struct SubmitFlags: u32 {
        /// Let the compositor pick the frame up without blocking the caller.
        const ASYNC = 1 << 0;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub enum ReferenceSpace {
    Local,
    Reference,
    View,
}

/// A rectangle of one swap chain image.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub struct SwapChainViewport {
    pub swap_chain: SwapChainId,
    pub viewport: Viewport,
    pub array_index: u32,
}

/// Depth information attached to a projection view.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub struct DepthExtension {
    pub min_depth: f64,
    pub max_depth: f64,
    pub near_z: f64,
    pub far_z: f64,
    pub viewport: SwapChainViewport,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerView {
    pub projection: Transform3D<f64, Eye, Clip>,
    pub view: Transform3D<f64, Device, Eye>,
    pub viewport: SwapChainViewport,
    pub depth: Option<DepthExtension>,
}

/// A multi-projection layer: one projected view per rendered view.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerMultiProj {
    pub space: ReferenceSpace,
    pub views: Vec<LayerView>,
}

/// Layered submission used by the indexed swap-chain backend.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub struct SubmitInfoLayers {
    pub flags: SubmitFlags,
    pub frame_number: i64,
    pub layers: Vec<LayerMultiProj>,
}
