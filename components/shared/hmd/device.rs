/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fmt;

use euclid::Transform3D;
use serde::{Deserialize, Serialize};

use crate::{
    Device, DeviceErrorCode, DeviceEvent, Eye, FrameInfo, Mesh2D, NativeTexture, SubmitInfo,
    SubmitInfoLayers, Viewport, WindingOrder,
};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub struct SwapChainId(pub u32);

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TextureFormat {
    B8G8R8A8Srgb,
    B8G8R8A8,
    D32Float,
    DepthStencil,
}

/// The shape of a swap chain: how many images, how big, in what format.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub struct SwapChainConfig {
    pub format: TextureFormat,
    pub texture_count: u32,
    pub width: i32,
    pub height: i32,
    pub array_size: u32,
}

/// What the device hands back when graphics are initialised for direct
/// submission: a device-owned array of textures and how many views sample
/// from them.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphicsInfo {
    pub swap_chain_textures: Vec<NativeTexture>,
    pub view_count: usize,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PoseType {
    LeftEye,
    Center,
    RightEye,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PropertyKey {
    /// Estimated inter-pupillary distance in millimetres.
    GazeIpdEstimate,
    HmdConnected,
}

/// A runtime version, compared component-wise from the most significant.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub struct RuntimeVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: u32,
}

impl RuntimeVersion {
    pub const fn new(major: u32, minor: u32, patch: u32, build: u32) -> RuntimeVersion {
        RuntimeVersion {
            major,
            minor,
            patch,
            build,
        }
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}

/// A live connection to the HMD runtime.
///
/// Every call may leave an error behind which is only observable through
/// [`DeviceAPI::get_error`]; none of them fail directly.
pub trait DeviceAPI: Send {
    /// Blocks until the device is ready for the next frame, then fills in
    /// the frame's views and frame number.
    fn wait_sync(&mut self, frame_info: &mut FrameInfo);

    fn begin_frame(&mut self);

    /// Ends the frame with a flat per-view submission.
    fn end_frame(&mut self, frame_info: &FrameInfo, submit_info: &SubmitInfo);

    /// Ends the frame with a layered submission.
    fn end_frame_with_layers(&mut self, submit_info: &SubmitInfoLayers);

    /// Returns the oldest error raised since the previous call, clearing it.
    fn get_error(&mut self) -> Option<DeviceErrorCode>;

    fn error_description(&self, code: DeviceErrorCode) -> String {
        code.to_string()
    }

    fn poll_event(&mut self) -> Option<DeviceEvent>;

    fn create_frame_info(&mut self) -> FrameInfo;

    /// A submit info laid out with the device's default viewports.
    fn create_submit_info(&mut self) -> SubmitInfo {
        SubmitInfo::new(self.default_viewports())
    }

    fn default_viewports(&mut self) -> Vec<Viewport>;

    fn default_swap_chain_config(&mut self) -> SwapChainConfig;

    /// The hidden-area mesh of one view, in normalized device coordinates.
    fn create_occlusion_mesh(&mut self, view_index: usize, winding: WindingOrder) -> Mesh2D;

    /// Sets up direct submission. Returns `None` if the device refused.
    fn init_graphics(&mut self, format: TextureFormat) -> Option<GraphicsInfo>;

    fn shutdown_graphics(&mut self);

    /// The image of the direct-submission texture array the device expects
    /// to be rendered next.
    fn swap_chain_current_index(&mut self) -> usize;

    fn create_swap_chain(&mut self, config: &SwapChainConfig) -> Option<SwapChainId>;

    fn destroy_swap_chain(&mut self, swap_chain: SwapChainId);

    fn swap_chain_image(&mut self, swap_chain: SwapChainId, index: usize) -> NativeTexture;

    /// Acquires the next image of the ring, returning its index.
    fn acquire_swap_chain_image(&mut self, swap_chain: SwapChainId) -> Option<usize>;

    fn release_swap_chain_image(&mut self, swap_chain: SwapChainId);

    /// The view matrix of the requested pose for the current frame.
    fn frame_pose(&mut self, pose: PoseType) -> Transform3D<f64, Device, Eye>;

    fn property_f64(&mut self, key: PropertyKey) -> Option<f64>;

    fn property_bool(&mut self, key: PropertyKey) -> Option<bool>;

    fn shutdown(&mut self);
}

/// Finds the runtime and opens sessions against it.
pub trait DiscoveryAPI {
    /// Whether the runtime is installed and usable at all.
    fn is_available(&self) -> bool;

    fn runtime_version(&self) -> RuntimeVersion;

    /// Opens a session, or returns `None` when the runtime is not running.
    fn connect(&mut self) -> Option<Box<dyn DeviceAPI>>;
}
