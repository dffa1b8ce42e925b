/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

//! The contracts between the HMD stereo bridge and its collaborators: the
//! head-mounted display runtime, the external tracking provider, the engine's
//! render hardware interface and the dynamic resolution heuristic.
//!
//! Nothing in this crate talks to real hardware. Implementations of
//! [`DeviceAPI`] and friends live with the embedder, and [`mock`] provides
//! in-memory versions of all of them.

mod device;
mod error;
mod events;
mod frame;
mod mesh;
pub mod mock;
mod render;
mod stereo;
mod submit;
mod tracking;
pub mod util;

pub use device::DeviceAPI;
pub use device::DiscoveryAPI;
pub use device::GraphicsInfo;
pub use device::PoseType;
pub use device::PropertyKey;
pub use device::RuntimeVersion;
pub use device::SwapChainConfig;
pub use device::SwapChainId;
pub use device::TextureFormat;
pub use error::DeviceErrorCode;
pub use error::Error;
pub use events::ButtonEvent;
pub use events::DeviceEvent;
pub use events::GameViewport;
pub use events::Visibility;
pub use frame::FrameInfo;
pub use frame::ViewInfo;
pub use mesh::HiddenAreaMesh;
pub use mesh::Mesh2D;
pub use mesh::WindingOrder;
pub use render::NativeTexture;
pub use render::RenderHardware;
pub use render::TextureDescriptor;
pub use render::TextureHandle;
pub use render::TextureUsage;
pub use stereo::StereoPass;
pub use submit::DepthExtension;
pub use submit::LayerMultiProj;
pub use submit::LayerView;
pub use submit::ReferenceSpace;
pub use submit::SubmitFlags;
pub use submit::SubmitInfo;
pub use submit::SubmitInfoLayers;
pub use submit::SwapChainViewport;
pub use submit::Viewport;
pub use tracking::DeviceClass;
pub use tracking::FloatPropertyKey;
pub use tracking::RawDevicePose;
pub use tracking::ResolutionHeuristic;
pub use tracking::TrackedDeviceType;
pub use tracking::TrackingProvider;
pub use tracking::TrackingResult;
pub use tracking::MAX_TRACKED_DEVICES;

/// The number of views the device renders: two context eyes followed by two
/// focus eyes.
pub const VIEW_COUNT: usize = 4;

pub const LEFT_CONTEXT: usize = 0;
pub const RIGHT_CONTEXT: usize = 1;
pub const LEFT_FOCUS: usize = 2;
pub const RIGHT_FOCUS: usize = 3;

/// The device's right-handed tracking space.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Device {}

/// The engine's left-handed, Z-up world space.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Engine {}

/// The space of a single eye.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Eye {}

/// Clip space, after projection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Clip {}

/// Normalized device coordinates in [-1, 1].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Ndc {}

/// Texture coordinates in [0, 1].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Uv {}

/// Pixels of a render target.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Pixel {}
