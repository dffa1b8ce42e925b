/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A bridge between a head-mounted display runtime and an engine rendering
//! four views per frame: a context and a focus view for each eye.
//!
//! The device side is described by the traits in `hmd_api`. [`Hmd`] is what
//! the engine talks to; it owns a [`PresentBridge`] which runs the frame
//! lifecycle against the device and one of the [`SwapChainBackend`]s.

#![deny(unsafe_code)]

pub mod events;
pub mod hmd;
pub mod occlusion;
pub mod pose;
pub mod prefs;
pub mod present;
pub mod swap_chain;
pub mod texture_set;
pub mod tracking;

pub use crate::hmd::{Hmd, MonitorInfo};
pub use crate::pose::{BaseTransform, EnginePose};
pub use crate::prefs::HmdPrefs;
pub use crate::present::{PresentBridge, ResolutionFraction, SyncedFrame};
pub use crate::swap_chain::{BackendKind, RenderTarget, SwapChainBackend};
pub use crate::tracking::{HMD_DEVICE_ID, TrackingSnapshot, TrackingStatus};
