/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

/// Number of device slots the tracking provider reports. Slot 0 is the HMD.
pub const MAX_TRACKED_DEVICES: usize = 64;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DeviceClass {
    #[default]
    Invalid,
    Hmd,
    Controller,
    GenericTracker,
    TrackingReference,
    DisplayRedirect,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TrackingResult {
    #[default]
    Uninitialized,
    CalibratingInProgress,
    CalibratingOutOfRange,
    RunningOk,
    RunningOutOfRange,
}

/// The kind of a tracked device as the engine sees it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TrackedDeviceType {
    /// Matches every kind when enumerating.
    Any,
    HeadMountedDisplay,
    Controller,
    TrackingReference,
    Other,
    #[default]
    Invalid,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FloatPropertyKey {
    BatteryPercentage,
    FieldOfViewLeftDegrees,
    FieldOfViewRightDegrees,
    FieldOfViewTopDegrees,
    FieldOfViewBottomDegrees,
    TrackingRangeMinimumMeters,
    TrackingRangeMaximumMeters,
}

/// One slot of the provider's pose array.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDevicePose {
    /// Row-major 3x4 device-to-absolute transform, translation in column 3.
    pub device_to_absolute: [[f32; 4]; 3],
    pub tracking_result: TrackingResult,
    pub pose_is_valid: bool,
    pub device_is_connected: bool,
}

impl RawDevicePose {
    pub const IDENTITY: [[f32; 4]; 3] = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ];
}

impl Default for RawDevicePose {
    fn default() -> Self {
        RawDevicePose {
            device_to_absolute: RawDevicePose::IDENTITY,
            tracking_result: TrackingResult::Uninitialized,
            pose_is_valid: false,
            device_is_connected: false,
        }
    }
}

/// The external tracking runtime that knows about controllers, trackers and
/// base stations.
pub trait TrackingProvider: Send {
    /// Poses of every device slot in the standing universe. Slots whose
    /// device is not connected hold unspecified data.
    fn poses(&mut self) -> [RawDevicePose; MAX_TRACKED_DEVICES];

    fn device_class(&self, device_id: usize) -> DeviceClass;

    fn float_property(&self, device_id: usize, key: FloatPropertyKey) -> f32;

    fn render_model_name(&self, _device_id: usize) -> Option<String> {
        None
    }
}

/// The engine's dynamic resolution heuristic.
pub trait ResolutionHeuristic: Send {
    /// The fraction of the full render target to use this frame, in (0, 1].
    fn current_fraction_for_frame(&self) -> f32;
}
