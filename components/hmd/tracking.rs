/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use euclid::Angle;
use hmd_api::{
    DeviceClass, FloatPropertyKey, MAX_TRACKED_DEVICES, RawDevicePose, TrackedDeviceType,
    TrackingProvider, TrackingResult,
};
use log::trace;
use serde::Serialize;

use crate::pose::{BaseTransform, EnginePose, EngineRotation, EngineVector};

/// The id of the headset in every device list.
pub const HMD_DEVICE_ID: usize = 0;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum TrackingStatus {
    NotTracked,
    Tracked,
}

/// What the last refresh learnt about one device slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedDeviceState {
    pub connected: bool,
    pub pose_valid: bool,
    /// World-scaled and relative to the base transform.
    pub pose: EnginePose,
    pub battery: f32,
    pub device_type: TrackedDeviceType,
    pub raw: RawDevicePose,
}

impl Default for TrackedDeviceState {
    fn default() -> Self {
        TrackedDeviceState {
            connected: false,
            pose_valid: false,
            pose: EnginePose::identity(),
            battery: 0.,
            device_type: TrackedDeviceType::Invalid,
            raw: RawDevicePose::default(),
        }
    }
}

/// Where a tracking sensor sits and what it can see.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorProperties {
    pub orientation: EngineRotation,
    pub origin: EngineVector,
    pub left_fov: Angle<f32>,
    pub right_fov: Angle<f32>,
    pub top_fov: Angle<f32>,
    pub bottom_fov: Angle<f32>,
    /// Tracking range in world units.
    pub near_plane: f32,
    pub far_plane: f32,
    pub camera_distance: f32,
}

/// The state of every device the external tracking provider knows about,
/// taken once per game frame.
pub struct TrackingSnapshot {
    devices: Vec<TrackedDeviceState>,
    has_vision_tracking: bool,
}

impl Default for TrackingSnapshot {
    fn default() -> Self {
        TrackingSnapshot {
            devices: vec![TrackedDeviceState::default(); MAX_TRACKED_DEVICES],
            has_vision_tracking: false,
        }
    }
}

impl TrackingSnapshot {
    /// Re-reads every slot but the headset's, which the device reports
    /// itself.
    pub fn refresh(
        &mut self,
        provider: &mut dyn TrackingProvider,
        world_to_meters: f64,
        base: &BaseTransform,
    ) {
        let poses = provider.poses();
        self.has_vision_tracking = poses
            .iter()
            .any(|pose| pose.tracking_result == TrackingResult::RunningOk);

        for (device_id, raw) in poses.iter().enumerate().skip(1) {
            let class = provider.device_class(device_id);
            let device_type = tracked_device_type(class, provider.render_model_name(device_id));
            let battery = if raw.device_is_connected {
                provider.float_property(device_id, FloatPropertyKey::BatteryPercentage)
            } else {
                0.
            };
            let flip = device_type == TrackedDeviceType::Other &&
                class == DeviceClass::GenericTracker;
            let pose = if raw.pose_is_valid {
                crate::pose::pose_from_device_transform(
                    &raw.device_to_absolute,
                    flip,
                    world_to_meters,
                    base,
                )
            } else {
                EnginePose::identity()
            };
            self.devices[device_id] = TrackedDeviceState {
                connected: raw.device_is_connected,
                pose_valid: raw.pose_is_valid,
                pose,
                battery,
                device_type,
                raw: *raw,
            };
        }
        trace!(
            "Tracking refreshed, vision tracking {}",
            self.has_vision_tracking
        );
    }

    pub fn has_vision_tracking(&self) -> bool {
        self.has_vision_tracking
    }

    pub fn device(&self, device_id: usize) -> Option<&TrackedDeviceState> {
        self.devices.get(device_id)
    }

    /// Ids of the connected devices with valid poses matching `kind`. The
    /// headset comes first when it matches.
    pub fn enumerate(&self, kind: TrackedDeviceType) -> Vec<usize> {
        let mut ids = Vec::new();
        if matches!(
            kind,
            TrackedDeviceType::Any | TrackedDeviceType::HeadMountedDisplay
        ) {
            ids.push(HMD_DEVICE_ID);
        }
        ids.extend(
            self.devices
                .iter()
                .enumerate()
                .skip(1)
                .filter(|(_, device)| {
                    device.pose_valid &&
                        device.connected &&
                        (kind == TrackedDeviceType::Any || device.device_type == kind)
                })
                .map(|(device_id, _)| device_id),
        );
        ids
    }

    pub fn is_tracking(&self, device_id: usize) -> bool {
        self.device(device_id).is_some_and(|device| device.pose_valid)
    }

    pub fn is_device_connected(&self, device_id: usize) -> bool {
        self.device(device_id).is_some_and(|device| device.connected)
    }

    /// Battery level in percent, or -1 for ids outside the device list.
    pub fn battery(&self, device_id: usize) -> f32 {
        self.device(device_id).map_or(-1., |device| device.battery)
    }

    /// Tracked only while the device is connected and its pose is valid.
    pub fn controller_tracking_status(&self, device_id: usize) -> TrackingStatus {
        match self.device(device_id) {
            Some(device) if device.pose_valid && device.connected => TrackingStatus::Tracked,
            _ => TrackingStatus::NotTracked,
        }
    }

    /// Sensor properties of a device whose last refreshed pose is valid.
    pub fn sensor_properties(
        &self,
        provider: &dyn TrackingProvider,
        device_id: usize,
        world_to_meters: f64,
    ) -> Option<SensorProperties> {
        let device = self.device(device_id).filter(|device| device.pose_valid)?;
        Some(sensor_properties_at(
            provider,
            device_id,
            &device.pose,
            world_to_meters,
        ))
    }
}

/// Sensor properties of `device_id` seen from `pose`. The camera distance
/// is the distance of the sensor from the tracking origin.
pub fn sensor_properties_at(
    provider: &dyn TrackingProvider,
    device_id: usize,
    pose: &EnginePose,
    world_to_meters: f64,
) -> SensorProperties {
    let degrees = |key| Angle::degrees(provider.float_property(device_id, key));
    let near_plane = provider
        .float_property(device_id, FloatPropertyKey::TrackingRangeMinimumMeters) *
        world_to_meters as f32;
    let far_plane = provider
        .float_property(device_id, FloatPropertyKey::TrackingRangeMaximumMeters) *
        world_to_meters as f32;
    SensorProperties {
        orientation: pose.orientation,
        origin: pose.position,
        left_fov: degrees(FloatPropertyKey::FieldOfViewLeftDegrees),
        right_fov: degrees(FloatPropertyKey::FieldOfViewRightDegrees),
        top_fov: degrees(FloatPropertyKey::FieldOfViewTopDegrees),
        bottom_fov: degrees(FloatPropertyKey::FieldOfViewBottomDegrees),
        near_plane,
        far_plane,
        camera_distance: pose.position.length() as f32,
    }
}

/// How the engine classifies a device. Anything whose render model calls
/// itself a tracker is treated as one, whatever class the provider reports.
pub fn tracked_device_type(
    class: DeviceClass,
    render_model_name: Option<String>,
) -> TrackedDeviceType {
    if render_model_name.is_some_and(|name| name.contains("tracker")) {
        return TrackedDeviceType::Other;
    }
    match class {
        DeviceClass::Hmd => TrackedDeviceType::HeadMountedDisplay,
        DeviceClass::Controller => TrackedDeviceType::Controller,
        DeviceClass::TrackingReference => TrackedDeviceType::TrackingReference,
        DeviceClass::GenericTracker => TrackedDeviceType::Other,
        _ => TrackedDeviceType::Invalid,
    }
}
