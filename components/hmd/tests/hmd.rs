/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::sync::Arc;

use crossbeam_channel::Sender;
use euclid::{Point2D, Rect, Size2D, Transform3D};
use hmd_api::mock::{
    FixedResolution, MockDeviceInit, MockDeviceLedger, MockDeviceMsg, MockDiscovery,
    MockRenderHardware, MockRenderLedger, MockTrackedDevice, MockTrackingMsg,
    MockTrackingProvider,
};
use hmd_api::util::device_to_engine_projection;
use hmd_api::{
    DeviceClass, Error, RawDevicePose, RuntimeVersion, StereoPass, TrackedDeviceType,
    TrackingResult, ViewInfo,
};
use hmd_bridge::pose::yaw_degrees;
use hmd_bridge::{BackendKind, HMD_DEVICE_ID, Hmd, HmdPrefs};
use parking_lot::Mutex;

use crate::{TestViewport, assert_close};

struct HmdHarness {
    hmd: Hmd,
    device: Sender<MockDeviceMsg>,
    ledger: Arc<Mutex<MockDeviceLedger>>,
    render: Arc<Mutex<MockRenderLedger>>,
}

fn hmd_with(init: MockDeviceInit, configure: impl FnOnce(&mut MockDiscovery)) -> HmdHarness {
    let (mut discovery, device, ledger) = MockDiscovery::new(init);
    configure(&mut discovery);
    let (rhi, render) = MockRenderHardware::new();
    let hmd = Hmd::new(
        HmdPrefs::default(),
        Box::new(discovery),
        Box::new(rhi),
        BackendKind::IndexedSwapChain,
    );
    HmdHarness {
        hmd,
        device,
        ledger,
        render,
    }
}

fn started_hmd() -> HmdHarness {
    let mut harness = hmd_with(MockDeviceInit::default(), |_| {});
    harness.hmd.startup().expect("startup");
    harness
}

fn translated_views(x: f64, y: f64, z: f64) -> Vec<ViewInfo> {
    MockDeviceInit::default()
        .views
        .into_iter()
        .map(|view| ViewInfo {
            view_matrix: Transform3D::translation(x, y, z),
            ..view
        })
        .collect()
}

#[test]
fn test_startup_fails_without_a_runtime() {
    let mut harness = hmd_with(MockDeviceInit::default(), |discovery| {
        discovery.available = false
    });
    assert!(matches!(harness.hmd.startup(), Err(Error::Unsupported(_))));
    assert!(harness.hmd.enable_stereo(true).is_err());
    assert!(!harness.hmd.is_stereo_enabled());
    assert_eq!(harness.ledger.lock().sessions_opened, 0);
}

#[test]
fn test_startup_without_a_running_runtime() {
    let mut harness = hmd_with(MockDeviceInit::default(), |discovery| {
        discovery.running = false
    });
    assert!(harness.hmd.startup().is_ok());
    assert!(!harness.hmd.is_initialized());
    assert_eq!(harness.hmd.current_pose(HMD_DEVICE_ID), None);
    assert!(!harness.hmd.is_tracking(HMD_DEVICE_ID));

    let target = harness.hmd.allocate_render_target_texture().unwrap();
    let render = harness.render.lock();
    assert_eq!(render.allocations, 1);
    let texture = &render.textures[&target.targetable];
    let descriptor = texture.descriptor.expect("engine allocated texture");
    assert_eq!((descriptor.width, descriptor.height), (4096, 3200));
}

#[test]
fn test_enable_stereo_only_acts_on_changes() {
    let mut harness = hmd_with(MockDeviceInit::default(), |_| {});
    harness.hmd.enable_stereo(true).unwrap();
    harness.hmd.enable_stereo(true).unwrap();
    assert!(harness.hmd.is_stereo_enabled());
    assert!(harness.hmd.is_initialized());
    assert_eq!(harness.ledger.lock().sessions_opened, 1);

    harness.hmd.enable_stereo(false).unwrap();
    harness.hmd.enable_stereo(false).unwrap();
    assert!(!harness.hmd.is_stereo_enabled());
    assert!(!harness.hmd.is_initialized());

    let ledger = harness.ledger.lock();
    assert_eq!(ledger.sessions_shut_down, 1);
    assert!(ledger.violations.is_empty(), "{:?}", ledger.violations);
}

#[test]
fn test_old_runtimes_are_always_connected() {
    let mut harness = hmd_with(
        MockDeviceInit {
            hmd_connected: false,
            ..MockDeviceInit::default()
        },
        |discovery| discovery.version = RuntimeVersion::new(1, 3, 9, 0),
    );
    assert!(harness.hmd.is_hmd_connected());
    assert_eq!(harness.ledger.lock().sessions_opened, 0);
}

#[test]
fn test_connection_is_checked_with_a_short_lived_session() {
    let mut harness = hmd_with(
        MockDeviceInit {
            hmd_connected: false,
            ..MockDeviceInit::default()
        },
        |_| {},
    );
    assert!(!harness.hmd.is_hmd_connected());
    let ledger = harness.ledger.lock();
    assert_eq!(ledger.sessions_opened, 1);
    assert_eq!(ledger.sessions_shut_down, 1);
}

#[test]
fn test_interpupillary_distance_uses_plausible_estimates() {
    let mut harness = started_hmd();
    assert_close(harness.hmd.interpupillary_distance(), 0.064);

    harness
        .device
        .send(MockDeviceMsg::SetIpdEstimate(Some(70.)))
        .unwrap();
    assert_close(harness.hmd.interpupillary_distance(), 0.070);

    harness
        .device
        .send(MockDeviceMsg::SetIpdEstimate(Some(100.)))
        .unwrap();
    assert_close(harness.hmd.interpupillary_distance(), 0.064);
}

#[test]
fn test_relative_eye_pose() {
    let mut harness = started_hmd();
    let left = harness
        .hmd
        .relative_eye_pose(HMD_DEVICE_ID, StereoPass::LeftFocus)
        .unwrap();
    assert_close(left.position.y, -3.2);
    assert_close(left.position.x, 0.);

    let right = harness
        .hmd
        .relative_eye_pose(HMD_DEVICE_ID, StereoPass::RightEye)
        .unwrap();
    assert_close(right.position.y, 3.2);

    assert!(
        harness
            .hmd
            .relative_eye_pose(1, StereoPass::LeftEye)
            .is_none()
    );
}

#[test]
fn test_view_atlas_layout() {
    let harness = started_hmd();
    let rect = |x, y, width, height| Rect::new(Point2D::new(x, y), Size2D::new(width, height));
    let input = rect(10, 20, 100, 200);

    assert_eq!(
        harness.hmd.adjust_view_rect(StereoPass::LeftEye, input),
        rect(0, 0, 2048, 2048)
    );
    assert_eq!(
        harness.hmd.adjust_view_rect(StereoPass::RightEye, input),
        rect(2048, 0, 2048, 2048)
    );
    assert_eq!(
        harness.hmd.adjust_view_rect(StereoPass::LeftFocus, input),
        rect(0, 2048, 2048, 1152)
    );
    assert_eq!(
        harness.hmd.adjust_view_rect(StereoPass::RightFocus, input),
        rect(2048, 2048, 2048, 1152)
    );
    assert_eq!(
        harness.hmd.adjust_view_rect(StereoPass::Full, input),
        rect(10, 20, 2048, 200)
    );
}

#[test]
fn test_view_passes() {
    let harness = started_hmd();
    assert_eq!(harness.hmd.desired_number_of_views(true), 4);
    assert_eq!(harness.hmd.desired_number_of_views(false), 1);
    assert_eq!(
        harness.hmd.view_pass_for_index(true, 3),
        StereoPass::RightFocus
    );
    assert_eq!(harness.hmd.view_pass_for_index(false, 3), StereoPass::Full);
    assert_eq!(harness.hmd.view_index_for_pass(StereoPass::LeftFocus), 2);
    assert_eq!(harness.hmd.view_index_for_pass(StereoPass::Full), 0);
}

#[test]
fn test_monitor_and_render_target_size() {
    let harness = started_hmd();
    let monitor = harness.hmd.monitor_info();
    assert_eq!(monitor.name, "HMD");
    assert_eq!((monitor.resolution_x, monitor.resolution_y), (4096, 3200));

    let size = harness.hmd.calculate_render_target_size();
    assert_eq!((size.width, size.height), (4096, 3200));
    assert!(!harness.hmd.needs_reallocate_render_target(size));
    assert!(
        harness
            .hmd
            .needs_reallocate_render_target(Size2D::new(1920, 1080))
    );
}

#[test]
fn test_frame_flow_hands_the_pose_to_the_game() {
    let mut harness = started_hmd();
    let mut viewport = TestViewport::default();
    harness
        .device
        .send(MockDeviceMsg::SetViews(translated_views(0.1, 0.2, 0.3)))
        .unwrap();

    harness.hmd.on_begin_rendering();
    let render_pose = harness.hmd.render_pose();
    assert_close(render_pose.position.x, 30.);
    assert_close(render_pose.position.y, -10.);
    assert_close(render_pose.position.z, -20.);

    // Not visible to the game until the next game frame starts.
    let before = harness.hmd.current_pose(HMD_DEVICE_ID).unwrap();
    assert_close(before.position.x, 0.);

    harness.hmd.on_start_game_frame(&mut viewport);
    let pose = harness.hmd.current_pose(HMD_DEVICE_ID).unwrap();
    assert_close(pose.position.x, 30.);

    let mut sync_interval = 0;
    harness.hmd.finish_rendering();
    assert!(harness.hmd.present(&mut sync_interval));
    assert_eq!(harness.ledger.lock().submissions.len(), 1);

    let expected = device_to_engine_projection(
        &MockDeviceInit::default().views[1].projection_matrix,
        10.0,
    );
    assert_eq!(
        harness.hmd.stereo_projection_matrix(StereoPass::RightEye),
        expected
    );
}

#[test]
fn test_reset_position_recentres_the_head() {
    let mut harness = started_hmd();
    let mut viewport = TestViewport::default();
    harness
        .device
        .send(MockDeviceMsg::SetViews(translated_views(0.1, 0.2, 0.3)))
        .unwrap();
    harness.hmd.on_begin_rendering();
    harness.hmd.on_start_game_frame(&mut viewport);

    harness.hmd.reset_position();
    let pose = harness.hmd.current_pose(HMD_DEVICE_ID).unwrap();
    assert_close(pose.position.length(), 0.);
}

#[test]
fn test_headtracking_can_be_disabled() {
    let mut harness = started_hmd();
    harness.hmd.set_headtracking_enabled(false);
    assert_eq!(harness.hmd.current_pose(HMD_DEVICE_ID), None);
    assert!(!harness.hmd.is_tracking(HMD_DEVICE_ID));

    harness.hmd.set_headtracking_enabled(true);
    assert!(harness.hmd.current_pose(HMD_DEVICE_ID).is_some());
}

#[test]
fn test_update_hmd_pose_reads_the_centre_eye() {
    let mut harness = started_hmd();
    harness
        .device
        .send(MockDeviceMsg::SetCenterPose(Transform3D::translation(
            1., 2., 3.,
        )))
        .unwrap();
    // Messages are picked up by the next query that reaches the device.
    harness.hmd.interpupillary_distance();
    harness.hmd.update_hmd_pose();

    let pose = harness.hmd.current_pose(HMD_DEVICE_ID).unwrap();
    assert_close(pose.position.x, -300.);
    assert_close(pose.position.y, 100.);
    assert_close(pose.position.z, 200.);
}

#[test]
fn test_reset_orientation_keeps_only_yaw() {
    let mut harness = started_hmd();
    harness.hmd.reset_orientation(30.);
    assert_close(yaw_degrees(&harness.hmd.base_orientation()), -30.);

    harness.hmd.reset_orientation_and_position(0.);
    assert_close(yaw_degrees(&harness.hmd.base_orientation()), 0.);
}

#[test]
fn test_resolution_heuristic_feeds_the_fraction() {
    let (discovery, _device, ledger) = MockDiscovery::new(MockDeviceInit::default());
    let (rhi, _render) = MockRenderHardware::new();
    let mut hmd = Hmd::new(
        HmdPrefs::default(),
        Box::new(discovery),
        Box::new(rhi),
        BackendKind::DirectSubmission,
    )
    .with_resolution_heuristic(Box::new(FixedResolution(0.5)));
    hmd.startup().unwrap();

    let fraction = hmd.resolution_fraction();
    hmd.on_begin_rendering();
    assert_eq!(fraction.get(), 0.5);

    let mut sync_interval = 0;
    hmd.present(&mut sync_interval);
    assert_eq!(ledger.lock().submissions.len(), 1);
}

#[test]
fn test_hidden_area_mesh_is_only_drawn_for_stereo_passes() {
    let mut harness = started_hmd();
    harness.hmd.draw_hidden_area_mesh(StereoPass::Full);
    harness.hmd.draw_hidden_area_mesh(StereoPass::RightEye);
    harness.hmd.draw_hidden_area_mesh(StereoPass::LeftFocus);
    assert_eq!(harness.render.lock().hidden_area_draws, vec![(1, 1)]);
}

#[test]
fn test_tracked_devices_through_the_hmd() {
    let (provider, tracking) = MockTrackingProvider::new();
    let (discovery, _device, _ledger) = MockDiscovery::new(MockDeviceInit::default());
    let (rhi, _render) = MockRenderHardware::new();
    let mut hmd = Hmd::new(
        HmdPrefs::default(),
        Box::new(discovery),
        Box::new(rhi),
        BackendKind::IndexedSwapChain,
    )
    .with_tracking(Box::new(provider));
    hmd.startup().unwrap();

    tracking
        .send(MockTrackingMsg::SetDevice(3, MockTrackedDevice {
            pose: RawDevicePose {
                device_to_absolute: RawDevicePose::IDENTITY,
                tracking_result: TrackingResult::RunningOk,
                pose_is_valid: true,
                device_is_connected: true,
            },
            class: DeviceClass::Controller,
            battery: 42.,
            render_model_name: None,
        }))
        .unwrap();
    hmd.on_start_game_frame(&mut TestViewport::default());

    assert_eq!(
        hmd.enumerate_tracked_devices(TrackedDeviceType::Controller),
        vec![3]
    );
    assert!(hmd.is_tracking(3));
    assert!(hmd.is_device_connected(3));
    assert!(hmd.has_vision_tracking());
    assert_eq!(hmd.device_battery_level(3), 42.);
    assert_eq!(hmd.device_battery_level(99), -1.);
    assert!(hmd.current_pose(3).is_some());
    assert!(hmd.current_pose(4).is_none());
    assert!(hmd.tracking_sensor_properties(3).is_some());

    tracking.send(MockTrackingMsg::RemoveDevice(3)).unwrap();
    hmd.on_start_game_frame(&mut TestViewport::default());
    assert!(!hmd.is_tracking(3));
    assert!(
        hmd.enumerate_tracked_devices(TrackedDeviceType::Controller)
            .is_empty()
    );
}

#[test]
fn test_headset_sensor_properties_follow_the_live_pose() {
    let (provider, _tracking) = MockTrackingProvider::new();
    let (discovery, device, _ledger) = MockDiscovery::new(MockDeviceInit::default());
    let (rhi, _render) = MockRenderHardware::new();
    let mut hmd = Hmd::new(
        HmdPrefs::default(),
        Box::new(discovery),
        Box::new(rhi),
        BackendKind::IndexedSwapChain,
    )
    .with_tracking(Box::new(provider));
    hmd.startup().unwrap();
    device
        .send(MockDeviceMsg::SetViews(translated_views(0.1, 0.2, 0.3)))
        .unwrap();

    hmd.on_begin_rendering();
    hmd.on_start_game_frame(&mut TestViewport::default());
    let properties = hmd.tracking_sensor_properties(HMD_DEVICE_ID).unwrap();
    assert_close(properties.origin.x, 30.);
    assert_close(properties.origin.y, -10.);
    assert_close(properties.origin.z, -20.);
    assert!((properties.camera_distance - 1400f32.sqrt()).abs() < 1.0e-3);

    hmd.set_headtracking_enabled(false);
    assert!(hmd.tracking_sensor_properties(HMD_DEVICE_ID).is_none());
}

#[test]
fn test_world_to_meters_must_be_positive() {
    let mut harness = started_hmd();
    harness.hmd.set_world_to_meters(0.);
    assert_eq!(harness.hmd.prefs().world_to_meters, 100.);
    harness.hmd.set_world_to_meters(1.);
    assert_eq!(harness.hmd.prefs().world_to_meters, 1.);
}

#[test]
fn test_shutdown_twice() {
    let mut harness = started_hmd();
    harness.hmd.allocate_render_target_texture().unwrap();
    harness.hmd.on_begin_rendering();
    harness.hmd.shutdown();
    harness.hmd.shutdown();

    let ledger = harness.ledger.lock();
    assert_eq!(ledger.sessions_shut_down, 1);
    assert_eq!(ledger.swap_chains_destroyed.len(), 1);
    assert!(ledger.violations.is_empty(), "{:?}", ledger.violations);
}
