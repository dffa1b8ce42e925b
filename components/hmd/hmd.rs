/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The engine's view of the headset.
//!
//! [`Hmd`] is driven from two places. The game context calls
//! [`Hmd::on_start_game_frame`] once per frame and asks about poses and
//! tracked devices; the render context calls [`Hmd::on_begin_rendering`],
//! [`Hmd::finish_rendering`] and [`Hmd::present`]. The embedder decides how
//! those contexts are scheduled; the pose produced by the render context is
//! handed to the game context at the start of every game frame.

use euclid::{Point2D, Rect, Size2D, Transform3D};
use hmd_api::util::FocusViewport;
use hmd_api::{
    ButtonEvent, Clip, DiscoveryAPI, Error, Eye, GameViewport, NativeTexture, Pixel, PoseType,
    PropertyKey, RenderHardware, ResolutionHeuristic, StereoPass, TextureDescriptor,
    TextureFormat, TrackedDeviceType, TrackingProvider, VIEW_COUNT, Visibility,
};
use log::{debug, info, warn};
use serde::Serialize;

use crate::pose::{
    BaseTransform, EnginePose, EngineRotation, EngineVector, head_pose_from_center_view,
};
use crate::prefs::HmdPrefs;
use crate::present::{PresentBridge, ResolutionFraction};
use crate::swap_chain::{BackendKind, COLOR_USAGE, RenderTarget};
use crate::tracking::{self, HMD_DEVICE_ID, SensorProperties, TrackingSnapshot, TrackingStatus};

/// Width of one quadrant of the view atlas.
const ATLAS_VIEW_WIDTH: i32 = 2048;
const CONTEXT_VIEW_HEIGHT: i32 = 2048;
const FOCUS_VIEW_HEIGHT: i32 = 1152;

/// The display the engine should size its window for.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MonitorInfo {
    pub name: String,
    pub id: u32,
    pub desktop_x: i32,
    pub desktop_y: i32,
    pub resolution_x: u32,
    pub resolution_y: u32,
}

pub struct Hmd {
    discovery: Box<dyn DiscoveryAPI>,
    bridge: PresentBridge,
    tracking: Option<Box<dyn TrackingProvider>>,
    resolution_heuristic: Option<Box<dyn ResolutionHeuristic>>,
    snapshot: TrackingSnapshot,
    started: bool,
    stereo_enabled: bool,
    headtracking_enabled: bool,
    base: BaseTransform,
    /// Head pose read by the game context, world-scaled, not yet relative to
    /// the base.
    game_pose: EnginePose,
    /// Head pose of the frame being rendered.
    render_pose: EnginePose,
    projections: [Transform3D<f32, Eye, Clip>; VIEW_COUNT],
}

impl Hmd {
    pub fn new(
        prefs: HmdPrefs,
        discovery: Box<dyn DiscoveryAPI>,
        rhi: Box<dyn RenderHardware>,
        backend: BackendKind,
    ) -> Hmd {
        Hmd {
            discovery,
            bridge: PresentBridge::new(backend, rhi, prefs),
            tracking: None,
            resolution_heuristic: None,
            snapshot: TrackingSnapshot::default(),
            started: false,
            stereo_enabled: false,
            headtracking_enabled: true,
            base: BaseTransform::default(),
            game_pose: EnginePose::identity(),
            render_pose: EnginePose::identity(),
            projections: [Transform3D::identity(); VIEW_COUNT],
        }
    }

    pub fn with_tracking(mut self, provider: Box<dyn TrackingProvider>) -> Hmd {
        self.tracking = Some(provider);
        self
    }

    pub fn with_resolution_heuristic(mut self, heuristic: Box<dyn ResolutionHeuristic>) -> Hmd {
        self.resolution_heuristic = Some(heuristic);
        self
    }

    fn world_to_meters(&self) -> f64 {
        self.bridge.prefs().world_to_meters
    }

    /// Connects to the runtime and brings up the bridge.
    ///
    /// A runtime that is installed but not running is tolerated: the bridge
    /// then runs without a session and renders with fallback projections.
    pub fn startup(&mut self) -> Result<(), Error> {
        if self.started {
            return Ok(());
        }
        if !self.discovery.is_available() {
            return Err(Error::Unsupported("HMD runtime is not available".into()));
        }
        info!("HMD runtime version {}", self.discovery.runtime_version());

        match self.discovery.connect() {
            Some(session) => self.bridge.attach_session(session),
            None => warn!("HMD runtime is not running, rendering without a headset"),
        }
        if let Err(error) = self.bridge.init() {
            warn!("Could not initialise the HMD bridge: {}", error);
            self.bridge.shutdown();
            return Err(error);
        }
        self.started = true;
        Ok(())
    }

    pub fn shutdown(&mut self) {
        if !self.started {
            return;
        }
        self.bridge.shutdown();
        self.started = false;
        self.stereo_enabled = false;
        self.render_pose = EnginePose::identity();
        self.game_pose = EnginePose::identity();
    }

    /// Turns stereo rendering on or off, starting or tearing down the
    /// device as needed.
    pub fn enable_stereo(&mut self, enable: bool) -> Result<(), Error> {
        if enable == self.stereo_enabled {
            return Ok(());
        }
        if enable {
            self.startup()?;
            self.stereo_enabled = true;
        } else {
            self.shutdown();
        }
        debug!("Stereo enabled: {}", enable);
        Ok(())
    }

    pub fn is_stereo_enabled(&self) -> bool {
        self.stereo_enabled
    }

    pub fn is_initialized(&self) -> bool {
        self.bridge.is_initialized()
    }

    /// Whether a headset is plugged in. Runtimes too old to say are assumed
    /// to have one.
    pub fn is_hmd_connected(&mut self) -> bool {
        let version = self.discovery.runtime_version();
        if version < self.bridge.prefs().minimum_runtime_version {
            return true;
        }
        if !self.discovery.is_available() {
            return false;
        }
        let Some(mut session) = self.discovery.connect() else {
            return false;
        };
        let connected = session.property_bool(PropertyKey::HmdConnected).unwrap_or(false);
        session.shutdown();
        connected
    }

    /// Game context, once per frame before anything reads a pose.
    pub fn on_start_game_frame(&mut self, viewport: &mut dyn GameViewport) {
        self.bridge.handle_events(viewport);
        let world_to_meters = self.world_to_meters();
        if let Some(provider) = self.tracking.as_mut() {
            self.snapshot
                .refresh(&mut **provider, world_to_meters, &self.base);
        }
        self.game_pose = self.render_pose;
    }

    /// Render context, at the start of a frame.
    pub fn on_begin_rendering(&mut self) {
        if let Some(heuristic) = self.resolution_heuristic.as_ref() {
            self.bridge
                .set_resolution_fraction(heuristic.current_fraction_for_frame());
        }
        let synced = self.bridge.begin_rendering();
        self.render_pose = synced.pose.scaled(self.world_to_meters());
        self.projections = synced.projections;
    }

    pub fn finish_rendering(&mut self) {
        self.bridge.finish_rendering();
    }

    pub fn present(&mut self, sync_interval: &mut u32) -> bool {
        self.bridge.present(sync_interval)
    }

    /// Refreshes the game-side head pose from the device's latest centre
    /// eye pose.
    pub fn update_hmd_pose(&mut self) {
        let Some(center) = self.bridge.frame_pose(PoseType::Center) else {
            return;
        };
        self.game_pose = head_pose_from_center_view(&center).scaled(self.world_to_meters());
    }

    pub fn render_pose(&self) -> EnginePose {
        self.base.relative(&self.render_pose)
    }

    pub fn stereo_projection_matrix(&self, pass: StereoPass) -> Transform3D<f32, Eye, Clip> {
        self.projections[pass.view_index()]
    }

    pub fn view_pass_for_index(&self, stereo_requested: bool, view_index: usize) -> StereoPass {
        StereoPass::for_view_index(stereo_requested, view_index)
    }

    pub fn view_index_for_pass(&self, pass: StereoPass) -> usize {
        pass.view_index()
    }

    pub fn desired_number_of_views(&self, stereo_requested: bool) -> usize {
        if stereo_requested { VIEW_COUNT } else { 1 }
    }

    /// Places a pass in the view atlas: contexts side by side on top, the
    /// focus views below them. A full pass only gets its width adjusted.
    pub fn adjust_view_rect(&self, pass: StereoPass, rect: Rect<i32, Pixel>) -> Rect<i32, Pixel> {
        let (x, y, height) = match pass {
            StereoPass::Full => (rect.origin.x, rect.origin.y, rect.size.height),
            StereoPass::LeftEye => (0, 0, CONTEXT_VIEW_HEIGHT),
            StereoPass::RightEye => (ATLAS_VIEW_WIDTH, 0, CONTEXT_VIEW_HEIGHT),
            StereoPass::LeftFocus => (0, CONTEXT_VIEW_HEIGHT, FOCUS_VIEW_HEIGHT),
            StereoPass::RightFocus => (ATLAS_VIEW_WIDTH, CONTEXT_VIEW_HEIGHT, FOCUS_VIEW_HEIGHT),
        };
        Rect::new(Point2D::new(x, y), Size2D::new(ATLAS_VIEW_WIDTH, height))
    }

    pub fn focus_view_pos_and_size(&self, pass: StereoPass) -> FocusViewport {
        self.bridge.focus_view_pos_and_size(pass)
    }

    /// Offset of an eye from the head, in world units.
    pub fn relative_eye_pose(&mut self, device_id: usize, pass: StereoPass) -> Option<EnginePose> {
        if device_id != HMD_DEVICE_ID {
            return None;
        }
        let half = if pass.is_left() { -0.5 } else { 0.5 };
        let offset = half * self.interpupillary_distance() * self.world_to_meters();
        Some(EnginePose::new(
            EngineRotation::identity(),
            EngineVector::new(0., offset, 0.),
        ))
    }

    /// The wearer's IPD in metres, as estimated by eye tracking when the
    /// estimate is plausible.
    pub fn interpupillary_distance(&mut self) -> f64 {
        let measured = self
            .bridge
            .property_f64(PropertyKey::GazeIpdEstimate)
            .map(|millimetres| millimetres / 1000.);
        self.bridge.prefs().clamp_ipd(measured)
    }

    pub fn monitor_info(&self) -> MonitorInfo {
        let size = self.calculate_render_target_size();
        MonitorInfo {
            name: "HMD".into(),
            id: 0,
            desktop_x: 0,
            desktop_y: 0,
            resolution_x: size.width,
            resolution_y: size.height,
        }
    }

    pub fn calculate_render_target_size(&self) -> Size2D<u32, Pixel> {
        self.bridge.prefs().render_target_size()
    }

    pub fn needs_reallocate_render_target(&self, current: Size2D<u32, Pixel>) -> bool {
        current != self.calculate_render_target_size()
    }

    /// The render target the engine draws into: device images when there is
    /// a session, a plain engine texture otherwise.
    pub fn allocate_render_target_texture(&mut self) -> Result<RenderTarget, Error> {
        if self.bridge.is_initialized() {
            return self.bridge.create_render_target_texture();
        }
        let size = self.calculate_render_target_size();
        let texture = self.bridge.rhi_mut().allocate_texture(&TextureDescriptor {
            width: size.width,
            height: size.height,
            format: TextureFormat::B8G8R8A8,
            usage: COLOR_USAGE,
        });
        Ok(RenderTarget::single(texture))
    }

    pub fn allocate_depth_target_texture(&mut self) -> Option<RenderTarget> {
        self.bridge.create_depth_target_texture()
    }

    /// Tells the bridge which engine texture the viewport resolves into.
    pub fn update_viewport(&mut self, native: NativeTexture) {
        self.bridge.update_viewport(native);
    }

    pub fn current_render_texture(&self) -> Option<NativeTexture> {
        self.bridge.current_render_texture()
    }

    pub fn draw_hidden_area_mesh(&mut self, pass: StereoPass) {
        if let Some(view_index) = pass.stereo_view_index() {
            self.bridge.render_occlusion_mesh(view_index);
        }
    }

    pub fn button_event(&self) -> Option<ButtonEvent> {
        self.bridge.button_event()
    }

    pub fn visibility(&self) -> Visibility {
        self.bridge.visibility()
    }

    /// The pose of a tracked device, relative to the base. `None` when the
    /// device has no usable pose, or for the headset when head tracking is
    /// off or there is no session.
    pub fn current_pose(&self, device_id: usize) -> Option<EnginePose> {
        if device_id == HMD_DEVICE_ID {
            if !self.headtracking_enabled || !self.bridge.is_initialized() {
                return None;
            }
            return Some(self.base.relative(&self.game_pose));
        }
        let device = self.snapshot.device(device_id)?;
        (device.pose_valid && device.connected).then_some(device.pose)
    }

    pub fn enumerate_tracked_devices(&self, kind: TrackedDeviceType) -> Vec<usize> {
        self.snapshot.enumerate(kind)
    }

    pub fn is_tracking(&self, device_id: usize) -> bool {
        if device_id == HMD_DEVICE_ID {
            return self.headtracking_enabled && self.bridge.is_initialized();
        }
        self.snapshot.is_tracking(device_id)
    }

    pub fn has_vision_tracking(&self) -> bool {
        self.snapshot.has_vision_tracking()
    }

    pub fn is_device_connected(&self, device_id: usize) -> bool {
        self.snapshot.is_device_connected(device_id)
    }

    pub fn device_battery_level(&self, device_id: usize) -> f32 {
        self.snapshot.battery(device_id)
    }

    pub fn controller_tracking_status(&self, device_id: usize) -> TrackingStatus {
        self.snapshot.controller_tracking_status(device_id)
    }

    /// The headset is described from its live pose, every other device from
    /// the last tracking refresh.
    pub fn tracking_sensor_properties(&self, device_id: usize) -> Option<SensorProperties> {
        let provider = self.tracking.as_ref()?;
        if device_id == HMD_DEVICE_ID {
            let pose = self.current_pose(HMD_DEVICE_ID)?;
            return Some(tracking::sensor_properties_at(
                &**provider,
                device_id,
                &pose,
                self.world_to_meters(),
            ));
        }
        self.snapshot
            .sensor_properties(&**provider, device_id, self.world_to_meters())
    }

    /// Makes the current head position the origin.
    pub fn reset_position(&mut self) {
        self.base.offset = self.game_pose.position;
    }

    /// Makes the current heading, minus `yaw` degrees, the forward direction.
    /// Pitch and roll are never reset.
    pub fn reset_orientation(&mut self, yaw: f64) {
        self.base.orientation = BaseTransform::yaw_only(&self.game_pose.orientation, yaw);
    }

    pub fn reset_orientation_and_position(&mut self, yaw: f64) {
        self.reset_orientation(yaw);
        self.reset_position();
    }

    pub fn set_base_orientation(&mut self, orientation: EngineRotation) {
        self.base.orientation = orientation;
    }

    pub fn base_orientation(&self) -> EngineRotation {
        self.base.orientation
    }

    pub fn set_headtracking_enabled(&mut self, enabled: bool) {
        self.headtracking_enabled = enabled;
    }

    pub fn set_world_to_meters(&mut self, world_to_meters: f64) {
        if world_to_meters > 0. {
            self.bridge.set_world_to_meters(world_to_meters);
        } else {
            warn!("Ignoring world to meters scale {}", world_to_meters);
        }
    }

    pub fn resolution_fraction(&self) -> ResolutionFraction {
        self.bridge.resolution_fraction().clone()
    }

    pub fn prefs(&self) -> &HmdPrefs {
        self.bridge.prefs()
    }
}

impl Drop for Hmd {
    fn drop(&mut self) {
        self.shutdown();
    }
}
