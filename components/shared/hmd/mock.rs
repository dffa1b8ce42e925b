/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! In-memory stand-ins for the device runtime, the tracking provider and the
//! engine's render hardware. Each mock is steered with messages sent over a
//! channel and records what it was asked to do in a shared ledger.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use euclid::{Point2D, Transform3D};
use parking_lot::Mutex;

use crate::util::AlignedView;
use crate::{
    Device, DeviceAPI, DeviceClass, DeviceErrorCode, DeviceEvent, DiscoveryAPI, Eye,
    FloatPropertyKey, FrameInfo, GraphicsInfo, HiddenAreaMesh, MAX_TRACKED_DEVICES, Mesh2D,
    NativeTexture, PoseType, PropertyKey, RawDevicePose, RenderHardware, ResolutionHeuristic,
    RuntimeVersion, SubmitInfo, SubmitInfoLayers, SwapChainConfig, SwapChainId, TextureDescriptor,
    TextureFormat, TextureHandle, TextureUsage, TrackingProvider, VIEW_COUNT, ViewInfo, Viewport,
    WindingOrder,
};

const DIRECT_TEXTURE_BASE: u64 = 0xD000;

/// How a mock device describes itself.
#[derive(Clone, Debug)]
pub struct MockDeviceInit {
    pub views: Vec<ViewInfo>,
    pub viewports: Vec<Viewport>,
    pub swap_chain_config: SwapChainConfig,
    pub occlusion_meshes: Vec<Mesh2D>,
    /// Number of textures handed out for direct submission.
    pub direct_texture_count: usize,
    pub ipd_estimate_mm: Option<f64>,
    pub hmd_connected: bool,
    pub center_pose: Transform3D<f64, Device, Eye>,
}

impl Default for MockDeviceInit {
    fn default() -> Self {
        let context = AlignedView::new(1., 1., 1., 1.);
        let focus = AlignedView::new(0.5, 0.5, 0.5, 0.5);
        let view = |aligned: AlignedView, eye_offset: f64| ViewInfo {
            view_matrix: Transform3D::translation(eye_offset, 0., 0.),
            projection_matrix: aligned.to_projection(0.1, 1000.),
        };
        let triangle = Mesh2D {
            vertices: vec![
                Point2D::new(-1., -1.),
                Point2D::new(-0.8, -1.),
                Point2D::new(-1., -0.8),
            ],
        };
        MockDeviceInit {
            views: vec![
                view(context, 0.032),
                view(context, -0.032),
                view(focus, 0.032),
                view(focus, -0.032),
            ],
            viewports: vec![
                Viewport::new(0, 0, 2048, 2048),
                Viewport::new(2048, 0, 2048, 2048),
                Viewport::new(0, 2048, 2048, 1152),
                Viewport::new(2048, 2048, 2048, 1152),
            ],
            swap_chain_config: SwapChainConfig {
                format: TextureFormat::B8G8R8A8Srgb,
                texture_count: 3,
                width: 4096,
                height: 3200,
                array_size: 1,
            },
            occlusion_meshes: vec![
                triangle.clone(),
                triangle,
                Mesh2D::default(),
                Mesh2D::default(),
            ],
            direct_texture_count: 3,
            ipd_estimate_mm: None,
            hmd_connected: true,
            center_pose: Transform3D::identity(),
        }
    }
}

#[derive(Debug)]
pub enum MockDeviceMsg {
    QueueEvent(DeviceEvent),
    SetViews(Vec<ViewInfo>),
    RaiseError(DeviceErrorCode),
    SetIpdEstimate(Option<f64>),
    SetCenterPose(Transform3D<f64, Device, Eye>),
    SetDirectIndex(usize),
}

/// A recorded end-of-frame call.
#[derive(Clone, Debug, PartialEq)]
pub enum MockSubmission {
    Direct {
        frame_number: i64,
        submit_info: SubmitInfo,
    },
    Layers(SubmitInfoLayers),
}

/// Everything the mock device was asked to do.
#[derive(Debug, Default)]
pub struct MockDeviceLedger {
    pub sessions_opened: usize,
    pub sessions_shut_down: usize,
    pub wait_syncs: usize,
    pub begin_frames: usize,
    pub submissions: Vec<MockSubmission>,
    pub graphics_inits: usize,
    pub graphics_shutdowns: usize,
    pub swap_chains_created: Vec<(SwapChainId, SwapChainConfig)>,
    pub swap_chains_destroyed: Vec<SwapChainId>,
    pub acquires: Vec<(SwapChainId, usize)>,
    pub releases: Vec<SwapChainId>,
    pub occlusion_meshes_created: usize,
    pub events_polled: usize,
    /// Calls that broke the runtime's ordering rules.
    pub violations: Vec<String>,
}

impl MockDeviceLedger {
    pub fn acquire_count(&self, swap_chain: SwapChainId) -> usize {
        self.acquires.iter().filter(|(id, _)| *id == swap_chain).count()
    }

    pub fn release_count(&self, swap_chain: SwapChainId) -> usize {
        self.releases.iter().filter(|id| **id == swap_chain).count()
    }
}

struct MockSwapChain {
    config: SwapChainConfig,
    next_index: usize,
    acquired: Option<usize>,
}

pub struct MockDevice {
    init: MockDeviceInit,
    receiver: Receiver<MockDeviceMsg>,
    ledger: Arc<Mutex<MockDeviceLedger>>,
    events: VecDeque<DeviceEvent>,
    errors: VecDeque<DeviceErrorCode>,
    frame_number: i64,
    in_frame: bool,
    swap_chains: HashMap<SwapChainId, MockSwapChain>,
    next_swap_chain: u32,
    graphics: bool,
    direct_index: usize,
    shut_down: bool,
}

impl MockDevice {
    pub fn new(
        init: MockDeviceInit,
        receiver: Receiver<MockDeviceMsg>,
        ledger: Arc<Mutex<MockDeviceLedger>>,
    ) -> MockDevice {
        ledger.lock().sessions_opened += 1;
        MockDevice {
            init,
            receiver,
            ledger,
            events: VecDeque::new(),
            errors: VecDeque::new(),
            frame_number: 0,
            in_frame: false,
            swap_chains: HashMap::new(),
            next_swap_chain: 1,
            graphics: false,
            direct_index: 0,
            shut_down: false,
        }
    }

    /// The native texture a mock swap chain hands out for an image.
    pub fn image_texture(swap_chain: SwapChainId, index: usize) -> NativeTexture {
        NativeTexture(((swap_chain.0 as u64) << 32) | index as u64)
    }

    /// The native texture of a direct-submission array slot.
    pub fn direct_texture(index: usize) -> NativeTexture {
        NativeTexture(DIRECT_TEXTURE_BASE + index as u64)
    }

    fn handle_messages(&mut self) {
        while let Ok(msg) = self.receiver.try_recv() {
            match msg {
                MockDeviceMsg::QueueEvent(event) => self.events.push_back(event),
                MockDeviceMsg::SetViews(views) => self.init.views = views,
                MockDeviceMsg::RaiseError(code) => self.errors.push_back(code),
                MockDeviceMsg::SetIpdEstimate(ipd) => self.init.ipd_estimate_mm = ipd,
                MockDeviceMsg::SetCenterPose(pose) => self.init.center_pose = pose,
                MockDeviceMsg::SetDirectIndex(index) => self.direct_index = index,
            }
        }
    }

    fn violation(&self, what: String) {
        log::debug!("Mock device violation: {}", what);
        self.ledger.lock().violations.push(what);
    }
}

impl DeviceAPI for MockDevice {
    fn wait_sync(&mut self, frame_info: &mut FrameInfo) {
        self.handle_messages();
        self.frame_number += 1;
        frame_info.views = self.init.views.clone();
        frame_info.frame_number = self.frame_number;
        frame_info.display_time = self.frame_number * 11_111_111;
        self.ledger.lock().wait_syncs += 1;
    }

    fn begin_frame(&mut self) {
        if self.in_frame {
            self.violation(format!("begin_frame {} while in frame", self.frame_number));
        }
        self.in_frame = true;
        self.ledger.lock().begin_frames += 1;
    }

    fn end_frame(&mut self, frame_info: &FrameInfo, submit_info: &SubmitInfo) {
        if !self.in_frame {
            self.violation("end_frame without begin_frame".into());
        }
        self.in_frame = false;
        self.ledger.lock().submissions.push(MockSubmission::Direct {
            frame_number: frame_info.frame_number,
            submit_info: submit_info.clone(),
        });
    }

    fn end_frame_with_layers(&mut self, submit_info: &SubmitInfoLayers) {
        if !self.in_frame {
            self.violation("end_frame_with_layers without begin_frame".into());
        }
        self.in_frame = false;
        self.ledger
            .lock()
            .submissions
            .push(MockSubmission::Layers(submit_info.clone()));
    }

    fn get_error(&mut self) -> Option<DeviceErrorCode> {
        self.handle_messages();
        self.errors.pop_front()
    }

    fn poll_event(&mut self) -> Option<DeviceEvent> {
        self.handle_messages();
        let event = self.events.pop_front();
        if event.is_some() {
            self.ledger.lock().events_polled += 1;
        }
        event
    }

    fn create_frame_info(&mut self) -> FrameInfo {
        FrameInfo::new(VIEW_COUNT)
    }

    fn default_viewports(&mut self) -> Vec<Viewport> {
        self.init.viewports.clone()
    }

    fn default_swap_chain_config(&mut self) -> SwapChainConfig {
        self.init.swap_chain_config
    }

    fn create_occlusion_mesh(&mut self, view_index: usize, _winding: WindingOrder) -> Mesh2D {
        self.ledger.lock().occlusion_meshes_created += 1;
        self.init
            .occlusion_meshes
            .get(view_index)
            .cloned()
            .unwrap_or_default()
    }

    fn init_graphics(&mut self, _format: TextureFormat) -> Option<GraphicsInfo> {
        self.ledger.lock().graphics_inits += 1;
        self.graphics = true;
        Some(GraphicsInfo {
            swap_chain_textures: (0..self.init.direct_texture_count)
                .map(MockDevice::direct_texture)
                .collect(),
            view_count: self.init.views.len(),
        })
    }

    fn shutdown_graphics(&mut self) {
        if !self.graphics {
            self.violation("shutdown_graphics without init_graphics".into());
        }
        self.graphics = false;
        self.ledger.lock().graphics_shutdowns += 1;
    }

    fn swap_chain_current_index(&mut self) -> usize {
        self.handle_messages();
        self.direct_index
    }

    fn create_swap_chain(&mut self, config: &SwapChainConfig) -> Option<SwapChainId> {
        let id = SwapChainId(self.next_swap_chain);
        self.next_swap_chain += 1;
        self.swap_chains.insert(
            id,
            MockSwapChain {
                config: *config,
                next_index: 0,
                acquired: None,
            },
        );
        self.ledger.lock().swap_chains_created.push((id, *config));
        Some(id)
    }

    fn destroy_swap_chain(&mut self, swap_chain: SwapChainId) {
        if self.swap_chains.remove(&swap_chain).is_none() {
            self.violation(format!("destroy of unknown swap chain {:?}", swap_chain));
        }
        self.ledger.lock().swap_chains_destroyed.push(swap_chain);
    }

    fn swap_chain_image(&mut self, swap_chain: SwapChainId, index: usize) -> NativeTexture {
        MockDevice::image_texture(swap_chain, index)
    }

    fn acquire_swap_chain_image(&mut self, swap_chain: SwapChainId) -> Option<usize> {
        let Some(chain) = self.swap_chains.get_mut(&swap_chain) else {
            self.violation(format!("acquire on unknown swap chain {:?}", swap_chain));
            return None;
        };
        if chain.acquired.is_some() {
            let what = format!("double acquire on {:?}", swap_chain);
            self.violation(what);
            return None;
        }
        let index = chain.next_index;
        chain.next_index = (index + 1) % chain.config.texture_count.max(1) as usize;
        chain.acquired = Some(index);
        self.ledger.lock().acquires.push((swap_chain, index));
        Some(index)
    }

    fn release_swap_chain_image(&mut self, swap_chain: SwapChainId) {
        let released = self
            .swap_chains
            .get_mut(&swap_chain)
            .and_then(|chain| chain.acquired.take());
        if released.is_none() {
            self.violation(format!("release without acquire on {:?}", swap_chain));
        }
        self.ledger.lock().releases.push(swap_chain);
    }

    fn frame_pose(&mut self, pose: PoseType) -> Transform3D<f64, Device, Eye> {
        match pose {
            PoseType::Center => self.init.center_pose,
            PoseType::LeftEye => self.init.views[0].view_matrix,
            PoseType::RightEye => self.init.views[1].view_matrix,
        }
    }

    fn property_f64(&mut self, key: PropertyKey) -> Option<f64> {
        self.handle_messages();
        match key {
            PropertyKey::GazeIpdEstimate => self.init.ipd_estimate_mm,
            PropertyKey::HmdConnected => None,
        }
    }

    fn property_bool(&mut self, key: PropertyKey) -> Option<bool> {
        match key {
            PropertyKey::HmdConnected => Some(self.init.hmd_connected),
            PropertyKey::GazeIpdEstimate => None,
        }
    }

    fn shutdown(&mut self) {
        if self.shut_down {
            self.violation("session shut down twice".into());
        }
        self.shut_down = true;
        self.ledger.lock().sessions_shut_down += 1;
    }
}

/// Opens [`MockDevice`] sessions that all report to one ledger.
pub struct MockDiscovery {
    pub available: bool,
    pub running: bool,
    pub version: RuntimeVersion,
    init: MockDeviceInit,
    receiver: Receiver<MockDeviceMsg>,
    ledger: Arc<Mutex<MockDeviceLedger>>,
}

impl MockDiscovery {
    /// Returns the discovery along with the sender that steers its sessions
    /// and the ledger they record into.
    pub fn new(
        init: MockDeviceInit,
    ) -> (
        MockDiscovery,
        Sender<MockDeviceMsg>,
        Arc<Mutex<MockDeviceLedger>>,
    ) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let ledger = Arc::new(Mutex::new(MockDeviceLedger::default()));
        let discovery = MockDiscovery {
            available: true,
            running: true,
            version: RuntimeVersion::new(2, 1, 0, 0),
            init,
            receiver,
            ledger: ledger.clone(),
        };
        (discovery, sender, ledger)
    }
}

impl DiscoveryAPI for MockDiscovery {
    fn is_available(&self) -> bool {
        self.available
    }

    fn runtime_version(&self) -> RuntimeVersion {
        self.version
    }

    fn connect(&mut self) -> Option<Box<dyn DeviceAPI>> {
        if !self.running {
            return None;
        }
        Some(Box::new(MockDevice::new(
            self.init.clone(),
            self.receiver.clone(),
            self.ledger.clone(),
        )))
    }
}

/// One device slot of the mock tracking provider.
#[derive(Clone, Debug, Default)]
pub struct MockTrackedDevice {
    pub pose: RawDevicePose,
    pub class: DeviceClass,
    pub battery: f32,
    pub render_model_name: Option<String>,
}

#[derive(Debug)]
pub enum MockTrackingMsg {
    SetDevice(usize, MockTrackedDevice),
    RemoveDevice(usize),
}

pub struct MockTrackingProvider {
    receiver: Receiver<MockTrackingMsg>,
    devices: HashMap<usize, MockTrackedDevice>,
}

impl MockTrackingProvider {
    pub fn new() -> (MockTrackingProvider, Sender<MockTrackingMsg>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let provider = MockTrackingProvider {
            receiver,
            devices: HashMap::new(),
        };
        (provider, sender)
    }

    fn handle_messages(&mut self) {
        while let Ok(msg) = self.receiver.try_recv() {
            match msg {
                MockTrackingMsg::SetDevice(id, device) => {
                    self.devices.insert(id, device);
                },
                MockTrackingMsg::RemoveDevice(id) => {
                    self.devices.remove(&id);
                },
            }
        }
    }
}

impl TrackingProvider for MockTrackingProvider {
    fn poses(&mut self) -> [RawDevicePose; MAX_TRACKED_DEVICES] {
        self.handle_messages();
        let mut poses = [RawDevicePose::default(); MAX_TRACKED_DEVICES];
        for (id, device) in &self.devices {
            if let Some(slot) = poses.get_mut(*id) {
                *slot = device.pose;
            }
        }
        poses
    }

    fn device_class(&self, device_id: usize) -> DeviceClass {
        self.devices
            .get(&device_id)
            .map(|device| device.class)
            .unwrap_or_default()
    }

    fn float_property(&self, device_id: usize, key: FloatPropertyKey) -> f32 {
        let Some(device) = self.devices.get(&device_id) else {
            return 0.;
        };
        match key {
            FloatPropertyKey::BatteryPercentage => device.battery,
            FloatPropertyKey::FieldOfViewLeftDegrees |
            FloatPropertyKey::FieldOfViewRightDegrees |
            FloatPropertyKey::FieldOfViewTopDegrees |
            FloatPropertyKey::FieldOfViewBottomDegrees => 45.,
            FloatPropertyKey::TrackingRangeMinimumMeters => 0.1,
            FloatPropertyKey::TrackingRangeMaximumMeters => 5.,
        }
    }

    fn render_model_name(&self, device_id: usize) -> Option<String> {
        self.devices
            .get(&device_id)
            .and_then(|device| device.render_model_name.clone())
    }
}

#[derive(Clone, Debug)]
pub struct MockTexture {
    pub descriptor: Option<TextureDescriptor>,
    pub native: Option<NativeTexture>,
    pub usage: TextureUsage,
}

/// Everything the mock render hardware was asked to do.
#[derive(Debug, Default)]
pub struct MockRenderLedger {
    pub textures: HashMap<TextureHandle, MockTexture>,
    pub allocations: usize,
    pub aliases: Vec<(TextureHandle, TextureHandle)>,
    pub copies: Vec<(TextureHandle, TextureHandle)>,
    pub hidden_area_draws: Vec<(usize, usize)>,
    pub flushes: usize,
}

pub struct MockRenderHardware {
    ledger: Arc<Mutex<MockRenderLedger>>,
    next_handle: u64,
}

impl MockRenderHardware {
    pub fn new() -> (MockRenderHardware, Arc<Mutex<MockRenderLedger>>) {
        let ledger = Arc::new(Mutex::new(MockRenderLedger::default()));
        let hardware = MockRenderHardware {
            ledger: ledger.clone(),
            next_handle: 1,
        };
        (hardware, ledger)
    }

    fn next_handle(&mut self) -> TextureHandle {
        let handle = TextureHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl RenderHardware for MockRenderHardware {
    fn allocate_texture(&mut self, descriptor: &TextureDescriptor) -> TextureHandle {
        let handle = self.next_handle();
        let mut ledger = self.ledger.lock();
        ledger.allocations += 1;
        ledger.textures.insert(
            handle,
            MockTexture {
                descriptor: Some(*descriptor),
                native: Some(NativeTexture(0xE000 + handle.0)),
                usage: descriptor.usage,
            },
        );
        handle
    }

    fn create_texture_from_native(
        &mut self,
        native: NativeTexture,
        _format: TextureFormat,
        usage: TextureUsage,
    ) -> TextureHandle {
        let handle = self.next_handle();
        self.ledger.lock().textures.insert(
            handle,
            MockTexture {
                descriptor: None,
                native: Some(native),
                usage,
            },
        );
        handle
    }

    fn alias_texture_resources(&mut self, dest: TextureHandle, src: TextureHandle) {
        let mut ledger = self.ledger.lock();
        let native = ledger.textures.get(&src).and_then(|texture| texture.native);
        if let Some(texture) = ledger.textures.get_mut(&dest) {
            texture.native = native;
        }
        ledger.aliases.push((dest, src));
    }

    fn native_texture(&self, texture: TextureHandle) -> Option<NativeTexture> {
        self.ledger
            .lock()
            .textures
            .get(&texture)
            .and_then(|texture| texture.native)
    }

    fn copy_texture(&mut self, src: TextureHandle, dest: TextureHandle) {
        self.ledger.lock().copies.push((src, dest));
    }

    fn draw_hidden_area_mesh(&mut self, view_index: usize, mesh: &HiddenAreaMesh) {
        self.ledger
            .lock()
            .hidden_area_draws
            .push((view_index, mesh.num_triangles()));
    }

    fn flush_rendering_commands(&mut self) {
        self.ledger.lock().flushes += 1;
    }
}

/// A heuristic that always answers with the same fraction.
pub struct FixedResolution(pub f32);

impl ResolutionHeuristic for FixedResolution {
    fn current_fraction_for_frame(&self) -> f32 {
        self.0
    }
}
