/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The frame lifecycle: wait for the device, begin a frame, let the engine
//! draw, then hand the frame to the compositor.
//!
//! A frame is *in flight* between [`PresentBridge::begin_rendering`] and the
//! submission that ends it. Submitting while no frame is in flight does
//! nothing, and beginning a frame while one is still in flight presents the
//! old one first so the device never sees two `begin_frame` calls in a row.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use euclid::Transform3D;
use hmd_api::util::{AlignedView, FocusViewport, device_to_engine_projection, fallback_projection};
use hmd_api::{
    ButtonEvent, Clip, Device, DeviceAPI, Error, Eye, FrameInfo, GameViewport, LEFT_CONTEXT,
    NativeTexture, PoseType, PropertyKey, RIGHT_CONTEXT, RenderHardware, StereoPass,
    VIEW_COUNT, Visibility,
};
use log::{debug, error, info, warn};

use crate::events::EventPump;
use crate::occlusion::OcclusionMeshes;
use crate::pose::{EnginePose, head_pose_from_views};
use crate::prefs::HmdPrefs;
use crate::swap_chain::{BackendKind, RenderTarget, Submission, SwapChainBackend};

/// What the render context learns from one wait-sync.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyncedFrame {
    /// Head pose in metres.
    pub pose: EnginePose,
    /// Engine projections, one per view.
    pub projections: [Transform3D<f32, Eye, Clip>; VIEW_COUNT],
}

/// The fraction of the full render target drawn this frame.
///
/// Written by the resolution heuristic and read when viewports are built;
/// a stale read only costs one frame at the old size.
#[derive(Clone, Debug)]
pub struct ResolutionFraction(Arc<AtomicU32>);

impl Default for ResolutionFraction {
    fn default() -> Self {
        ResolutionFraction(Arc::new(AtomicU32::new(1.0f32.to_bits())))
    }
}

impl ResolutionFraction {
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Stores a fraction, clamped into (0, 1]. Non-numbers reset to 1.
    pub fn set(&self, fraction: f32) {
        let fraction = if fraction.is_nan() {
            1.0
        } else {
            fraction.clamp(f32::MIN_POSITIVE, 1.0)
        };
        self.0.store(fraction.to_bits(), Ordering::Relaxed);
    }
}

pub struct PresentBridge {
    session: Option<Box<dyn DeviceAPI>>,
    rhi: Box<dyn RenderHardware>,
    backend: SwapChainBackend,
    prefs: HmdPrefs,
    frame_info: Option<FrameInfo>,
    occlusion: OcclusionMeshes,
    events: Option<EventPump>,
    in_frame: bool,
    focus_viewports: [FocusViewport; 2],
    resolution_fraction: ResolutionFraction,
}

impl PresentBridge {
    pub fn new(kind: BackendKind, rhi: Box<dyn RenderHardware>, prefs: HmdPrefs) -> PresentBridge {
        PresentBridge {
            session: None,
            rhi,
            backend: SwapChainBackend::new(kind),
            prefs,
            frame_info: None,
            occlusion: OcclusionMeshes::default(),
            events: None,
            in_frame: false,
            focus_viewports: [FocusViewport::FULL; 2],
            resolution_fraction: ResolutionFraction::default(),
        }
    }

    /// Hands the bridge a device session. A session that is already attached
    /// is shut down first.
    pub fn attach_session(&mut self, session: Box<dyn DeviceAPI>) {
        if self.session.is_some() {
            warn!("Replacing a live HMD session");
            self.shutdown();
        }
        self.session = Some(session);
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn prefs(&self) -> &HmdPrefs {
        &self.prefs
    }

    pub fn set_world_to_meters(&mut self, world_to_meters: f64) {
        self.prefs.world_to_meters = world_to_meters;
    }

    /// Allocates the per-session buffers, the backend's device resources,
    /// the hidden-area meshes and the event buffer. Does nothing without a
    /// session or when already initialised.
    pub fn init(&mut self) -> Result<(), Error> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if self.frame_info.is_some() {
            return Ok(());
        }

        self.backend.init(&mut **session, &self.prefs)?;
        self.frame_info = Some(session.create_frame_info());
        if self.prefs.use_occlusion_mesh {
            self.occlusion.fetch(&mut **session);
        }
        self.events = Some(EventPump::default());
        info!("HMD bridge initialised with {:?}", self.backend.kind());
        Ok(())
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "PresentBridge::begin_rendering",
            skip_all,
            fields(hmd_profiling = true),
            level = "trace",
        )
    )]
    pub fn begin_rendering(&mut self) -> SyncedFrame {
        if self.in_frame {
            let mut sync_interval = 0;
            self.present(&mut sync_interval);
        }

        let synced = self.wait_sync();

        if let (Some(session), Some(_)) = (self.session.as_mut(), self.frame_info.as_ref()) {
            session.begin_frame();
            self.in_frame = true;
            self.backend.begin_frame(&mut **session, &mut *self.rhi);
        }
        synced
    }

    /// Blocks until the device is ready for the next frame and derives the
    /// head pose, the engine projections and the focus viewports from it.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "PresentBridge::wait_sync",
            skip_all,
            fields(hmd_profiling = true),
            level = "trace",
        )
    )]
    fn wait_sync(&mut self) -> SyncedFrame {
        let near_clip_plane = self.prefs.near_clip_plane;
        let mut projections = [Transform3D::identity(); VIEW_COUNT];

        let (Some(session), Some(frame_info)) = (self.session.as_mut(), self.frame_info.as_mut())
        else {
            projections[LEFT_CONTEXT] = fallback_projection(near_clip_plane);
            return SyncedFrame {
                pose: EnginePose::identity(),
                projections,
            };
        };

        session.wait_sync(frame_info);
        match session.get_error() {
            Some(code) => {
                warn!("Wait sync failed: {}", code);
                debug!("{}", session.error_description(code));
            },
            None => {
                for (index, view) in frame_info.views.iter().take(VIEW_COUNT).enumerate() {
                    projections[index] =
                        device_to_engine_projection(&view.projection_matrix, near_clip_plane);
                }
                for (pair, focus_viewport) in self.focus_viewports.iter_mut().enumerate() {
                    let context = frame_info.view(pair).projection_matrix;
                    let focus = frame_info.view(pair + 2).projection_matrix;
                    *focus_viewport = FocusViewport::from_aligned_views(
                        &AlignedView::from_projection(&context),
                        &AlignedView::from_projection(&focus),
                    );
                }
            },
        }

        let pose = head_pose_from_views(
            &frame_info.view(LEFT_CONTEXT).view_matrix,
            &frame_info.view(RIGHT_CONTEXT).view_matrix,
        );
        SyncedFrame { pose, projections }
    }

    /// Lets the backend pick up whatever the engine rendered besides colour.
    pub fn finish_rendering(&mut self) {
        if let Some(session) = self.session.as_mut() {
            self.backend.finish_rendering(&mut **session, &mut *self.rhi);
        }
    }

    /// Submits the in-flight frame, if any. Vsync is always turned off and
    /// presentation always reports success; device errors are only logged.
    pub fn present(&mut self, sync_interval: &mut u32) -> bool {
        if self.is_initialized() {
            self.submit();
        }
        *sync_interval = 0;
        true
    }

    /// Ends the in-flight frame. A device error raised since the previous
    /// check skips the submission and keeps the frame in flight, so the next
    /// `begin_rendering` retries it.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "PresentBridge::submit",
            skip_all,
            fields(hmd_profiling = true),
            level = "trace",
        )
    )]
    pub fn submit(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        self.backend.release_images(&mut **session);

        if let Some(code) = session.get_error() {
            warn!("Error existed before submit, skipping it: {}", code);
            return;
        }

        if self.in_frame {
            if let Some(frame_info) = self.frame_info.as_ref() {
                let fraction = self.resolution_fraction.get();
                match self.backend.build_submission(frame_info, fraction, &self.prefs) {
                    Some(Submission::Direct(submit_info)) => {
                        session.end_frame(frame_info, &submit_info)
                    },
                    Some(Submission::Layers(layers)) => session.end_frame_with_layers(&layers),
                    None => warn!("Nothing to submit for frame {}", frame_info.frame_number),
                }
            }
            self.in_frame = false;
        }

        if let Some(code) = session.get_error() {
            warn!("Submit failed: {}", code);
        }
    }

    /// Releases everything `init` allocated, in reverse order of need, and
    /// closes the session. Later calls do nothing.
    pub fn shutdown(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        self.rhi.flush_rendering_commands();

        self.events = None;
        self.occlusion.release();
        self.frame_info = None;
        self.backend.shutdown(&mut *session);
        self.in_frame = false;
        self.focus_viewports = [FocusViewport::FULL; 2];
        session.shutdown();
        info!("HMD bridge shut down");
    }

    pub fn render_occlusion_mesh(&mut self, view_index: usize) {
        if self.is_initialized() {
            self.occlusion.render(&mut *self.rhi, view_index);
        }
    }

    /// Where a focus pass sits within its context view. Other passes cover
    /// the whole view.
    pub fn focus_view_pos_and_size(&self, pass: StereoPass) -> FocusViewport {
        match pass {
            StereoPass::LeftFocus => self.focus_viewports[0],
            StereoPass::RightFocus => self.focus_viewports[1],
            _ => FocusViewport::FULL,
        }
    }

    pub fn handle_events(&mut self, viewport: &mut dyn GameViewport) {
        if let (Some(session), Some(events)) = (self.session.as_mut(), self.events.as_mut()) {
            events.poll(&mut **session, viewport);
        }
    }

    pub fn button_event(&self) -> Option<ButtonEvent> {
        self.events.as_ref().and_then(EventPump::button_event)
    }

    pub fn visibility(&self) -> Visibility {
        self.events
            .as_ref()
            .map(EventPump::visibility)
            .unwrap_or_default()
    }

    pub fn resolution_fraction(&self) -> &ResolutionFraction {
        &self.resolution_fraction
    }

    pub fn set_resolution_fraction(&self, fraction: f32) {
        self.resolution_fraction.set(fraction);
    }

    /// The render target the engine draws into, backed by device images.
    /// Without a session there is nothing to back it with, which is fatal
    /// for the caller.
    pub fn create_render_target_texture(&mut self) -> Result<RenderTarget, Error> {
        let Some(session) = self.session.as_mut() else {
            self.rhi.flush_rendering_commands();
            error!("Cannot create a texture set without an HMD session");
            return Err(Error::NoSession);
        };
        self.backend
            .create_render_target_texture(&mut **session, &mut *self.rhi)
    }

    pub fn create_depth_target_texture(&mut self) -> Option<RenderTarget> {
        let session = self.session.as_mut()?;
        self.backend
            .create_depth_target_texture(&mut **session, &mut *self.rhi, &self.prefs)
    }

    pub fn update_viewport(&mut self, native: NativeTexture) {
        if self.is_initialized() {
            self.backend.update_viewport(native);
        }
    }

    /// The native image currently behind the engine's render target.
    pub fn current_render_texture(&self) -> Option<NativeTexture> {
        self.backend
            .render_texture()
            .and_then(|texture| self.rhi.native_texture(texture))
    }

    pub fn rhi_mut(&mut self) -> &mut dyn RenderHardware {
        self.rhi.as_mut()
    }

    pub fn frame_pose(&mut self, pose: PoseType) -> Option<Transform3D<f64, Device, Eye>> {
        Some(self.session.as_mut()?.frame_pose(pose))
    }

    pub fn property_f64(&mut self, key: PropertyKey) -> Option<f64> {
        self.session.as_mut()?.property_f64(key)
    }

    pub fn property_bool(&mut self, key: PropertyKey) -> Option<bool> {
        self.session.as_mut()?.property_bool(key)
    }
}

impl Drop for PresentBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
