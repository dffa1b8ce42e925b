/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The two ways frames reach the compositor.
//!
//! With [`DirectSubmission`] the device owns one long-lived texture array
//! and tells us which image to render next; each submission hands that
//! texture back directly. With [`IndexedSwapChain`] we acquire an image from
//! an explicit ring before rendering and release it afterwards, and submit a
//! layered multi-projection description that refers to the ring.

use hmd_api::{
    DepthExtension, DeviceAPI, Error, FrameInfo, GraphicsInfo, LayerMultiProj, LayerView,
    NativeTexture, ReferenceSpace, RenderHardware, SubmitFlags, SubmitInfo, SubmitInfoLayers,
    SwapChainConfig, SwapChainId, SwapChainViewport, TextureDescriptor, TextureFormat,
    TextureHandle, TextureUsage, VIEW_COUNT, Viewport,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::prefs::HmdPrefs;
use crate::texture_set::TextureSet;

pub(crate) const COLOR_USAGE: TextureUsage =
    TextureUsage::RENDER_TARGET.union(TextureUsage::SHADER_RESOURCE);
const DEPTH_USAGE: TextureUsage = TextureUsage::DEPTH_STENCIL.union(TextureUsage::SHADER_RESOURCE);

/// Which backend to drive, chosen once when the bridge is built.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum BackendKind {
    DirectSubmission,
    IndexedSwapChain,
}

/// The engine-facing handles of a render target. Both are the same texture
/// for every target the bridge creates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RenderTarget {
    pub targetable: TextureHandle,
    pub shader_resource: TextureHandle,
}

impl RenderTarget {
    pub fn single(texture: TextureHandle) -> RenderTarget {
        RenderTarget {
            targetable: texture,
            shader_resource: texture,
        }
    }
}

/// A frame ready to be handed to the device.
#[derive(Clone, Debug, PartialEq)]
pub enum Submission {
    Direct(SubmitInfo),
    Layers(SubmitInfoLayers),
}

pub enum SwapChainBackend {
    DirectSubmission(DirectSubmission),
    IndexedSwapChain(IndexedSwapChain),
}

impl SwapChainBackend {
    pub fn new(kind: BackendKind) -> SwapChainBackend {
        match kind {
            BackendKind::DirectSubmission => {
                SwapChainBackend::DirectSubmission(DirectSubmission::default())
            },
            BackendKind::IndexedSwapChain => {
                SwapChainBackend::IndexedSwapChain(IndexedSwapChain::default())
            },
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            SwapChainBackend::DirectSubmission(_) => BackendKind::DirectSubmission,
            SwapChainBackend::IndexedSwapChain(_) => BackendKind::IndexedSwapChain,
        }
    }

    /// Sets up the backend's device resources. Calling it again once it
    /// succeeded does nothing.
    pub fn init(&mut self, session: &mut dyn DeviceAPI, prefs: &HmdPrefs) -> Result<(), Error> {
        match self {
            SwapChainBackend::DirectSubmission(backend) => backend.init(session),
            SwapChainBackend::IndexedSwapChain(backend) => backend.init(session, prefs),
        }
    }

    /// Points the engine's render target at the image this frame renders to.
    pub fn begin_frame(&mut self, session: &mut dyn DeviceAPI, rhi: &mut dyn RenderHardware) {
        match self {
            SwapChainBackend::DirectSubmission(backend) => backend.begin_frame(session, rhi),
            SwapChainBackend::IndexedSwapChain(backend) => backend.begin_frame(session, rhi),
        }
    }

    pub fn finish_rendering(&mut self, session: &mut dyn DeviceAPI, rhi: &mut dyn RenderHardware) {
        if let SwapChainBackend::IndexedSwapChain(backend) = self {
            backend.finish_rendering(session, rhi);
        }
    }

    /// Releases whatever images this frame acquired.
    pub fn release_images(&mut self, session: &mut dyn DeviceAPI) {
        if let SwapChainBackend::IndexedSwapChain(backend) = self {
            backend.release_images(session);
        }
    }

    /// Describes the frame for the compositor, with every viewport scaled
    /// by the resolution fraction. Returns `None` if the backend has no
    /// device resources.
    pub fn build_submission(
        &self,
        frame_info: &FrameInfo,
        resolution_fraction: f32,
        prefs: &HmdPrefs,
    ) -> Option<Submission> {
        match self {
            SwapChainBackend::DirectSubmission(backend) => backend
                .build_submission(resolution_fraction)
                .map(Submission::Direct),
            SwapChainBackend::IndexedSwapChain(backend) => backend
                .build_submission(frame_info, resolution_fraction, prefs)
                .map(Submission::Layers),
        }
    }

    pub fn create_render_target_texture(
        &mut self,
        session: &mut dyn DeviceAPI,
        rhi: &mut dyn RenderHardware,
    ) -> Result<RenderTarget, Error> {
        match self {
            SwapChainBackend::DirectSubmission(backend) => {
                backend.create_render_target_texture(rhi)
            },
            SwapChainBackend::IndexedSwapChain(backend) => {
                backend.create_render_target_texture(session, rhi)
            },
        }
    }

    /// Creates the depth target the compositor samples depth from. Only the
    /// indexed backend with depth submission enabled has one.
    pub fn create_depth_target_texture(
        &mut self,
        session: &mut dyn DeviceAPI,
        rhi: &mut dyn RenderHardware,
        prefs: &HmdPrefs,
    ) -> Option<RenderTarget> {
        match self {
            SwapChainBackend::DirectSubmission(_) => None,
            SwapChainBackend::IndexedSwapChain(backend) => {
                backend.create_depth_target_texture(session, rhi, prefs)
            },
        }
    }

    /// Remembers the native texture behind the engine's viewport.
    pub fn update_viewport(&mut self, native: NativeTexture) {
        let slot = match self {
            SwapChainBackend::DirectSubmission(backend) => &mut backend.viewport_texture,
            SwapChainBackend::IndexedSwapChain(backend) => &mut backend.viewport_texture,
        };
        if *slot != Some(native) {
            debug!("Viewport texture is now {:?}", native);
            *slot = Some(native);
        }
    }

    /// The alias texture the engine renders into, once created.
    pub fn render_texture(&self) -> Option<TextureHandle> {
        match self {
            SwapChainBackend::DirectSubmission(backend) => {
                backend.texture_set.as_ref().map(TextureSet::alias)
            },
            SwapChainBackend::IndexedSwapChain(backend) => {
                backend.textures.as_ref().map(TextureSet::alias)
            },
        }
    }

    /// Frees every device resource the backend created and returns it to
    /// its initial state.
    pub fn shutdown(&mut self, session: &mut dyn DeviceAPI) {
        match self {
            SwapChainBackend::DirectSubmission(backend) => backend.shutdown(session),
            SwapChainBackend::IndexedSwapChain(backend) => backend.shutdown(session),
        }
    }
}

#[derive(Default)]
pub struct DirectSubmission {
    graphics: Option<GraphicsInfo>,
    /// The device's default per-view layout, allocated with the graphics.
    layout: Option<SubmitInfo>,
    texture_set: Option<TextureSet>,
    viewport_texture: Option<NativeTexture>,
}

impl DirectSubmission {
    fn init(&mut self, session: &mut dyn DeviceAPI) -> Result<(), Error> {
        if self.graphics.is_some() {
            return Ok(());
        }
        let graphics = session
            .init_graphics(TextureFormat::B8G8R8A8Srgb)
            .ok_or_else(|| Error::ResourceCreation("direct submission graphics".into()))?;
        debug!(
            "Direct submission with {} textures for {} views",
            graphics.swap_chain_textures.len(),
            graphics.view_count
        );
        self.layout = Some(session.create_submit_info());
        self.graphics = Some(graphics);
        Ok(())
    }

    fn begin_frame(&mut self, session: &mut dyn DeviceAPI, rhi: &mut dyn RenderHardware) {
        if let Some(texture_set) = self.texture_set.as_mut() {
            let index = session.swap_chain_current_index();
            texture_set.update_swap_chain_index(rhi, index);
        }
    }

    fn build_submission(&self, resolution_fraction: f32) -> Option<SubmitInfo> {
        let graphics = self.graphics.as_ref()?;
        let layout = self.layout.as_ref()?;
        let texture = self
            .texture_set
            .as_ref()
            .and_then(TextureSet::current_native)
            .or(self.viewport_texture);
        if texture.is_none() {
            debug!("Submitting without a texture");
        }

        // Always scale from the device layout so the fraction never compounds.
        let mut submit_info = layout.clone();
        let view_count = graphics.view_count.min(submit_info.viewports.len());
        for index in 0..view_count {
            submit_info.textures[index] = texture;
            submit_info.viewports[index] = layout.viewports[index].scaled(resolution_fraction);
        }
        Some(submit_info)
    }

    fn create_render_target_texture(
        &mut self,
        rhi: &mut dyn RenderHardware,
    ) -> Result<RenderTarget, Error> {
        if let Some(texture_set) = &self.texture_set {
            return Ok(RenderTarget::single(texture_set.alias()));
        }
        let graphics = self.graphics.as_ref().ok_or(Error::NoSession)?;
        let texture_set = TextureSet::new(
            rhi,
            &graphics.swap_chain_textures,
            TextureFormat::B8G8R8A8,
            COLOR_USAGE,
        )
        .ok_or_else(|| Error::ResourceCreation("direct submission texture set".into()))?;
        let target = RenderTarget::single(texture_set.alias());
        self.texture_set = Some(texture_set);
        Ok(target)
    }

    fn shutdown(&mut self, session: &mut dyn DeviceAPI) {
        self.layout = None;
        if self.graphics.take().is_some() {
            session.shutdown_graphics();
        }
        *self = DirectSubmission::default();
    }
}

#[derive(Default)]
pub struct IndexedSwapChain {
    color: Option<SwapChainId>,
    depth: Option<SwapChainId>,
    config: Option<SwapChainConfig>,
    viewports: Vec<Viewport>,
    textures: Option<TextureSet>,
    depth_images: Vec<TextureHandle>,
    depth_target: Option<RenderTarget>,
    color_acquired: bool,
    depth_acquired: bool,
    viewport_texture: Option<NativeTexture>,
}

impl IndexedSwapChain {
    fn init(&mut self, session: &mut dyn DeviceAPI, prefs: &HmdPrefs) -> Result<(), Error> {
        if self.color.is_some() {
            return Ok(());
        }
        let defaults = session.default_swap_chain_config();
        let color_config = SwapChainConfig {
            format: TextureFormat::B8G8R8A8Srgb,
            array_size: 1,
            ..defaults
        };
        let color = session
            .create_swap_chain(&color_config)
            .ok_or_else(|| Error::ResourceCreation("colour swap chain".into()))?;
        self.color = Some(color);

        if prefs.submit_depth {
            let depth_config = SwapChainConfig {
                format: TextureFormat::D32Float,
                ..color_config
            };
            self.depth = session.create_swap_chain(&depth_config);
            if self.depth.is_none() {
                warn!("Could not create a depth swap chain, submitting colour only");
            }
        }

        debug!(
            "Indexed swap chain of {} {}x{} images",
            color_config.texture_count, color_config.width, color_config.height
        );
        self.config = Some(color_config);
        self.viewports = session.default_viewports();
        Ok(())
    }

    fn begin_frame(&mut self, session: &mut dyn DeviceAPI, rhi: &mut dyn RenderHardware) {
        let Some(color) = self.color else {
            return;
        };
        if self.color_acquired {
            warn!("Colour image of the previous frame was never released");
            return;
        }
        match session.acquire_swap_chain_image(color) {
            Some(index) => {
                self.color_acquired = true;
                if let Some(textures) = self.textures.as_mut() {
                    textures.update_swap_chain_index(rhi, index);
                }
            },
            None => warn!("Could not acquire a colour swap chain image"),
        }
    }

    fn finish_rendering(&mut self, session: &mut dyn DeviceAPI, rhi: &mut dyn RenderHardware) {
        if self.depth_acquired {
            return;
        }
        let (Some(depth), Some(target)) = (self.depth, self.depth_target) else {
            return;
        };
        let Some(index) = session.acquire_swap_chain_image(depth) else {
            warn!("Could not acquire a depth swap chain image");
            return;
        };
        self.depth_acquired = true;
        if let Some(image) = self.depth_images.get(index) {
            rhi.copy_texture(target.targetable, *image);
        }
    }

    fn release_images(&mut self, session: &mut dyn DeviceAPI) {
        if std::mem::take(&mut self.color_acquired) {
            if let Some(color) = self.color {
                session.release_swap_chain_image(color);
            }
        }
        if std::mem::take(&mut self.depth_acquired) {
            if let Some(depth) = self.depth {
                session.release_swap_chain_image(depth);
            }
        }
    }

    fn build_submission(
        &self,
        frame_info: &FrameInfo,
        resolution_fraction: f32,
        prefs: &HmdPrefs,
    ) -> Option<SubmitInfoLayers> {
        let color = self.color?;
        // Depth only goes out once there is a target to copy it from.
        let depth = self.depth.filter(|_| self.depth_target.is_some());
        let far_z = f64::from(prefs.near_clip_plane) / prefs.world_to_meters;

        let views = (0..VIEW_COUNT)
            .map(|index| {
                let view = frame_info.view(index);
                let viewport = SwapChainViewport {
                    swap_chain: color,
                    viewport: self
                        .viewports
                        .get(index)
                        .copied()
                        .unwrap_or_default()
                        .scaled(resolution_fraction),
                    array_index: 0,
                };
                let depth = depth.map(|depth| DepthExtension {
                    min_depth: 0.,
                    max_depth: 1.,
                    near_z: f64::INFINITY,
                    far_z,
                    viewport: SwapChainViewport {
                        swap_chain: depth,
                        ..viewport
                    },
                });
                LayerView {
                    projection: view.projection_matrix,
                    view: view.view_matrix,
                    viewport,
                    depth,
                }
            })
            .collect();

        let flags = if prefs.async_submit {
            SubmitFlags::ASYNC
        } else {
            SubmitFlags::empty()
        };
        Some(SubmitInfoLayers {
            flags,
            frame_number: frame_info.frame_number,
            layers: vec![LayerMultiProj {
                space: ReferenceSpace::Local,
                views,
            }],
        })
    }

    fn create_render_target_texture(
        &mut self,
        session: &mut dyn DeviceAPI,
        rhi: &mut dyn RenderHardware,
    ) -> Result<RenderTarget, Error> {
        if let Some(textures) = &self.textures {
            return Ok(RenderTarget::single(textures.alias()));
        }
        let (Some(color), Some(config)) = (self.color, self.config) else {
            return Err(Error::NoSession);
        };
        let natives: Vec<_> = (0..config.texture_count as usize)
            .map(|index| session.swap_chain_image(color, index))
            .collect();
        let textures = TextureSet::new(rhi, &natives, TextureFormat::B8G8R8A8, COLOR_USAGE)
            .ok_or_else(|| Error::ResourceCreation("colour swap chain textures".into()))?;
        let target = RenderTarget::single(textures.alias());
        self.textures = Some(textures);
        Ok(target)
    }

    fn create_depth_target_texture(
        &mut self,
        session: &mut dyn DeviceAPI,
        rhi: &mut dyn RenderHardware,
        prefs: &HmdPrefs,
    ) -> Option<RenderTarget> {
        if let Some(target) = self.depth_target {
            return Some(target);
        }
        let depth = self.depth?;
        let config = self.config?;
        self.depth_images = (0..config.texture_count as usize)
            .map(|index| {
                let native = session.swap_chain_image(depth, index);
                rhi.create_texture_from_native(native, TextureFormat::D32Float, DEPTH_USAGE)
            })
            .collect();
        let texture = rhi.allocate_texture(&TextureDescriptor {
            width: prefs.render_target_width,
            height: prefs.render_target_height,
            format: TextureFormat::DepthStencil,
            usage: DEPTH_USAGE,
        });
        let target = RenderTarget::single(texture);
        self.depth_target = Some(target);
        Some(target)
    }

    fn shutdown(&mut self, session: &mut dyn DeviceAPI) {
        self.release_images(session);
        if let Some(depth) = self.depth.take() {
            session.destroy_swap_chain(depth);
        }
        if let Some(color) = self.color.take() {
            session.destroy_swap_chain(color);
        }
        *self = IndexedSwapChain::default();
    }
}
