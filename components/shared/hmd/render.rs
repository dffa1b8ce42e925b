/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use bitflags::bitflags;

use crate::{HiddenAreaMesh, TextureFormat};

/// A texture owned by the device runtime, in the graphics API's own terms.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub struct NativeTexture(pub u64);

/// An engine-side texture. The handle stays the same when the texture is
/// aliased onto different backing memory.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub struct TextureHandle(pub u64);

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct TextureUsage: u32 {
        const RENDER_TARGET = 1 << 0;
        const SHADER_RESOURCE = 1 << 1;
        const DEPTH_STENCIL = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

/// The engine's render hardware interface, as far as the bridge needs it.
pub trait RenderHardware: Send {
    /// Allocates a fresh engine texture.
    fn allocate_texture(&mut self, descriptor: &TextureDescriptor) -> TextureHandle;

    /// Wraps a device-owned texture so the engine can render to and sample it.
    fn create_texture_from_native(
        &mut self,
        native: NativeTexture,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> TextureHandle;

    /// Repoints `dest` at the backing memory of `src` without changing
    /// `dest`'s handle.
    fn alias_texture_resources(&mut self, dest: TextureHandle, src: TextureHandle);

    /// The native resource currently backing an engine texture.
    fn native_texture(&self, texture: TextureHandle) -> Option<NativeTexture>;

    fn copy_texture(&mut self, src: TextureHandle, dest: TextureHandle);

    fn draw_hidden_area_mesh(&mut self, view_index: usize, mesh: &HiddenAreaMesh);

    /// Waits for every queued render command to execute.
    fn flush_rendering_commands(&mut self);
}
