/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use hmd_api::{NativeTexture, RenderHardware, TextureFormat, TextureHandle, TextureUsage};

/// A ring of device-owned images wrapped as engine textures, plus one alias
/// texture that always points at the image being rendered.
///
/// The engine only ever sees the alias, so its handle stays stable while the
/// backing image changes from frame to frame.
pub struct TextureSet {
    alias: TextureHandle,
    images: Vec<(TextureHandle, NativeTexture)>,
    current_index: usize,
}

impl TextureSet {
    /// Wraps every native image. Returns `None` if there are none.
    pub fn new(
        rhi: &mut dyn RenderHardware,
        natives: &[NativeTexture],
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Option<TextureSet> {
        let first = *natives.first()?;
        let alias = rhi.create_texture_from_native(first, format, usage);
        let images: Vec<_> = natives
            .iter()
            .map(|native| (rhi.create_texture_from_native(*native, format, usage), *native))
            .collect();
        rhi.alias_texture_resources(alias, images[0].0);
        Some(TextureSet {
            alias,
            images,
            current_index: 0,
        })
    }

    pub fn alias(&self) -> TextureHandle {
        self.alias
    }

    /// The native image backing the alias, if the current index is valid.
    pub fn current_native(&self) -> Option<NativeTexture> {
        self.images.get(self.current_index).map(|(_, native)| *native)
    }

    /// Moves to the image the device expects next and repoints the alias at
    /// it. Out-of-range indices are remembered but leave the alias alone.
    pub fn update_swap_chain_index(&mut self, rhi: &mut dyn RenderHardware, index: usize) {
        self.current_index = index;
        match self.images.get(index) {
            Some((image, _)) => rhi.alias_texture_resources(self.alias, *image),
            None => log::debug!(
                "Swap chain index {} out of range for {} images",
                index,
                self.images.len()
            ),
        }
    }
}
