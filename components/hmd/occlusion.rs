/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use hmd_api::{DeviceAPI, HiddenAreaMesh, RenderHardware, VIEW_COUNT, WindingOrder};

/// The hidden-area mesh of every view, fetched from the device once.
#[derive(Default)]
pub struct OcclusionMeshes {
    meshes: [Option<HiddenAreaMesh>; VIEW_COUNT],
}

impl OcclusionMeshes {
    pub fn fetch(&mut self, session: &mut dyn DeviceAPI) {
        for (view_index, slot) in self.meshes.iter_mut().enumerate() {
            let mesh = session.create_occlusion_mesh(view_index, WindingOrder::Clockwise);
            *slot = HiddenAreaMesh::from_device_mesh(&mesh);
            match slot {
                Some(mesh) => log::debug!(
                    "Hidden area mesh of view {} has {} triangles",
                    view_index,
                    mesh.num_triangles()
                ),
                None => log::debug!("View {} has no hidden area", view_index),
            }
        }
    }

    pub fn get(&self, view_index: usize) -> Option<&HiddenAreaMesh> {
        self.meshes.get(view_index)?.as_ref()
    }

    /// Draws the mesh of one view. Views without a mesh draw nothing.
    pub fn render(&self, rhi: &mut dyn RenderHardware, view_index: usize) {
        if let Some(mesh) = self.get(view_index) {
            rhi.draw_hidden_area_mesh(view_index, mesh);
        }
    }

    pub fn release(&mut self) {
        self.meshes = Default::default();
    }
}
