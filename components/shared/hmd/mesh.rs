/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use euclid::Point2D;
use log::warn;

use crate::{Ndc, Uv};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WindingOrder {
    Clockwise,
    CounterClockwise,
}

/// A triangle list as the device reports it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh2D {
    pub vertices: Vec<Point2D<f32, Ndc>>,
}

/// A hidden-area mesh ready to be drawn by the engine: a triangle list in
/// texture space with a trivial index buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct HiddenAreaMesh {
    pub positions: Vec<Point2D<f32, Uv>>,
    pub indices: Vec<u16>,
}

impl HiddenAreaMesh {
    /// Builds a mesh from a device triangle list, mapping [-1, 1] to
    /// [0, 1]. Returns `None` for an empty list, or one too large for a
    /// 16-bit index buffer.
    pub fn from_device_mesh(mesh: &Mesh2D) -> Option<HiddenAreaMesh> {
        if mesh.vertices.is_empty() {
            return None;
        }
        let indices = match (0..mesh.vertices.len())
            .map(u16::try_from)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(indices) => indices,
            Err(_) => {
                warn!(
                    "Hidden area mesh has {} vertices, more than 16-bit indices can address",
                    mesh.vertices.len()
                );
                return None;
            },
        };
        let positions = mesh
            .vertices
            .iter()
            .map(|vertex| Point2D::new((vertex.x + 1.0) * 0.5, (vertex.y + 1.0) * 0.5))
            .collect();
        Some(HiddenAreaMesh { positions, indices })
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }
}
