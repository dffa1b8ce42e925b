/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub struct ButtonEvent {
    pub button_id: i32,
    pub pressed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "ipc", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceEvent {
    /// A headset button changed state
    Button(ButtonEvent),
    /// The application's frames became visible or hidden in the headset
    Visibility { visible: bool },
    /// The application gained or lost the compositor's foreground
    Foreground { is_foreground: bool },
    /// Anything the bridge does not react to
    Other(i64),
}

/// Whether the application is currently shown in the headset.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum Visibility {
    #[default]
    Unknown,
    NotVisible,
    Visible,
}

/// The engine viewport whose world rendering is suppressed while the
/// headset is not showing the application.
pub trait GameViewport {
    fn set_world_rendering_disabled(&mut self, disabled: bool);
}
