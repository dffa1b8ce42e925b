/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use hmd_api::{ButtonEvent, DeviceAPI, DeviceEvent, GameViewport, Visibility};
use log::{debug, trace};

/// Drains device events once per game frame and keeps what the engine asks
/// about between polls.
pub struct EventPump {
    button: Option<ButtonEvent>,
    visibility: Visibility,
    foreground: bool,
}

impl Default for EventPump {
    fn default() -> Self {
        EventPump {
            button: None,
            visibility: Visibility::Unknown,
            foreground: true,
        }
    }
}

impl EventPump {
    /// Handles every pending event. Only the last button event of this poll
    /// is kept, and only while the application has the foreground: the
    /// compositor's own UI consumes buttons otherwise.
    pub fn poll(&mut self, session: &mut dyn DeviceAPI, viewport: &mut dyn GameViewport) {
        self.button = None;
        while let Some(event) = session.poll_event() {
            trace!("Device event {:?}", event);
            match event {
                DeviceEvent::Button(button) => {
                    if self.foreground {
                        self.button = Some(button);
                    }
                },
                DeviceEvent::Visibility { visible } => {
                    viewport.set_world_rendering_disabled(!visible);
                    self.visibility = if visible {
                        Visibility::Visible
                    } else {
                        Visibility::NotVisible
                    };
                    debug!("HMD visibility is now {:?}", self.visibility);
                },
                DeviceEvent::Foreground { is_foreground } => {
                    self.foreground = is_foreground;
                    debug!("Application foreground: {}", is_foreground);
                },
                DeviceEvent::Other(_) => {},
            }
        }
    }

    pub fn button_event(&self) -> Option<ButtonEvent> {
        self.button
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }
}
