/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use hmd_api::mock::MockDeviceMsg;
use hmd_api::{ButtonEvent, DeviceEvent, Visibility};
use hmd_bridge::{BackendKind, HmdPrefs};

use crate::{Harness, TestViewport, harness};

fn queue(harness: &Harness, event: DeviceEvent) {
    harness
        .device
        .send(MockDeviceMsg::QueueEvent(event))
        .unwrap();
}

fn button(button_id: i32) -> DeviceEvent {
    DeviceEvent::Button(ButtonEvent {
        button_id,
        pressed: true,
    })
}

#[test]
fn test_buttons_are_ignored_in_the_background() {
    let mut harness = harness(BackendKind::DirectSubmission, HmdPrefs::default());
    let mut viewport = TestViewport::default();

    queue(&harness, DeviceEvent::Foreground {
        is_foreground: false,
    });
    queue(&harness, button(1));
    queue(&harness, button(4));
    harness.bridge.handle_events(&mut viewport);
    assert_eq!(harness.bridge.button_event(), None);

    queue(&harness, DeviceEvent::Foreground {
        is_foreground: true,
    });
    queue(&harness, button(2));
    harness.bridge.handle_events(&mut viewport);
    assert_eq!(
        harness.bridge.button_event(),
        Some(ButtonEvent {
            button_id: 2,
            pressed: true
        })
    );
}

#[test]
fn test_last_button_of_a_poll_wins_and_is_cleared_next_poll() {
    let mut harness = harness(BackendKind::DirectSubmission, HmdPrefs::default());
    let mut viewport = TestViewport::default();

    queue(&harness, button(1));
    queue(&harness, button(3));
    harness.bridge.handle_events(&mut viewport);
    assert_eq!(
        harness.bridge.button_event().map(|event| event.button_id),
        Some(3)
    );

    harness.bridge.handle_events(&mut viewport);
    assert_eq!(harness.bridge.button_event(), None);
}

#[test]
fn test_visibility_toggles_world_rendering() {
    let mut harness = harness(BackendKind::DirectSubmission, HmdPrefs::default());
    let mut viewport = TestViewport::default();
    assert_eq!(harness.bridge.visibility(), Visibility::Unknown);

    queue(&harness, DeviceEvent::Visibility { visible: false });
    harness.bridge.handle_events(&mut viewport);
    assert_eq!(harness.bridge.visibility(), Visibility::NotVisible);

    queue(&harness, DeviceEvent::Visibility { visible: true });
    harness.bridge.handle_events(&mut viewport);
    assert_eq!(harness.bridge.visibility(), Visibility::Visible);
    assert_eq!(viewport.world_rendering_disabled, vec![true, false]);
}

#[test]
fn test_unknown_events_are_drained() {
    let mut harness = harness(BackendKind::DirectSubmission, HmdPrefs::default());
    let mut viewport = TestViewport::default();
    queue(&harness, DeviceEvent::Other(42));
    harness.bridge.handle_events(&mut viewport);

    assert_eq!(harness.ledger.lock().events_polled, 1);
    assert_eq!(harness.bridge.button_event(), None);
    assert_eq!(harness.bridge.visibility(), Visibility::Unknown);
    assert!(viewport.world_rendering_disabled.is_empty());
}

#[test]
fn test_events_stop_after_shutdown() {
    let mut harness = harness(BackendKind::DirectSubmission, HmdPrefs::default());
    let mut viewport = TestViewport::default();
    harness.bridge.shutdown();

    queue(&harness, button(1));
    harness.bridge.handle_events(&mut viewport);
    assert_eq!(harness.bridge.button_event(), None);
    assert_eq!(harness.ledger.lock().events_polled, 0);
}
